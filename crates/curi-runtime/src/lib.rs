//! curi-runtime: configuration, background capture and the round loop that turns
//! a spoken instruction into a depth-grounded manipulator goal.

pub mod config;
pub use config::{ConfigError, CuriConfig, InstructionMode};

mod frames;
pub use frames::{FrameBuffer, FrameReader};

mod capture;
pub use capture::{CaptureController, CaptureError, CaptureStats, CaptureTaskHandle};

mod voice;
pub use voice::{
    InstructionSource, ScriptedInstructions, Speaker, TextInstructions, TextSpeaker,
    VoiceInstructions, VoiceSpeaker,
};

mod pipeline;
pub use pipeline::{
    Pipeline, PipelineError, PipelineParts, RoundError, RoundReport, SessionSummary,
};

pub mod setup;
pub use setup::SetupError;
