//! voice-local: record, transcribe and speak with pluggable backends

mod types;
pub use types::{AudioClip, RecorderConfig, TtsConfig};

mod error;
pub use error::{Result, VoiceError};

mod traits;
pub use traits::{AudioRecorder, AudioSink, Transcriber, TtsEngine};

#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "mock")]
pub use mock::{MockRecorder, MockTranscriber, MockTts, NullSink};

pub mod wav;
pub use wav::{WavFileRecorder, WavFileSink};

#[cfg(feature = "audio")]
pub mod mic;

#[cfg(feature = "openai-http")]
pub mod openai;

pub mod plugin;
