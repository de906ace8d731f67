use crate::{AudioClip, Result};

/// Captures one utterance.
pub trait AudioRecorder {
    fn record(&mut self) -> Result<AudioClip>;
}

/// Speech to text for a complete utterance.
pub trait Transcriber {
    fn transcribe(&mut self, audio: &AudioClip) -> Result<String>;
}

pub trait TtsEngine {
    fn synthesize(&mut self, text: &str) -> Result<AudioClip>;
}

/// Where synthesized speech goes (speaker, file, nowhere).
pub trait AudioSink {
    fn play(&mut self, clip: &AudioClip) -> Result<()>;
}
