use thiserror::Error;

pub type Result<T, E = VoiceError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("audio device error: {0}")]
    Device(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("transcription failed: {0}")]
    Transcription(String),
    #[error("speech synthesis failed: {0}")]
    Synthesis(String),
    #[error("backend not available: {0}")]
    Unavailable(String),
}

impl From<hound::Error> for VoiceError {
    fn from(e: hound::Error) -> Self {
        VoiceError::Io(e.to_string())
    }
}
