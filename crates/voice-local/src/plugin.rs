use crate::{AudioRecorder, RecorderConfig, Transcriber, TtsConfig, TtsEngine, VoiceError};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecorderKind {
    Mock,
    /// Read the instruction from the configured input WAV file.
    WavFile,
    Microphone,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeechBackendKind {
    Mock,
    OpenAi,
}

/// Connection details for remote speech backends.
#[derive(Clone, Debug, Default)]
pub struct SpeechEndpoint {
    pub base_url: String,
    pub api_key: String,
}

pub fn new_recorder(
    kind: RecorderKind,
    cfg: RecorderConfig,
    input_path: &std::path::Path,
) -> Result<Box<dyn AudioRecorder + Send>, VoiceError> {
    match kind {
        #[cfg(feature = "mock")]
        RecorderKind::Mock => Ok(Box::new(crate::MockRecorder::new(
            cfg.sample_rate_hz,
            (cfg.record_seconds * 1000.0) as u64,
        ))),
        RecorderKind::WavFile => Ok(Box::new(crate::WavFileRecorder::new(input_path))),
        RecorderKind::Microphone => {
            #[cfg(feature = "audio")]
            {
                Ok(Box::new(crate::mic::MicRecorder::new(cfg)))
            }
            #[cfg(not(feature = "audio"))]
            {
                Err(VoiceError::Unavailable("audio feature not enabled".into()))
            }
        }
        #[allow(unreachable_patterns)]
        other => Err(VoiceError::Unavailable(format!("{other:?} recorder not built"))),
    }
}

pub fn new_transcriber(
    kind: SpeechBackendKind,
    endpoint: &SpeechEndpoint,
) -> Result<Box<dyn Transcriber + Send>, VoiceError> {
    match kind {
        SpeechBackendKind::Mock => Err(VoiceError::Unavailable(
            "mock transcriber needs a script; construct MockTranscriber directly".into(),
        )),
        SpeechBackendKind::OpenAi => {
            #[cfg(feature = "openai-http")]
            {
                Ok(Box::new(crate::openai::OpenAiSpeech::new(
                    &endpoint.base_url,
                    &endpoint.api_key,
                    None,
                )?))
            }
            #[cfg(not(feature = "openai-http"))]
            {
                let _ = endpoint;
                Err(VoiceError::Unavailable("openai-http feature not enabled".into()))
            }
        }
    }
}

pub fn new_tts(
    kind: SpeechBackendKind,
    cfg: TtsConfig,
    endpoint: &SpeechEndpoint,
) -> Result<Box<dyn TtsEngine + Send>, VoiceError> {
    match kind {
        #[cfg(feature = "mock")]
        SpeechBackendKind::Mock => Ok(Box::new(crate::MockTts::new(cfg))),
        SpeechBackendKind::OpenAi => {
            #[cfg(feature = "openai-http")]
            {
                Ok(Box::new(crate::openai::OpenAiSpeech::new(
                    &endpoint.base_url,
                    &endpoint.api_key,
                    cfg.voice.as_deref(),
                )?))
            }
            #[cfg(not(feature = "openai-http"))]
            {
                let _ = (cfg, endpoint);
                Err(VoiceError::Unavailable("openai-http feature not enabled".into()))
            }
        }
        #[allow(unreachable_patterns)]
        other => Err(VoiceError::Unavailable(format!("{other:?} tts not built"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "mock")]
    #[test]
    fn mock_backends_construct() {
        let mut rec =
            new_recorder(RecorderKind::Mock, RecorderConfig::default(), "in.wav".as_ref()).unwrap();
        assert_eq!(rec.record().unwrap().duration_ms(), 5000);
        let mut tts =
            new_tts(SpeechBackendKind::Mock, TtsConfig::default(), &SpeechEndpoint::default())
                .unwrap();
        assert!(!tts.synthesize("ok").unwrap().is_empty());
    }

    #[cfg(not(feature = "openai-http"))]
    #[test]
    fn remote_backend_requires_feature() {
        assert!(matches!(
            new_transcriber(SpeechBackendKind::OpenAi, &SpeechEndpoint::default()),
            Err(VoiceError::Unavailable(_))
        ));
    }
}
