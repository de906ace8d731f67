//! Build pipeline collaborators from configuration.

use crate::config::{CameraSourceKind, ManipulatorKind};
use crate::{
    CuriConfig, InstructionMode, InstructionSource, PipelineParts, Speaker, TextInstructions,
    TextSpeaker, VoiceInstructions, VoiceSpeaker,
};
use action_dispatch::ManipulatorService;
use camera_geometry::{CameraSource, FileCamera};
use dialogue::{ReasoningEndpoint, ReasoningModel};
use std::sync::Arc;
use thiserror::Error;
use voice_local::plugin::{new_recorder, new_transcriber, new_tts, SpeechEndpoint};
use voice_local::{RecorderConfig, TtsConfig, VoiceError, WavFileSink};

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("{0} is not built into this binary")]
    Unavailable(&'static str),
    #[error("missing credential: {0}")]
    MissingCredential(String),
    #[error("voice backend: {0}")]
    Voice(#[from] VoiceError),
    #[error("backend construction failed: {0}")]
    Backend(String),
}

pub fn camera_from_config(cfg: &CuriConfig) -> Result<Box<dyn CameraSource + Send>, SetupError> {
    let cam = &cfg.camera;
    match cam.source {
        CameraSourceKind::Files => Ok(Box::new(FileCamera::new(&cam.rgb_path, &cam.depth_path))),
        CameraSourceKind::Mock => {
            #[cfg(feature = "mock")]
            {
                Ok(Box::new(camera_geometry::MockCamera::new(
                    cam.intrinsics.width,
                    cam.intrinsics.height,
                    cam.mock_depth_m,
                )))
            }
            #[cfg(not(feature = "mock"))]
            {
                Err(SetupError::Unavailable("mock camera"))
            }
        }
    }
}

pub fn manipulator_from_config(cfg: &CuriConfig) -> Result<Arc<dyn ManipulatorService>, SetupError> {
    match cfg.manipulator.backend {
        ManipulatorKind::Mock => {
            #[cfg(feature = "mock")]
            {
                Ok(Arc::new(action_dispatch::MockManipulator::new()))
            }
            #[cfg(not(feature = "mock"))]
            {
                Err(SetupError::Unavailable("mock manipulator"))
            }
        }
        ManipulatorKind::Http => {
            #[cfg(feature = "http")]
            {
                let timeout = std::time::Duration::from_secs(cfg.manipulator.timeout_secs);
                let client =
                    action_dispatch::HttpManipulator::new(&cfg.manipulator.endpoint, timeout)
                        .map_err(|e| SetupError::Backend(e.to_string()))?;
                Ok(Arc::new(client))
            }
            #[cfg(not(feature = "http"))]
            {
                Err(SetupError::Unavailable("HTTP manipulator client"))
            }
        }
    }
}

/// DashScope client for `model`; needs the `http` feature and an API key.
pub fn endpoint_from_config(
    cfg: &CuriConfig,
    model: ReasoningModel,
) -> Result<Arc<dyn ReasoningEndpoint>, SetupError> {
    #[cfg(feature = "http")]
    {
        let api_key = cfg.reasoning_api_key().ok_or_else(|| {
            SetupError::MissingCredential(format!(
                "reasoning.api_key or ${}",
                cfg.reasoning.api_key_env
            ))
        })?;
        let endpoint = dialogue::DashScopeEndpoint::new(dialogue::DashScopeConfig {
            url: cfg.reasoning.url.clone(),
            api_key,
            model,
            sampling: cfg.sampling(model),
            timeout: std::time::Duration::from_secs(cfg.reasoning.timeout_secs),
        })
        .map_err(|e| SetupError::Backend(e.to_string()))?;
        Ok(Arc::new(endpoint))
    }
    #[cfg(not(feature = "http"))]
    {
        let _ = (cfg, model);
        Err(SetupError::Unavailable("DashScope reasoning client"))
    }
}

/// Instruction source and speaker for the configured interaction mode.
pub fn voice_from_config(
    cfg: &CuriConfig,
) -> Result<(Box<dyn InstructionSource>, Arc<dyn Speaker>), SetupError> {
    if cfg.session.instructions == InstructionMode::Text {
        return Ok((
            Box::new(TextInstructions::stdin().map_err(|e| SetupError::Backend(e.to_string()))?),
            Arc::new(TextSpeaker::echoing()),
        ));
    }
    let speech = &cfg.speech;
    let endpoint = SpeechEndpoint {
        base_url: speech.base_url.clone(),
        api_key: speech.api_key.clone().unwrap_or_default(),
    };
    let recorder = new_recorder(
        speech.recorder,
        RecorderConfig {
            sample_rate_hz: speech.sample_rate_hz,
            record_seconds: speech.record_seconds,
        },
        &speech.input_audio,
    )?;
    let transcriber = new_transcriber(speech.backend, &endpoint)?;
    let tts = new_tts(
        speech.backend,
        TtsConfig {
            voice: speech.voice.clone(),
            ..TtsConfig::default()
        },
        &endpoint,
    )?;
    let sink = Box::new(WavFileSink::new(&speech.output_audio));
    Ok((
        Box::new(VoiceInstructions::new(recorder, transcriber)),
        Arc::new(VoiceSpeaker::new(tts, sink)),
    ))
}

/// Everything except the reasoning endpoint, which callers pick (live or scripted).
pub fn parts_from_config(
    cfg: &CuriConfig,
    endpoint: Arc<dyn ReasoningEndpoint>,
) -> Result<PipelineParts, SetupError> {
    let (instructions, speaker) = voice_from_config(cfg)?;
    Ok(PipelineParts {
        camera: camera_from_config(cfg)?,
        endpoint,
        manipulator: manipulator_from_config(cfg)?,
        instructions,
        speaker,
    })
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;

    #[test]
    fn mock_camera_follows_intrinsics() {
        let mut cfg = CuriConfig::default();
        cfg.camera.intrinsics.width = 320;
        cfg.camera.intrinsics.height = 180;
        let frame = camera_from_config(&cfg).unwrap().read().unwrap();
        assert_eq!((frame.color.width, frame.depth.height), (320, 180));
    }

    #[test]
    fn text_mode_needs_no_speech_backend() {
        let mut cfg = CuriConfig::default();
        cfg.session.instructions = InstructionMode::Text;
        assert!(voice_from_config(&cfg).is_ok());
    }

    #[test]
    fn mock_voice_has_no_transcriber() {
        // a scripted transcriber only makes sense in tests
        assert!(matches!(
            voice_from_config(&CuriConfig::default()),
            Err(SetupError::Voice(VoiceError::Unavailable(_)))
        ));
    }

    #[cfg(not(feature = "http"))]
    #[test]
    fn http_backends_need_feature() {
        let mut cfg = CuriConfig::default();
        cfg.manipulator.backend = ManipulatorKind::Http;
        assert!(matches!(
            manipulator_from_config(&cfg),
            Err(SetupError::Unavailable(_))
        ));
        assert!(endpoint_from_config(&cfg, ReasoningModel::QwenVlMax).is_err());
    }
}
