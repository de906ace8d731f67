//! Session configuration loaded from YAML (or JSON).

use action_dispatch::{MotionSettings, WorkspaceLimits};
use camera_geometry::{BoxGrid, CameraExtrinsics, CameraIntrinsics, DepthSampling};
use dialogue::{ReasoningModel, Sampling, DEFAULT_DASHSCOPE_URL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use voice_local::plugin::{RecorderKind, SpeechBackendKind};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("cannot read {path}: {reason}")]
    Io { path: PathBuf, reason: String },
    #[error("cannot parse configuration: {0}")]
    Parse(String),
    #[error("number of rounds must be at least 1, got {0}")]
    InvalidRounds(u32),
    #[error(transparent)]
    UnknownModel(#[from] dialogue::UnknownModel),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CuriConfig {
    pub reasoning: ReasoningConfig,
    pub speech: SpeechConfig,
    pub camera: CameraConfig,
    pub manipulator: ManipulatorConfig,
    pub session: SessionConfig,
    /// Flat keys of the older single-level config file; always empty after loading.
    #[serde(flatten)]
    legacy: LegacyKeys,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    pub model: String,
    pub api_key: Option<String>,
    /// Environment variable consulted when `api_key` is unset.
    pub api_key_env: String,
    pub url: String,
    pub top_p: Option<f64>,
    pub top_k: Option<u32>,
    pub timeout_secs: u64,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            model: ReasoningModel::default().as_str().to_string(),
            api_key: None,
            api_key_env: "DASHSCOPE_API_KEY".to_string(),
            url: DEFAULT_DASHSCOPE_URL.to_string(),
            top_p: None,
            top_k: None,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub backend: SpeechBackendKind,
    pub recorder: RecorderKind,
    pub api_key: Option<String>,
    pub base_url: String,
    /// Where the recorded user utterance is written or read.
    pub input_audio: PathBuf,
    /// Where the synthesized reply is written.
    pub output_audio: PathBuf,
    pub record_seconds: f32,
    pub sample_rate_hz: u32,
    pub voice: Option<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            backend: SpeechBackendKind::Mock,
            recorder: RecorderKind::Mock,
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            input_audio: PathBuf::from("user_input.wav"),
            output_audio: PathBuf::from("curi_output.wav"),
            record_seconds: 5.0,
            sample_rate_hz: 16_000,
            voice: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraSourceKind {
    Mock,
    /// Color and 16-bit depth PNGs refreshed by an external driver.
    Files,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub source: CameraSourceKind,
    pub rgb_path: PathBuf,
    pub depth_path: PathBuf,
    pub interval_ms: u64,
    pub intrinsics: CameraIntrinsics,
    pub extrinsics: Option<CameraExtrinsics>,
    pub sampling: DepthSampling,
    pub grid: BoxGrid,
    /// Plane distance of the synthetic scene.
    pub mock_depth_m: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            source: CameraSourceKind::Mock,
            rgb_path: PathBuf::from("rgb.png"),
            depth_path: PathBuf::from("depth.png"),
            interval_ms: 100,
            intrinsics: CameraIntrinsics::default(),
            extrinsics: None,
            sampling: DepthSampling::default(),
            grid: BoxGrid::default(),
            mock_depth_m: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManipulatorKind {
    Mock,
    Http,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManipulatorConfig {
    pub backend: ManipulatorKind,
    pub endpoint: String,
    pub tolerance: u32,
    pub goal_type: u8,
    pub grasp_orientation: [f64; 4],
    pub limits: Option<WorkspaceLimits>,
    pub timeout_secs: u64,
}

impl Default for ManipulatorConfig {
    fn default() -> Self {
        let motion = MotionSettings::default();
        Self {
            backend: ManipulatorKind::Mock,
            endpoint: "http://127.0.0.1:9090/manipulation".to_string(),
            tolerance: motion.tolerance,
            goal_type: motion.goal_type,
            grasp_orientation: motion.grasp_orientation,
            limits: None,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionMode {
    Voice,
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub rounds: u32,
    pub prompt_append: bool,
    /// Send the live camera frame; otherwise `local_image`.
    pub realtime: bool,
    pub local_image: PathBuf,
    pub instructions: InstructionMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rounds: 10,
            prompt_append: false,
            realtime: true,
            local_image: PathBuf::from("assets/tabletop.png"),
            instructions: InstructionMode::Voice,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
struct LegacyKeys {
    #[serde(skip_serializing_if = "Option::is_none")]
    openai_api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_input_filename: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    curigpt_output_filename: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    depth_img_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rgb_img_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    local_img_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model_name: Option<String>,
}

impl CuriConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let mut cfg: CuriConfig =
            serde_yaml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.fold_legacy();
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn fold_legacy(&mut self) {
        let legacy = std::mem::take(&mut self.legacy);
        if let Some(key) = legacy.openai_api_key {
            self.speech.api_key = Some(key);
        }
        if let Some(url) = legacy.base_url {
            self.speech.base_url = url;
        }
        if let Some(p) = legacy.user_input_filename {
            self.speech.input_audio = p;
        }
        if let Some(p) = legacy.curigpt_output_filename {
            self.speech.output_audio = p;
        }
        if let Some(p) = legacy.rgb_img_path {
            self.camera.rgb_path = p;
        }
        if let Some(p) = legacy.depth_img_path {
            self.camera.depth_path = p;
        }
        if let Some(p) = legacy.local_img_path {
            self.session.local_image = p;
        }
        if let Some(m) = legacy.model_name {
            self.reasoning.model = m;
        }
    }

    /// Start-up checks; every error here is fatal.
    pub fn validate(&self) -> Result<ReasoningModel, ConfigError> {
        if self.session.rounds < 1 {
            return Err(ConfigError::InvalidRounds(self.session.rounds));
        }
        let model: ReasoningModel = self.reasoning.model.parse()?;
        let intr = &self.camera.intrinsics;
        if intr.width == 0 || intr.height == 0 || intr.fx <= 0.0 || intr.fy <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "camera intrinsics must be positive: {intr:?}"
            )));
        }
        self.camera
            .sampling
            .check()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if let BoxGrid::Normalized { range: 0 } = self.camera.grid {
            return Err(ConfigError::Invalid("normalized grid range must be > 0".into()));
        }
        if !self.session.realtime && self.session.local_image.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "local_image is required when realtime is off".into(),
            ));
        }
        if self.camera.interval_ms == 0 {
            return Err(ConfigError::Invalid("camera interval_ms must be > 0".into()));
        }
        Ok(model)
    }

    pub fn reasoning_api_key(&self) -> Option<String> {
        self.reasoning
            .api_key
            .clone()
            .or_else(|| std::env::var(&self.reasoning.api_key_env).ok())
            .filter(|k| !k.is_empty())
    }

    /// Model defaults overridden by explicit `top_p` / `top_k`.
    pub fn sampling(&self, model: ReasoningModel) -> Sampling {
        let mut s = model.default_sampling();
        if self.reasoning.top_p.is_some() {
            s.top_p = self.reasoning.top_p;
        }
        if self.reasoning.top_k.is_some() {
            s.top_k = self.reasoning.top_k;
        }
        s
    }

    pub fn motion_settings(&self) -> MotionSettings {
        MotionSettings {
            extrinsics: self.camera.extrinsics.unwrap_or_default(),
            grasp_orientation: self.manipulator.grasp_orientation,
            tolerance: self.manipulator.tolerance,
            goal_type: self.manipulator.goal_type,
            limits: self.manipulator.limits,
        }
    }

    pub fn capture_interval(&self) -> Duration {
        Duration::from_millis(self.camera.interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_head_camera() {
        let cfg = CuriConfig::default();
        assert_eq!(cfg.camera.intrinsics.width, 640);
        assert_eq!(cfg.camera.intrinsics.fx, 345.9);
        assert_eq!(cfg.session.rounds, 10);
        assert!(cfg.session.realtime);
        assert!(!cfg.session.prompt_append);
        assert_eq!(cfg.manipulator.tolerance, 5);
        assert_eq!(cfg.manipulator.goal_type, 0);
        assert_eq!(cfg.validate(), Ok(ReasoningModel::QwenVlMax));
    }

    #[test]
    fn default_grid_accepts_prompt_exemplars() {
        let cfg = CuriConfig::default();
        let parser = action_dispatch::ReplyParser::new(cfg.camera.grid);
        let intr = cfg.camera.intrinsics;
        for turn in dialogue::base_prompt("table.png")
            .iter()
            .filter(|t| t.role == dialogue::Role::Assistant)
        {
            let reply = parser.parse(&turn.text(), intr.width, intr.height);
            assert!(reply.is_ok(), "{reply:?}");
        }
    }

    #[test]
    fn legacy_flat_keys_are_folded() {
        let json = r#"{
            "openai_api_key": "sk-test",
            "base_url": "http://localhost:8000/v1",
            "user_input_filename": "in.wav",
            "curigpt_output_filename": "out.wav",
            "depth_img_path": "d.png",
            "rgb_img_path": "c.png",
            "local_img_path": "table.png",
            "model_name": "qwen-vl-chat-v1"
        }"#;
        let cfg = CuriConfig::from_yaml_str(json).unwrap();
        assert_eq!(cfg.speech.api_key.as_deref(), Some("sk-test"));
        assert_eq!(cfg.speech.base_url, "http://localhost:8000/v1");
        assert_eq!(cfg.speech.input_audio, PathBuf::from("in.wav"));
        assert_eq!(cfg.speech.output_audio, PathBuf::from("out.wav"));
        assert_eq!(cfg.camera.depth_path, PathBuf::from("d.png"));
        assert_eq!(cfg.camera.rgb_path, PathBuf::from("c.png"));
        assert_eq!(cfg.session.local_image, PathBuf::from("table.png"));
        assert_eq!(cfg.validate(), Ok(ReasoningModel::QwenVlChatV1));
        assert!(!cfg.to_yaml().unwrap().contains("model_name"));
    }

    #[test]
    fn nested_yaml() {
        let yaml = "
session:
  rounds: 3
  prompt_append: true
camera:
  intrinsics: {width: 1280, height: 960, fx: 900.0, fy: 900.0, cx: 640.0, cy: 480.0}
  sampling: {mode: center}
  grid: {kind: normalized, range: 1000}
manipulator:
  limits: {min: [-1.0, -1.0, 0.0], max: [1.0, 1.0, 1.5]}
";
        let cfg = CuriConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(cfg.session.rounds, 3);
        assert!(cfg.session.prompt_append);
        assert_eq!(cfg.camera.sampling, DepthSampling::Center);
        assert_eq!(cfg.camera.grid, BoxGrid::Normalized { range: 1000 });
        assert!(cfg.motion_settings().limits.is_some());
        assert_eq!(cfg.camera.intrinsics.height, 960);
    }

    #[test]
    fn fatal_errors() {
        let mut cfg = CuriConfig::default();
        cfg.session.rounds = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidRounds(0)));

        let mut cfg = CuriConfig::default();
        cfg.reasoning.model = "gpt-4".into();
        assert!(matches!(cfg.validate(), Err(ConfigError::UnknownModel(_))));

        let cfg = CuriConfig::from_yaml_str("camera:\n  sampling: {mode: median, radius: 40000}")
            .unwrap();
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn sampling_overrides() {
        let mut cfg = CuriConfig::default();
        cfg.reasoning.top_k = Some(5);
        let s = cfg.sampling(ReasoningModel::QwenVlChatV1);
        assert_eq!((s.top_p, s.top_k), (Some(0.9), Some(5)));
    }

    #[test]
    fn load_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "session:\n  rounds: 2").unwrap();
        assert_eq!(CuriConfig::load(f.path()).unwrap().session.rounds, 2);
        assert!(matches!(
            CuriConfig::load(Path::new("/no/such/config.yaml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
