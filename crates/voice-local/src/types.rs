use serde::{Deserialize, Serialize};

/// Mono 16-bit PCM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub sample_rate_hz: u32,
    pub samples: Vec<i16>,
}

impl AudioClip {
    pub fn silence(sample_rate_hz: u32, duration_ms: u64) -> Self {
        let n = (sample_rate_hz as u64 * duration_ms / 1000) as usize;
        Self {
            sample_rate_hz,
            samples: vec![0; n],
        }
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate_hz == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1000 / self.sample_rate_hz as u64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    pub sample_rate_hz: u32,
    #[serde(default = "default_record_seconds")]
    pub record_seconds: f32,
}

fn default_record_seconds() -> f32 {
    5.0
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 16_000,
            record_seconds: default_record_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    pub voice: Option<String>,
    pub sample_rate_hz: u32,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            voice: None,
            sample_rate_hz: 24_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_duration() {
        let clip = AudioClip::silence(16_000, 250);
        assert_eq!(clip.samples.len(), 4000);
        assert_eq!(clip.duration_ms(), 250);
        assert!(!clip.is_empty());
        assert_eq!(AudioClip::silence(0, 100).duration_ms(), 0);
    }
}
