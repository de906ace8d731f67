use crate::{AudioClip, AudioRecorder, AudioSink, Result, Transcriber, TtsConfig, TtsEngine, VoiceError};
use std::collections::VecDeque;

/// Records a fixed stretch of silence.
pub struct MockRecorder {
    sample_rate_hz: u32,
    duration_ms: u64,
}

impl MockRecorder {
    pub fn new(sample_rate_hz: u32, duration_ms: u64) -> Self {
        Self {
            sample_rate_hz,
            duration_ms,
        }
    }
}

impl AudioRecorder for MockRecorder {
    fn record(&mut self) -> Result<AudioClip> {
        Ok(AudioClip::silence(self.sample_rate_hz, self.duration_ms))
    }
}

/// Hands out scripted utterances in order, one per call.
pub struct MockTranscriber {
    script: VecDeque<String>,
}

impl MockTranscriber {
    pub fn scripted<I, S>(utterances: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: utterances.into_iter().map(Into::into).collect(),
        }
    }
}

impl Transcriber for MockTranscriber {
    fn transcribe(&mut self, _audio: &AudioClip) -> Result<String> {
        self.script
            .pop_front()
            .ok_or_else(|| VoiceError::Transcription("mock script exhausted".to_string()))
    }
}

pub struct MockTts {
    cfg: TtsConfig,
}

impl MockTts {
    pub fn new(cfg: TtsConfig) -> Self {
        Self { cfg }
    }
}

impl TtsEngine for MockTts {
    fn synthesize(&mut self, text: &str) -> Result<AudioClip> {
        // 440Hz placeholder whose length follows the text length
        let sr = self.cfg.sample_rate_hz.max(8000);
        let dur_s = (text.len() as f32 / 10.0).clamp(0.2, 1.0);
        let frames = (sr as f32 * dur_s) as usize;
        let freq = 440.0_f32;
        let samples = (0..frames)
            .map(|n| {
                let t = n as f32 / sr as f32;
                ((2.0 * std::f32::consts::PI * freq * t).sin() * 3000.0) as i16
            })
            .collect();
        Ok(AudioClip {
            sample_rate_hz: sr,
            samples,
        })
    }
}

/// Discards audio.
#[derive(Default)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn play(&mut self, _clip: &AudioClip) -> Result<()> {
        Ok(())
    }
}
