use crate::{AudioClip, AudioRecorder, RecorderConfig, Result, VoiceError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc::{self, Sender};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Records a fixed-length utterance from the default input device.
pub struct MicRecorder {
    cfg: RecorderConfig,
}

impl MicRecorder {
    pub fn new(cfg: RecorderConfig) -> Self {
        Self { cfg }
    }
}

fn device_err(e: impl std::fmt::Display) -> VoiceError {
    VoiceError::Device(e.to_string())
}

fn build_stream<T: cpal::SizedSample>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    tx: Sender<Vec<i16>>,
    to_i16: fn(T) -> i16,
) -> Result<cpal::Stream> {
    let channels = config.channels.max(1) as usize;
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                // first channel only
                let mono: Vec<i16> = data.chunks_exact(channels).map(|f| to_i16(f[0])).collect();
                let _ = tx.send(mono);
            },
            |err| warn!("input stream error: {err}"),
            None,
        )
        .map_err(device_err)
}

impl AudioRecorder for MicRecorder {
    fn record(&mut self) -> Result<AudioClip> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| VoiceError::Device("no default input device".to_string()))?;
        let supported = device.default_input_config().map_err(device_err)?;
        let sample_rate_hz = supported.sample_rate().0;
        let format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();

        let (tx, rx) = mpsc::channel::<Vec<i16>>();
        let stream = match format {
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, tx, |s| s)?,
            cpal::SampleFormat::U16 => {
                build_stream::<u16>(&device, &config, tx, |s| (s as i32 - 32768) as i16)?
            }
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, tx, |s| {
                (s.clamp(-1.0, 1.0) * 32767.0) as i16
            })?,
            other => {
                return Err(VoiceError::Device(format!(
                    "unsupported sample format: {other:?}"
                )))
            }
        };
        stream.play().map_err(device_err)?;
        info!(seconds = self.cfg.record_seconds, "recording instruction");

        let deadline = Instant::now() + Duration::from_secs_f32(self.cfg.record_seconds.max(0.1));
        let mut samples = Vec::new();
        while let Some(left) = deadline.checked_duration_since(Instant::now()) {
            match rx.recv_timeout(left) {
                Ok(chunk) => samples.extend_from_slice(&chunk),
                Err(mpsc::RecvTimeoutError::Timeout) => break,
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(VoiceError::Device("input stream closed".to_string()))
                }
            }
        }
        drop(stream);
        Ok(AudioClip {
            sample_rate_hz,
            samples,
        })
    }
}
