//! WAV file endpoints for the recorded instruction and the spoken reply.

use crate::{AudioClip, AudioRecorder, AudioSink, Result, VoiceError};
use std::io::{Cursor, Read, Seek, Write};
use std::path::PathBuf;
use tracing::debug;

fn spec(sample_rate: u32) -> hound::WavSpec {
    hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

pub fn write_wav<W: Write + Seek>(out: W, clip: &AudioClip) -> Result<()> {
    let mut writer = hound::WavWriter::new(out, spec(clip.sample_rate_hz))?;
    for &s in &clip.samples {
        writer.write_sample(s)?;
    }
    writer.finalize()?;
    Ok(())
}

pub fn encode_wav(clip: &AudioClip) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    write_wav(&mut buf, clip)?;
    Ok(buf.into_inner())
}

/// Decode 16-bit PCM WAV, keeping the first channel.
pub fn read_wav<R: Read>(input: R) -> Result<AudioClip> {
    let mut reader = hound::WavReader::new(input)?;
    let spec = reader.spec();
    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(VoiceError::Io(format!(
            "unsupported WAV format: {:?} {} bits",
            spec.sample_format, spec.bits_per_sample
        )));
    }
    let channels = spec.channels.max(1) as usize;
    let samples = reader
        .samples::<i16>()
        .step_by(channels)
        .collect::<core::result::Result<Vec<_>, _>>()?;
    Ok(AudioClip {
        sample_rate_hz: spec.sample_rate,
        samples,
    })
}

/// Reads the instruction from a WAV file written by an external recorder.
pub struct WavFileRecorder {
    path: PathBuf,
}

impl WavFileRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AudioRecorder for WavFileRecorder {
    fn record(&mut self) -> Result<AudioClip> {
        let file = std::fs::File::open(&self.path)
            .map_err(|e| VoiceError::Io(format!("{}: {e}", self.path.display())))?;
        read_wav(std::io::BufReader::new(file))
    }
}

/// Writes each reply to the same output file, replacing the previous one.
pub struct WavFileSink {
    path: PathBuf,
}

impl WavFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AudioSink for WavFileSink {
    fn play(&mut self, clip: &AudioClip) -> Result<()> {
        let file = std::fs::File::create(&self.path)
            .map_err(|e| VoiceError::Io(format!("{}: {e}", self.path.display())))?;
        write_wav(std::io::BufWriter::new(file), clip)?;
        debug!(path = %self.path.display(), ms = clip.duration_ms(), "reply audio written");
        Ok(())
    }
}
