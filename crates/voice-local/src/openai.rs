//! OpenAI-compatible speech endpoints (`/audio/transcriptions`, `/audio/speech`).

use crate::wav::{encode_wav, read_wav};
use crate::{AudioClip, Result, Transcriber, TtsEngine, VoiceError};
use reqwest::blocking::{multipart, Client};
use std::io::Cursor;
use std::time::Duration;
use tracing::debug;

pub struct OpenAiSpeech {
    client: Client,
    base_url: String,
    api_key: String,
    stt_model: String,
    tts_model: String,
    voice: String,
}

impl OpenAiSpeech {
    pub fn new(base_url: &str, api_key: &str, voice: Option<&str>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| VoiceError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            stt_model: "whisper-1".to_string(),
            tts_model: "tts-1".to_string(),
            voice: voice.unwrap_or("alloy").to_string(),
        })
    }
}

impl Transcriber for OpenAiSpeech {
    fn transcribe(&mut self, audio: &AudioClip) -> Result<String> {
        let err = |e: reqwest::Error| VoiceError::Transcription(e.to_string());
        let part = multipart::Part::bytes(encode_wav(audio)?)
            .file_name("instruction.wav")
            .mime_str("audio/wav")
            .map_err(err)?;
        let form = multipart::Form::new()
            .text("model", self.stt_model.clone())
            .part("file", part);
        let resp = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .map_err(err)?;
        if !resp.status().is_success() {
            return Err(VoiceError::Transcription(format!("HTTP {}", resp.status())));
        }
        let body: serde_json::Value = resp.json().map_err(err)?;
        debug!(?body, "transcription response");
        body.get("text")
            .and_then(|t| t.as_str())
            .map(|t| t.trim().to_string())
            .ok_or_else(|| VoiceError::Transcription("response without text".to_string()))
    }
}

impl TtsEngine for OpenAiSpeech {
    fn synthesize(&mut self, text: &str) -> Result<AudioClip> {
        let err = |e: reqwest::Error| VoiceError::Synthesis(e.to_string());
        let resp = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.tts_model,
                "voice": self.voice,
                "input": text,
                "response_format": "wav",
            }))
            .send()
            .map_err(err)?;
        if !resp.status().is_success() {
            return Err(VoiceError::Synthesis(format!("HTTP {}", resp.status())));
        }
        let bytes = resp.bytes().map_err(err)?;
        read_wav(Cursor::new(bytes))
    }
}
