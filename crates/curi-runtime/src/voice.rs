//! Where instructions come from and where replies are spoken.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::io::BufRead;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, info};
use voice_local::{AudioRecorder, AudioSink, Transcriber, TtsEngine, VoiceError};

/// Produces the next user instruction. Failures abort only the current round.
#[async_trait]
pub trait InstructionSource: Send {
    async fn next_instruction(&mut self) -> Result<String, VoiceError>;
}

/// Record an utterance, then transcribe it. Both stages block, so they run off the runtime.
pub struct VoiceInstructions {
    recorder: Arc<Mutex<Box<dyn AudioRecorder + Send>>>,
    transcriber: Arc<Mutex<Box<dyn Transcriber + Send>>>,
}

impl VoiceInstructions {
    pub fn new(
        recorder: Box<dyn AudioRecorder + Send>,
        transcriber: Box<dyn Transcriber + Send>,
    ) -> Self {
        Self {
            recorder: Arc::new(Mutex::new(recorder)),
            transcriber: Arc::new(Mutex::new(transcriber)),
        }
    }
}

fn join_error(e: tokio::task::JoinError) -> VoiceError {
    VoiceError::Transcription(format!("audio task failed: {e}"))
}

#[async_trait]
impl InstructionSource for VoiceInstructions {
    async fn next_instruction(&mut self) -> Result<String, VoiceError> {
        let recorder = self.recorder.clone();
        let clip = tokio::task::spawn_blocking(move || recorder.lock().record())
            .await
            .map_err(join_error)??;
        debug!(duration_ms = clip.duration_ms(), "utterance recorded");

        let transcriber = self.transcriber.clone();
        let text = tokio::task::spawn_blocking(move || transcriber.lock().transcribe(&clip))
            .await
            .map_err(join_error)??;
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(VoiceError::Transcription("empty transcription".to_string()));
        }
        Ok(text)
    }
}

/// One line per instruction from a text stream (stdin in the CLI).
///
/// Lines are read on a detached std thread, so a pending read never holds up
/// runtime shutdown.
pub struct TextInstructions {
    lines: mpsc::Receiver<std::io::Result<String>>,
    prompt: bool,
}

impl TextInstructions {
    /// Spawn the reader thread; `open` runs on it and yields the line source.
    pub fn spawn<F, R>(open: F) -> std::io::Result<Self>
    where
        F: FnOnce() -> R + Send + 'static,
        R: BufRead,
    {
        let (tx, rx) = mpsc::channel(1);
        std::thread::Builder::new()
            .name("curi-text-input".into())
            .spawn(move || {
                for line in open().lines() {
                    let failed = line.is_err();
                    if tx.blocking_send(line).is_err() || failed {
                        break;
                    }
                }
                debug!("text input closed");
            })?;
        Ok(Self {
            lines: rx,
            prompt: false,
        })
    }

    pub fn stdin() -> std::io::Result<Self> {
        Ok(Self::spawn(|| std::io::stdin().lock())?.with_prompt())
    }

    /// Print an input prompt on stderr before each read.
    pub fn with_prompt(mut self) -> Self {
        self.prompt = true;
        self
    }
}

#[async_trait]
impl InstructionSource for TextInstructions {
    async fn next_instruction(&mut self) -> Result<String, VoiceError> {
        if self.prompt {
            let mut err = tokio::io::stderr();
            let _ = err.write_all(b"Please input your instruction: ").await;
            let _ = err.flush().await;
        }
        let line = self
            .lines
            .recv()
            .await
            .ok_or_else(|| VoiceError::Unavailable("instruction stream closed".to_string()))?
            .map_err(|e| VoiceError::Io(e.to_string()))?;
        let line = line.trim();
        if line.is_empty() {
            return Err(VoiceError::Transcription("empty instruction".to_string()));
        }
        Ok(line.to_string())
    }
}

/// Canned instructions or failures, in order.
#[derive(Debug, Default)]
pub struct ScriptedInstructions {
    script: VecDeque<Result<String, VoiceError>>,
}

impl ScriptedInstructions {
    pub fn new<I, S>(instructions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: instructions.into_iter().map(|s| Ok(s.into())).collect(),
        }
    }

    pub fn push_failure(&mut self, error: VoiceError) {
        self.script.push_back(Err(error));
    }

    pub fn push(&mut self, instruction: impl Into<String>) {
        self.script.push_back(Ok(instruction.into()));
    }
}

#[async_trait]
impl InstructionSource for ScriptedInstructions {
    async fn next_instruction(&mut self) -> Result<String, VoiceError> {
        self.script
            .pop_front()
            .unwrap_or_else(|| Err(VoiceError::Unavailable("script exhausted".to_string())))
    }
}

/// Delivers the verbal channel to the user.
#[async_trait]
pub trait Speaker: Send + Sync {
    async fn speak(&self, text: &str) -> Result<(), VoiceError>;
}

/// Synthesize with a TTS engine and play into a sink.
pub struct VoiceSpeaker {
    tts: Arc<Mutex<Box<dyn TtsEngine + Send>>>,
    sink: Arc<Mutex<Box<dyn AudioSink + Send>>>,
}

impl VoiceSpeaker {
    pub fn new(tts: Box<dyn TtsEngine + Send>, sink: Box<dyn AudioSink + Send>) -> Self {
        Self {
            tts: Arc::new(Mutex::new(tts)),
            sink: Arc::new(Mutex::new(sink)),
        }
    }
}

#[async_trait]
impl Speaker for VoiceSpeaker {
    async fn speak(&self, text: &str) -> Result<(), VoiceError> {
        let (tts, sink) = (self.tts.clone(), self.sink.clone());
        let text = text.to_string();
        tokio::task::spawn_blocking(move || {
            let clip = tts.lock().synthesize(&text)?;
            sink.lock().play(&clip)
        })
        .await
        .map_err(|e| VoiceError::Synthesis(format!("speech task failed: {e}")))?
    }
}

/// Prints replies instead of speaking them, and remembers what was said.
#[derive(Debug, Default)]
pub struct TextSpeaker {
    spoken: Mutex<Vec<String>>,
    echo: bool,
}

impl TextSpeaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also write each reply to stdout.
    pub fn echoing() -> Self {
        Self {
            spoken: Mutex::new(Vec::new()),
            echo: true,
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().clone()
    }
}

#[async_trait]
impl Speaker for TextSpeaker {
    async fn speak(&self, text: &str) -> Result<(), VoiceError> {
        info!(reply = text, "robot says");
        if self.echo {
            let mut out = tokio::io::stdout();
            out.write_all(format!("CURI: {text}\n").as_bytes())
                .await
                .map_err(|e| VoiceError::Io(e.to_string()))?;
            out.flush().await.map_err(|e| VoiceError::Io(e.to_string()))?;
        }
        self.spoken.lock().push(text.to_string());
        Ok(())
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use voice_local::{MockRecorder, MockTranscriber, MockTts, NullSink, TtsConfig};

    #[tokio::test]
    async fn voice_round_trip() {
        let mut src = VoiceInstructions::new(
            Box::new(MockRecorder::new(16_000, 100)),
            Box::new(MockTranscriber::scripted(["  give me the cup  ", ""])),
        );
        assert_eq!(src.next_instruction().await.unwrap(), "give me the cup");
        assert!(matches!(
            src.next_instruction().await,
            Err(VoiceError::Transcription(_))
        ));
        // exhausted script surfaces as a transcription failure too
        assert!(matches!(
            src.next_instruction().await,
            Err(VoiceError::Transcription(_))
        ));
    }

    #[tokio::test]
    async fn text_lines() {
        let input: &'static [u8] = b"first\n\n  second  \n";
        let mut src = TextInstructions::spawn(move || input).unwrap();
        assert_eq!(src.next_instruction().await.unwrap(), "first");
        assert!(src.next_instruction().await.is_err());
        assert_eq!(src.next_instruction().await.unwrap(), "second");
        assert!(matches!(
            src.next_instruction().await,
            Err(VoiceError::Unavailable(_))
        ));
    }

    #[test]
    fn runtime_shuts_down_while_reader_blocks() {
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        let reader = std::io::BufReader::new(BlockedUntil(rx));
        let mut src = TextInstructions::spawn(move || reader).unwrap();
        let rt = tokio::runtime::Runtime::new().unwrap();
        let pending = rt.block_on(async {
            tokio::time::timeout(
                std::time::Duration::from_millis(20),
                src.next_instruction(),
            )
            .await
        });
        assert!(pending.is_err());
        let started = std::time::Instant::now();
        drop(rt);
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
        drop(src);
        drop(tx);
    }

    /// Reader that blocks until its sender goes away, then reports EOF.
    struct BlockedUntil(std::sync::mpsc::Receiver<()>);

    impl std::io::Read for BlockedUntil {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    #[tokio::test]
    async fn speakers() {
        let v = VoiceSpeaker::new(Box::new(MockTts::new(TtsConfig::default())), Box::new(NullSink));
        v.speak("hello").await.unwrap();
        let t = TextSpeaker::new();
        t.speak("Sure thing.").await.unwrap();
        assert_eq!(t.spoken(), ["Sure thing."]);
    }

    #[tokio::test]
    async fn scripted_failures_in_order() {
        let mut s = ScriptedInstructions::new(["a"]);
        s.push_failure(VoiceError::Transcription("noise".into()));
        assert_eq!(s.next_instruction().await.unwrap(), "a");
        assert!(s.next_instruction().await.is_err());
        assert!(s.next_instruction().await.is_err());
    }
}
