//! The round loop: instruction, query, speak, dispatch.

use crate::{
    CaptureController, CaptureError, ConfigError, CuriConfig, FrameBuffer, FrameReader,
    InstructionSource, Speaker,
};
use action_dispatch::{
    ActionName, DispatchError, DispatchResult, DispatchTable, ManipulatorService, ReplyError,
};
use camera_geometry::{encode_png_data_uri, CameraIntrinsics, CameraSource, GeometryError, RgbdFrame};
use dialogue::{base_prompt, ConversationSession, QueryDispatcher, QueryError, ReasoningEndpoint, SessionError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// How long a round waits for the first camera frame.
const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-round failures. None of these end the session.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RoundError {
    #[error("transcription failed: {0}")]
    Transcription(String),
    #[error("no camera frame available")]
    NoFrame,
    #[error("frame encoding failed: {0}")]
    Frame(GeometryError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Reply(#[from] ReplyError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl RoundError {
    pub fn kind(&self) -> &'static str {
        match self {
            RoundError::Transcription(_) => "transcription_error",
            RoundError::NoFrame => "no_frame",
            RoundError::Frame(_) => "frame_error",
            RoundError::Query(e) => e.kind(),
            RoundError::Reply(e) => e.kind(),
            RoundError::Dispatch(e) => e.kind(),
        }
    }

    pub fn action(&self) -> Option<ActionName> {
        match self {
            RoundError::Dispatch(e) => Some(e.action()),
            RoundError::Reply(ReplyError::InvalidArguments { action, .. }) => Some(*action),
            _ => None,
        }
    }

    /// Action name for logs; an unknown action keeps the name the model used.
    pub fn action_label(&self) -> Option<String> {
        match self {
            RoundError::Reply(ReplyError::UnknownAction { action, .. }) => Some(action.clone()),
            _ => self.action().map(|a| a.to_string()),
        }
    }
}

/// Errors that stop a session before or instead of running rounds.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoundReport {
    pub round: u32,
    pub instruction: Option<String>,
    pub verbal_response: Option<String>,
    pub dispatched: Option<DispatchResult>,
    pub error: Option<RoundError>,
}

impl RoundReport {
    fn new(round: u32) -> Self {
        Self {
            round,
            instruction: None,
            verbal_response: None,
            dispatched: None,
            error: None,
        }
    }

    fn failed(mut self, error: RoundError) -> Self {
        match error.action_label() {
            Some(action) => error!(
                kind = error.kind(),
                round = self.round,
                action = %action,
                error = %error,
                "round failed"
            ),
            None => error!(kind = error.kind(), round = self.round, error = %error, "round failed"),
        }
        self.error = Some(error);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub rounds: Vec<RoundReport>,
    pub cancelled: bool,
}

impl SessionSummary {
    pub fn dispatched(&self) -> impl Iterator<Item = &DispatchResult> {
        self.rounds.iter().filter_map(|r| r.dispatched.as_ref())
    }

    pub fn failures(&self) -> impl Iterator<Item = &RoundError> {
        self.rounds.iter().filter_map(|r| r.error.as_ref())
    }
}

/// Collaborators a session runs against.
pub struct PipelineParts {
    pub camera: Box<dyn CameraSource + Send>,
    pub endpoint: Arc<dyn ReasoningEndpoint>,
    pub manipulator: Arc<dyn ManipulatorService>,
    pub instructions: Box<dyn InstructionSource>,
    pub speaker: Arc<dyn Speaker>,
}

pub struct Pipeline {
    config: CuriConfig,
    capture: CaptureController,
    frames: FrameReader,
    dispatcher: QueryDispatcher,
    table: DispatchTable,
    instructions: Box<dyn InstructionSource>,
    speaker: Arc<dyn Speaker>,
    intrinsics: CameraIntrinsics,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Validates the configuration; nothing is started yet.
    pub fn new(
        config: CuriConfig,
        parts: PipelineParts,
        cancel: CancellationToken,
    ) -> Result<Self, PipelineError> {
        let model = config.validate()?;
        let intrinsics = config.camera.intrinsics;
        let (buffer, frames) = FrameBuffer::channel();
        let capture = CaptureController::new(
            parts.camera,
            buffer,
            config.capture_interval(),
            cancel.clone(),
        );
        let dispatcher = QueryDispatcher::new(parts.endpoint, (intrinsics.width, intrinsics.height))
            .with_grid(config.camera.grid);
        let table = DispatchTable::with_default_handlers(parts.manipulator, config.motion_settings())
            .with_grid(config.camera.grid)
            .with_sampling(config.camera.sampling);
        info!(%model, rounds = config.session.rounds, realtime = config.session.realtime, "pipeline configured");
        Ok(Self {
            config,
            capture,
            frames,
            dispatcher,
            table,
            instructions: parts.instructions,
            speaker: parts.speaker,
            intrinsics,
            cancel,
        })
    }

    pub fn capture_stats(&self) -> Arc<crate::CaptureStats> {
        self.capture.stats()
    }

    /// Run every round, then stop capture whatever happened.
    pub async fn run(mut self) -> Result<SessionSummary, PipelineError> {
        let session_id = Uuid::new_v4();
        let exemplar = self.config.session.local_image.to_string_lossy().into_owned();
        let mut session = ConversationSession::new(
            base_prompt(&exemplar),
            self.config.session.rounds,
            self.config.session.prompt_append,
        )?;

        let handle = self.capture.start_capture()?;
        info!(%session_id, "session started");
        let mut rounds = Vec::new();
        while !session.is_finished() && !self.cancel.is_cancelled() {
            match self.round(&mut session).await {
                Some(report) => rounds.push(report),
                None => break,
            }
        }
        self.capture.stop_capture(handle);

        let cancelled = self.cancel.is_cancelled();
        info!(%session_id, rounds = rounds.len(), cancelled, "session finished");
        Ok(SessionSummary {
            session_id,
            rounds,
            cancelled,
        })
    }

    /// `None` when the session was cancelled while waiting for an instruction.
    async fn round(&mut self, session: &mut ConversationSession) -> Option<RoundReport> {
        let next = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return None,
            next = self.instructions.next_instruction() => next,
        };
        let instruction = match next {
            Ok(text) => text,
            Err(e) => {
                let round = session.skip_round().ok()?;
                return Some(RoundReport::new(round).failed(RoundError::Transcription(e.to_string())));
            }
        };

        let round = session.round_index() + 1;
        let mut report = RoundReport::new(round);
        report.instruction = Some(instruction.clone());
        info!(round, instruction = %instruction, "instruction received");

        let snapshot = self.frames.wait_for_frame(FIRST_FRAME_TIMEOUT).await;
        let image_ref = match self.image_ref(snapshot.as_deref()) {
            Ok(r) => r,
            Err(e) => {
                let _ = session.skip_round();
                return Some(report.failed(e));
            }
        };

        let outcome = match self.dispatcher.query(session, &instruction, &image_ref).await {
            Ok(o) => o,
            Err(e) => return Some(report.failed(e.into())),
        };

        // the verbal channel survives a broken action block
        let verbal = match &outcome.reply {
            Ok(r) => r.verbal_response.clone(),
            Err(e) => e.verbal_response().map(str::to_string),
        };
        if let Some(text) = &verbal {
            if let Err(e) = self.speaker.speak(text).await {
                warn!(round, error = %e, "speaking the reply failed");
            }
        }
        report.verbal_response = verbal;

        let reply = match outcome.reply {
            Ok(r) => r,
            Err(e) => return Some(report.failed(e.into())),
        };
        let Some(frame) = snapshot else {
            if reply.actions.is_empty() {
                return Some(report);
            }
            return Some(report.failed(RoundError::NoFrame));
        };
        match self
            .table
            .dispatch_first(&reply, &frame.color, &frame.depth, &self.intrinsics)
            .await
        {
            None => Some(report),
            Some(Ok(done)) => {
                info!(round, action = %done.action, "action completed");
                report.dispatched = Some(done);
                Some(report)
            }
            Some(Err(e)) => Some(report.failed(e.into())),
        }
    }

    fn image_ref(&self, frame: Option<&RgbdFrame>) -> Result<String, RoundError> {
        if !self.config.session.realtime {
            return Ok(self.config.session.local_image.to_string_lossy().into_owned());
        }
        let frame = frame.ok_or(RoundError::NoFrame)?;
        encode_png_data_uri(&frame.color).map_err(RoundError::Frame)
    }
}
