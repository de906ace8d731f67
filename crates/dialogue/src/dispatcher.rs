//! One request per round against the reasoning endpoint.

use crate::{ConversationSession, EndpointError, ReasoningEndpoint, SessionError};
use action_dispatch::{ReplyError, ReplyParser, StructuredReply};
use camera_geometry::BoxGrid;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Idle,
    AwaitingResponse,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueryError {
    #[error("provider error {status} {code}: {message}")]
    Provider {
        status: u16,
        code: String,
        message: String,
    },
    #[error("reasoning transport failed: {0}")]
    Transport(String),
    #[error("a request is already in flight")]
    Busy,
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl QueryError {
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::Provider { .. } => "provider_error",
            QueryError::Transport(_) => "transport_error",
            QueryError::Busy => "busy",
            QueryError::Session(_) => "session_error",
        }
    }
}

impl From<EndpointError> for QueryError {
    fn from(e: EndpointError) -> Self {
        match e {
            EndpointError::Provider {
                status,
                code,
                message,
            } => QueryError::Provider {
                status,
                code,
                message,
            },
            other => QueryError::Transport(other.to_string()),
        }
    }
}

/// A committed round. The reply text may still fail validation.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub raw: String,
    pub reply: Result<StructuredReply, ReplyError>,
}

/// Resets the dispatcher to idle however the request ends.
struct InFlight<'a>(&'a Mutex<DispatcherState>);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        *self.0.lock() = DispatcherState::Idle;
    }
}

pub struct QueryDispatcher {
    endpoint: Arc<dyn ReasoningEndpoint>,
    parser: ReplyParser,
    frame_size: (u32, u32),
    state: Mutex<DispatcherState>,
}

impl QueryDispatcher {
    /// `frame_size` is the resolution of the images sent with each round.
    pub fn new(endpoint: Arc<dyn ReasoningEndpoint>, frame_size: (u32, u32)) -> Self {
        Self {
            endpoint,
            parser: ReplyParser::default(),
            frame_size,
            state: Mutex::new(DispatcherState::Idle),
        }
    }

    pub fn with_grid(mut self, grid: BoxGrid) -> Self {
        self.parser = ReplyParser::new(grid);
        self
    }

    pub fn state(&self) -> DispatcherState {
        *self.state.lock()
    }

    /// Send history plus a new user turn and commit the exchange on success.
    ///
    /// On any endpoint failure the round is discarded and the history is unchanged.
    pub async fn query(
        &self,
        session: &mut ConversationSession,
        instruction: &str,
        image_ref: &str,
    ) -> Result<QueryOutcome, QueryError> {
        let _guard = {
            let mut state = self.state.lock();
            if *state == DispatcherState::AwaitingResponse {
                return Err(QueryError::Busy);
            }
            *state = DispatcherState::AwaitingResponse;
            InFlight(&self.state)
        };

        session.begin_round(instruction, image_ref)?;
        let round = session.round_index();
        let turns = session.request_turns();

        let reply = match self.endpoint.complete(&turns).await {
            Ok(reply) => reply,
            Err(e) => {
                session.discard_round();
                warn!(round, error = %e, "reasoning request failed");
                return Err(e.into());
            }
        };

        let raw = reply.text.clone();
        session.append_reply(reply.into_turn())?;
        let (w, h) = self.frame_size;
        let parsed = self.parser.parse(&raw, w, h);
        match &parsed {
            Ok(r) => info!(round, actions = r.actions.len(), "reply received"),
            Err(e) => warn!(round, kind = e.kind(), error = %e, "reply rejected"),
        }
        Ok(QueryOutcome { raw, reply: parsed })
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::{base_prompt, ScriptedEndpoint};
    use action_dispatch::ActionName;

    const SODA: &str = r#"{"robot_response": "Sure, here is your soda can.", "robot_actions": [
        {"action": "grasp_and_give", "parameters": {"arg1": {"description": "soda can", "bbox_coordinates": [634, 672, 815, 780]}}}]}"#;

    fn session(append: bool) -> ConversationSession {
        ConversationSession::new(base_prompt("table.png"), 3, append).unwrap()
    }

    #[tokio::test]
    async fn success_commits_and_parses() {
        let ep = Arc::new(ScriptedEndpoint::with_replies([SODA]));
        let d = QueryDispatcher::new(ep.clone(), (1280, 960));
        let mut s = session(true);
        let out = d.query(&mut s, "Can you give me the soda can on the table?", "live.png").await.unwrap();
        let reply = out.reply.unwrap();
        assert_eq!(reply.actions[0].action, ActionName::GraspAndGive);
        assert_eq!(s.history().count(), 9);
        assert_eq!(ep.requests()[0].len(), 8);
        assert_eq!(d.state(), DispatcherState::Idle);
    }

    #[tokio::test]
    async fn provider_failure_leaves_history_untouched() {
        let ep = Arc::new(ScriptedEndpoint::new());
        ep.push_error(EndpointError::Provider {
            status: 400,
            code: "InvalidParameter".to_string(),
            message: "bad image".to_string(),
        });
        ep.push_reply(SODA);
        let d = QueryDispatcher::new(ep.clone(), (1280, 960));
        let mut s = session(true);
        let before: Vec<_> = s.history().cloned().collect();

        let err = d.query(&mut s, "hello", "live.png").await.unwrap_err();
        assert_eq!(err.kind(), "provider_error");
        assert_eq!(s.history().cloned().collect::<Vec<_>>(), before);
        assert!(!s.in_round());
        assert_eq!(d.state(), DispatcherState::Idle);

        // no retry happened; next round goes through with the prefix only
        d.query(&mut s, "again", "live.png").await.unwrap();
        let reqs = ep.requests();
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[1].len(), 8);
        assert_eq!(s.round_index(), 2);
    }

    #[tokio::test]
    async fn invalid_reply_is_still_committed() {
        let ep = Arc::new(ScriptedEndpoint::with_replies([
            r#"{"robot_response": "Okay.", "robot_actions": [{"action": "juggle", "parameters": {}}]}"#,
        ]));
        let d = QueryDispatcher::new(ep, (1280, 960));
        let mut s = session(false);
        let out = d.query(&mut s, "juggle", "live.png").await.unwrap();
        let err = out.reply.unwrap_err();
        assert_eq!(err.verbal_response(), Some("Okay."));
        assert_eq!(s.round_index(), 1);
    }

    #[tokio::test]
    async fn busy_while_awaiting() {
        let d = QueryDispatcher::new(Arc::new(ScriptedEndpoint::new()), (640, 360));
        *d.state.lock() = DispatcherState::AwaitingResponse;
        let mut s = session(false);
        assert_eq!(d.query(&mut s, "x", "y").await.unwrap_err(), QueryError::Busy);
        assert_eq!(s.round_index(), 0);
    }

    #[tokio::test]
    async fn finished_session_is_refused() {
        let ep = Arc::new(ScriptedEndpoint::with_replies([SODA]));
        let d = QueryDispatcher::new(ep.clone(), (1280, 960));
        let mut s = ConversationSession::new(base_prompt("t.png"), 1, false).unwrap();
        d.query(&mut s, "a", "b").await.unwrap();
        assert_eq!(
            d.query(&mut s, "a", "b").await.unwrap_err(),
            QueryError::Session(SessionError::Finished(1))
        );
        assert_eq!(ep.requests().len(), 1);
    }
}
