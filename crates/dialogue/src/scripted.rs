use crate::{EndpointError, EndpointReply, ReasoningEndpoint, Role, Turn};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Replays canned replies in order and records every request.
#[derive(Debug, Default)]
pub struct ScriptedEndpoint {
    script: Mutex<VecDeque<Result<String, EndpointError>>>,
    requests: Mutex<Vec<Vec<Turn>>>,
}

impl ScriptedEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let s = Self::new();
        for r in replies {
            s.push_reply(r);
        }
        s
    }

    pub fn push_reply(&self, text: impl Into<String>) {
        self.script.lock().push_back(Ok(text.into()));
    }

    pub fn push_error(&self, error: EndpointError) {
        self.script.lock().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<Vec<Turn>> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ReasoningEndpoint for ScriptedEndpoint {
    async fn complete(&self, turns: &[Turn]) -> Result<EndpointReply, EndpointError> {
        self.requests.lock().push(turns.to_vec());
        let next = self.script.lock().pop_front();
        match next {
            Some(Ok(text)) => Ok(EndpointReply {
                role: Role::Assistant,
                text,
            }),
            Some(Err(e)) => Err(e),
            None => Err(EndpointError::Transport("script exhausted".to_string())),
        }
    }
}
