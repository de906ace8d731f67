use crate::{Role, Turn};
use async_trait::async_trait;
use thiserror::Error;

/// Assistant message returned by a successful call.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointReply {
    pub role: Role,
    pub text: String,
}

impl EndpointReply {
    pub fn into_turn(self) -> Turn {
        Turn {
            role: self.role,
            content: vec![crate::ContentItem::text(self.text)],
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EndpointError {
    /// Non-OK answer from the provider.
    #[error("provider returned {status} {code}: {message}")]
    Provider {
        status: u16,
        code: String,
        message: String,
    },
    #[error("transport error: {0}")]
    Transport(String),
    /// The request could not be assembled (unreadable image, bad endpoint).
    #[error("invalid request: {0}")]
    Request(String),
    #[error("unexpected response payload: {0}")]
    Payload(String),
}

/// Multimodal chat completion over an ordered turn list.
#[async_trait]
pub trait ReasoningEndpoint: Send + Sync {
    async fn complete(&self, turns: &[Turn]) -> Result<EndpointReply, EndpointError>;
}
