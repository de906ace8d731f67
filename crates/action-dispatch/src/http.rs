//! JSON-over-HTTP client for the manipulator control bridge.

use crate::{ManipulatorRequest, ManipulatorResponse, ManipulatorService, ServiceError};
use async_trait::async_trait;
use std::time::Duration;

pub struct HttpManipulator {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpManipulator {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ManipulatorService for HttpManipulator {
    async fn execute(
        &self,
        request: ManipulatorRequest,
    ) -> Result<ManipulatorResponse, ServiceError> {
        let start = std::time::Instant::now();
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ServiceError::Unavailable(e.to_string())
                } else {
                    ServiceError::Transport(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ServiceError::Transport(format!("HTTP {status}")));
        }
        let body: ManipulatorResponse = resp
            .json()
            .await
            .map_err(|e| ServiceError::Protocol(e.to_string()))?;
        tracing::debug!(
            action = %request.action,
            succeeded = body.succeeded,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "manipulator replied"
        );
        Ok(body)
    }
}
