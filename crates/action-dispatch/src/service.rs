//! Manipulator control service seam.

use crate::ActionName;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Target pose in the robot base frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseTarget {
    pub label: String,
    /// Metres, base frame.
    pub position: [f64; 3],
    /// Quaternion `[x, y, z, w]`.
    pub orientation: [f64; 4],
}

/// One manipulation goal. Each request is independent of the ones before it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManipulatorRequest {
    pub action: ActionName,
    pub goal_type: u8,
    pub tolerance: u32,
    pub targets: Vec<PoseTarget>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManipulatorResponse {
    pub succeeded: bool,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ServiceError {
    #[error("manipulator service unavailable: {0}")]
    Unavailable(String),
    #[error("manipulator transport error: {0}")]
    Transport(String),
    #[error("unexpected manipulator response: {0}")]
    Protocol(String),
}

#[async_trait]
pub trait ManipulatorService: Send + Sync {
    async fn execute(&self, request: ManipulatorRequest)
        -> Result<ManipulatorResponse, ServiceError>;
}

#[cfg(feature = "mock")]
pub use mock::{MockManipulator, MockOutcome};

#[cfg(feature = "mock")]
mod mock {
    use super::*;
    use parking_lot::Mutex;

    /// How the mock answers the next requests.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub enum MockOutcome {
        #[default]
        Succeed,
        Reject,
        Unavailable,
    }

    /// Records every request it receives.
    #[derive(Debug, Default)]
    pub struct MockManipulator {
        calls: Mutex<Vec<ManipulatorRequest>>,
        outcome: Mutex<MockOutcome>,
    }

    impl MockManipulator {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_outcome(outcome: MockOutcome) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                outcome: Mutex::new(outcome),
            }
        }

        pub fn set_outcome(&self, outcome: MockOutcome) {
            *self.outcome.lock() = outcome;
        }

        pub fn calls(&self) -> Vec<ManipulatorRequest> {
            self.calls.lock().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl ManipulatorService for MockManipulator {
        async fn execute(
            &self,
            request: ManipulatorRequest,
        ) -> Result<ManipulatorResponse, ServiceError> {
            tracing::debug!(action = %request.action, targets = request.targets.len(), "mock manipulator request");
            self.calls.lock().push(request);
            match *self.outcome.lock() {
                MockOutcome::Succeed => Ok(ManipulatorResponse { succeeded: true }),
                MockOutcome::Reject => Ok(ManipulatorResponse { succeeded: false }),
                MockOutcome::Unavailable => {
                    Err(ServiceError::Unavailable("mock is offline".to_string()))
                }
            }
        }
    }
}
