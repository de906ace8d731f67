//! dialogue: multi-round multimodal conversation with a vision-language model

mod turn;
pub use turn::{ContentItem, Role, Turn};

mod session;
pub use session::{ConversationSession, SessionError};

mod prompt;
pub use prompt::base_prompt;

mod model;
pub use model::{ReasoningModel, Sampling, UnknownModel, DEFAULT_DASHSCOPE_URL};

mod endpoint;
pub use endpoint::{EndpointError, EndpointReply, ReasoningEndpoint};

mod dispatcher;
pub use dispatcher::{DispatcherState, QueryDispatcher, QueryError, QueryOutcome};

#[cfg(feature = "mock")]
mod scripted;
#[cfg(feature = "mock")]
pub use scripted::ScriptedEndpoint;

#[cfg(feature = "dashscope-http")]
mod dashscope;
#[cfg(feature = "dashscope-http")]
pub use dashscope::{DashScopeConfig, DashScopeEndpoint};
