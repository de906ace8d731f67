//! action-dispatch: validate model-proposed actions and ground them as manipulator goals

mod action;
pub use action::{ActionArgument, ActionDescriptor, ActionName, ArgSlot, StructuredReply};

pub mod wire;
pub use wire::{WireAction, WireArgument, WireReply};

mod reply;
pub use reply::{parse_reply, ReplyError, ReplyParser};

mod service;
pub use service::{
    ManipulatorRequest, ManipulatorResponse, ManipulatorService, PoseTarget, ServiceError,
};
#[cfg(feature = "mock")]
pub use service::{MockManipulator, MockOutcome};

mod limits;
pub use limits::WorkspaceLimits;

mod handlers;
pub use handlers::{ActionHandler, HandOverHandler, MotionSettings, PickAndPlaceHandler};

mod table;
pub use table::{AbortReason, DispatchError, DispatchResult, DispatchTable};

#[cfg(feature = "http")]
mod http;
#[cfg(feature = "http")]
pub use http::HttpManipulator;
