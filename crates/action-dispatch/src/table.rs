//! Dispatch table: resolve every argument, then hand off to one handler.

use crate::{
    ActionDescriptor, ActionHandler, ActionName, ArgSlot, HandOverHandler, ManipulatorService,
    MotionSettings, PickAndPlaceHandler, StructuredReply,
};
use camera_geometry::{
    deproject_with, BoxGrid, CameraIntrinsics, DepthFrame, DepthSampling, Frame, GeometryError,
    SpatialPoint,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why an argument slot could not be turned into a target.
#[derive(Debug, Clone, PartialEq)]
pub enum AbortReason {
    MissingArgument,
    Geometry(GeometryError),
    OutOfWorkspace(String),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::MissingArgument => f.write_str("argument missing"),
            AbortReason::Geometry(e) => write!(f, "{e}"),
            AbortReason::OutOfWorkspace(why) => write!(f, "target out of workspace: {why}"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DispatchError {
    #[error("{action} aborted, {slot}: {reason}")]
    ActionAborted {
        action: ActionName,
        slot: ArgSlot,
        reason: AbortReason,
    },
    #[error("{action} failed at the manipulator: {reason}")]
    ServiceFailure { action: ActionName, reason: String },
    #[error("no handler registered for {0}")]
    NoHandler(ActionName),
}

impl DispatchError {
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::ActionAborted { .. } => "action_aborted",
            DispatchError::ServiceFailure { .. } => "service_failure",
            DispatchError::NoHandler(_) => "no_handler",
        }
    }

    pub fn action(&self) -> ActionName {
        match self {
            DispatchError::ActionAborted { action, .. }
            | DispatchError::ServiceFailure { action, .. } => *action,
            DispatchError::NoHandler(action) => *action,
        }
    }
}

/// A goal the manipulator accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchResult {
    pub action: ActionName,
    /// Camera-frame targets, one per slot.
    pub points: Vec<SpatialPoint>,
}

pub struct DispatchTable {
    handlers: HashMap<ActionName, Arc<dyn ActionHandler>>,
    service: Arc<dyn ManipulatorService>,
    settings: MotionSettings,
    grid: BoxGrid,
    sampling: DepthSampling,
}

impl DispatchTable {
    /// Empty table; see [`DispatchTable::with_default_handlers`].
    pub fn new(service: Arc<dyn ManipulatorService>, settings: MotionSettings) -> Self {
        Self {
            handlers: HashMap::new(),
            service,
            settings,
            grid: BoxGrid::default(),
            sampling: DepthSampling::default(),
        }
    }

    /// Table with a handler for every known action.
    pub fn with_default_handlers(
        service: Arc<dyn ManipulatorService>,
        settings: MotionSettings,
    ) -> Self {
        let mut table = Self::new(service, settings.clone());
        table.register(Arc::new(PickAndPlaceHandler::new(settings.clone())));
        table.register(Arc::new(HandOverHandler::new(
            ActionName::GraspAndGive,
            settings.clone(),
        )));
        table.register(Arc::new(HandOverHandler::new(
            ActionName::GraspHandoverGive,
            settings,
        )));
        table
    }

    pub fn with_grid(mut self, grid: BoxGrid) -> Self {
        self.grid = grid;
        self
    }

    pub fn with_sampling(mut self, sampling: DepthSampling) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn register(&mut self, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(handler.name(), handler);
    }

    pub fn grid(&self) -> BoxGrid {
        self.grid
    }

    pub fn actions(&self) -> Vec<ActionName> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort();
        names
    }

    /// Resolve every slot against the frame pair, then invoke the handler once.
    ///
    /// A failure in any slot aborts the action before the handler sees it.
    pub async fn dispatch(
        &self,
        action: &ActionDescriptor,
        rgb: &Frame,
        depth: &DepthFrame,
        intrinsics: &CameraIntrinsics,
    ) -> Result<DispatchResult, DispatchError> {
        let name = action.action;
        let handler = self
            .handlers
            .get(&name)
            .ok_or(DispatchError::NoHandler(name))?;

        let mut points = Vec::with_capacity(handler.slots().len());
        for &slot in handler.slots() {
            let point = self
                .resolve(action, slot, rgb, depth, intrinsics)
                .map_err(|reason| DispatchError::ActionAborted {
                    action: name,
                    slot,
                    reason,
                })?;
            points.push(point);
        }

        info!(action = %name, targets = points.len(), "dispatching action");
        match handler.execute(&points, self.service.as_ref()).await {
            Ok(resp) if resp.succeeded => Ok(DispatchResult {
                action: name,
                points,
            }),
            Ok(_) => Err(DispatchError::ServiceFailure {
                action: name,
                reason: "manipulator reported failure".to_string(),
            }),
            Err(e) => Err(DispatchError::ServiceFailure {
                action: name,
                reason: e.to_string(),
            }),
        }
    }

    /// First-wins: only `reply.actions[0]` runs; the rest are logged and dropped.
    pub async fn dispatch_first(
        &self,
        reply: &StructuredReply,
        rgb: &Frame,
        depth: &DepthFrame,
        intrinsics: &CameraIntrinsics,
    ) -> Option<Result<DispatchResult, DispatchError>> {
        let (first, rest) = reply.actions.split_first()?;
        for ignored in rest {
            warn!(action = %ignored.action, "ignoring action beyond the first");
        }
        Some(self.dispatch(first, rgb, depth, intrinsics).await)
    }

    fn resolve(
        &self,
        action: &ActionDescriptor,
        slot: ArgSlot,
        rgb: &Frame,
        depth: &DepthFrame,
        intrinsics: &CameraIntrinsics,
    ) -> Result<SpatialPoint, AbortReason> {
        let arg = action
            .argument(slot)
            .ok_or(AbortReason::MissingArgument)?;
        let bbox = self
            .grid
            .to_pixels(&arg.bbox, depth.width, depth.height)
            .map_err(AbortReason::Geometry)?;
        let point = deproject_with(&bbox, rgb, depth, intrinsics, self.sampling)
            .map_err(AbortReason::Geometry)?;
        if let Some(limits) = &self.settings.limits {
            let base = self.settings.extrinsics.to_base(&point);
            if let Some(why) = limits.violation(&base) {
                return Err(AbortReason::OutOfWorkspace(why));
            }
        }
        debug!(%slot, x = point.x(), y = point.y(), z = point.z(), "slot resolved");
        Ok(point)
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::{parse_reply, ManipulatorResponse, MockManipulator, MockOutcome, ServiceError,
        WorkspaceLimits};
    use async_trait::async_trait;
    use camera_geometry::{CameraSource, ImageExtent, MockCamera, RgbdFrame};
    use parking_lot::Mutex;

    const W: u32 = 1280;
    const H: u32 = 960;

    fn intrinsics() -> CameraIntrinsics {
        CameraIntrinsics {
            width: W,
            height: H,
            fx: 900.0,
            fy: 900.0,
            cx: 640.0,
            cy: 480.0,
        }
    }

    fn frame() -> RgbdFrame {
        MockCamera::new(W, H, 0.8).read().unwrap()
    }

    fn reply(raw: &str) -> StructuredReply {
        parse_reply(raw, ImageExtent { width: W, height: H }).unwrap()
    }

    const SODA: &str = r#"{"robot_response": "Sure, here is your soda can.", "robot_actions": [
        {"action": "grasp_and_give", "parameters": {"arg1": {"description": "soda can", "bbox_coordinates": [634, 672, 815, 780]}}}]}"#;

    const SPAM: &str = r#"{"robot_response": "Putting it away.", "robot_actions": [
        {"action": "grasp_and_place", "parameters": {
            "arg1": {"description": "spam can", "bbox_coordinates": [139, 719, 317, 862]},
            "arg2": {"description": "box", "bbox_coordinates": [579, 67, 961, 300]}}}]}"#;

    /// Counts invocations without touching the service.
    struct CountingHandler {
        name: ActionName,
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl ActionHandler for CountingHandler {
        fn name(&self) -> ActionName {
            self.name
        }

        async fn execute(
            &self,
            _points: &[SpatialPoint],
            _service: &dyn ManipulatorService,
        ) -> Result<ManipulatorResponse, ServiceError> {
            *self.calls.lock() += 1;
            Ok(ManipulatorResponse { succeeded: true })
        }
    }

    #[tokio::test]
    async fn give_resolves_center_of_box() {
        let svc = Arc::new(MockManipulator::new());
        let table = DispatchTable::with_default_handlers(svc.clone(), MotionSettings::default());
        let f = frame();
        let out = table
            .dispatch_first(&reply(SODA), &f.color, &f.depth, &intrinsics())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out.action, ActionName::GraspAndGive);
        // center (724, 726) at 0.8 m
        let p = out.points[0];
        assert!((p.x() - (724.0 - 640.0) * 0.8 / 900.0).abs() < 1e-6);
        assert!((p.y() - (726.0 - 480.0) * 0.8 / 900.0).abs() < 1e-6);
        assert!((p.z() - 0.8).abs() < 1e-6);
        assert_eq!(svc.call_count(), 1);
    }

    #[tokio::test]
    async fn invalid_second_slot_means_no_handler_call() {
        let svc = Arc::new(MockManipulator::new());
        let counter = Arc::new(CountingHandler {
            name: ActionName::GraspAndPlace,
            calls: Mutex::new(0),
        });
        let mut table = DispatchTable::new(svc.clone(), MotionSettings::default());
        table.register(counter.clone());

        let mut f = frame();
        // punch a hole over the container box so arg2 cannot be resolved
        for v in 67..300 {
            for u in 579..961 {
                f.depth.data[(v * W + u) as usize] = 0.0;
            }
        }
        let err = table
            .dispatch_first(&reply(SPAM), &f.color, &f.depth, &intrinsics())
            .await
            .unwrap()
            .unwrap_err();
        assert_eq!(
            err,
            DispatchError::ActionAborted {
                action: ActionName::GraspAndPlace,
                slot: ArgSlot::Arg2,
                reason: AbortReason::Geometry(GeometryError::InvalidDepth { u: 770, v: 183 }),
            }
        );
        assert_eq!(*counter.calls.lock(), 0);
        assert_eq!(svc.call_count(), 0);
    }

    #[tokio::test]
    async fn only_first_action_runs() {
        let raw = r#"{"robot_response": null, "robot_actions": [
            {"action": "grasp_and_give", "parameters": {"arg1": {"description": "a", "bbox_coordinates": [10, 10, 50, 50]}}},
            {"action": "grasp_handover_give", "parameters": {"arg1": {"description": "b", "bbox_coordinates": [100, 100, 150, 150]}}}]}"#;
        let svc = Arc::new(MockManipulator::new());
        let table = DispatchTable::with_default_handlers(svc.clone(), MotionSettings::default());
        let f = frame();
        table
            .dispatch_first(&reply(raw), &f.color, &f.depth, &intrinsics())
            .await
            .unwrap()
            .unwrap();
        let calls = svc.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].action, ActionName::GraspAndGive);
    }

    #[tokio::test]
    async fn no_actions_dispatches_nothing() {
        let svc = Arc::new(MockManipulator::new());
        let table = DispatchTable::with_default_handlers(svc.clone(), MotionSettings::default());
        let f = frame();
        let r = reply(r#"{"robot_response": "Hello!"}"#);
        assert!(table
            .dispatch_first(&r, &f.color, &f.depth, &intrinsics())
            .await
            .is_none());
        assert_eq!(svc.call_count(), 0);
    }

    #[tokio::test]
    async fn rejected_goal_is_service_failure() {
        let svc = Arc::new(MockManipulator::with_outcome(MockOutcome::Reject));
        let table = DispatchTable::with_default_handlers(svc.clone(), MotionSettings::default());
        let f = frame();
        let err = table
            .dispatch_first(&reply(SODA), &f.color, &f.depth, &intrinsics())
            .await
            .unwrap()
            .unwrap_err();
        assert_eq!(err.kind(), "service_failure");
        assert_eq!(err.action(), ActionName::GraspAndGive);

        svc.set_outcome(MockOutcome::Unavailable);
        let err = table
            .dispatch_first(&reply(SODA), &f.color, &f.depth, &intrinsics())
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, DispatchError::ServiceFailure { .. }));
        // no retry
        assert_eq!(svc.call_count(), 2);
    }

    #[tokio::test]
    async fn target_outside_limits_is_aborted() {
        let settings = MotionSettings {
            limits: Some(WorkspaceLimits::new([-1.0, -1.0, 0.1], [1.0, 1.0, 0.5])),
            ..MotionSettings::default()
        };
        let svc = Arc::new(MockManipulator::new());
        let table = DispatchTable::with_default_handlers(svc.clone(), settings);
        let f = frame();
        let err = table
            .dispatch_first(&reply(SODA), &f.color, &f.depth, &intrinsics())
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::ActionAborted {
                reason: AbortReason::OutOfWorkspace(_),
                ..
            }
        ));
        assert_eq!(svc.call_count(), 0);
    }

    #[tokio::test]
    async fn normalized_grid_scales_into_frame() {
        let svc = Arc::new(MockManipulator::new());
        let table = DispatchTable::with_default_handlers(svc.clone(), MotionSettings::default())
            .with_grid(BoxGrid::Normalized { range: 1000 })
            .with_sampling(DepthSampling::Center);
        let f = frame();
        let raw = r#"{"robot_response": null, "robot_actions": [{"action": "grasp_and_give",
            "parameters": {"arg1": {"description": "cup", "bbox_coordinates": [500, 500, 600, 600]}}}]}"#;
        let r = parse_reply(raw, table.grid().extent(W, H)).unwrap();
        let out = table
            .dispatch_first(&r, &f.color, &f.depth, &intrinsics())
            .await
            .unwrap()
            .unwrap();
        // [640, 480, 768, 576] -> center (704, 528)
        let (u, v) = intrinsics().project(&out.points[0]);
        assert!((u - 704.0).abs() < 1e-6 && (v - 528.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn unregistered_action_has_no_handler() {
        let table = DispatchTable::new(Arc::new(MockManipulator::new()), MotionSettings::default());
        assert!(table.actions().is_empty());
        let f = frame();
        let err = table
            .dispatch_first(&reply(SODA), &f.color, &f.depth, &intrinsics())
            .await
            .unwrap()
            .unwrap_err();
        assert_eq!(err, DispatchError::NoHandler(ActionName::GraspAndGive));
    }
}
