//! Concrete handlers: map resolved points onto manipulator goals.

use crate::{
    ActionName, ArgSlot, ManipulatorRequest, ManipulatorResponse, ManipulatorService, PoseTarget,
    ServiceError, WorkspaceLimits,
};
use async_trait::async_trait;
use camera_geometry::{CameraExtrinsics, SpatialPoint};
use serde::{Deserialize, Serialize};

/// Parameters shared by every goal sent to the manipulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionSettings {
    pub extrinsics: CameraExtrinsics,
    /// Gripper orientation quaternion `[x, y, z, w]` for every target.
    pub grasp_orientation: [f64; 4],
    pub tolerance: u32,
    pub goal_type: u8,
    pub limits: Option<WorkspaceLimits>,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            extrinsics: CameraExtrinsics::default(),
            grasp_orientation: [0.0, 0.0, 0.0, 1.0],
            tolerance: 5,
            goal_type: 0,
            limits: None,
        }
    }
}

impl MotionSettings {
    fn request(&self, action: ActionName, targets: &[(&str, &SpatialPoint)]) -> ManipulatorRequest {
        ManipulatorRequest {
            action,
            goal_type: self.goal_type,
            tolerance: self.tolerance,
            targets: targets
                .iter()
                .map(|(label, p)| PoseTarget {
                    label: (*label).to_string(),
                    position: self.extrinsics.to_base(p),
                    orientation: self.grasp_orientation,
                })
                .collect(),
        }
    }
}

/// Uniform interface of every registered action.
///
/// `points` holds one camera-frame point per slot, in `slots()` order, and is
/// only ever passed once all of them resolved.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    fn name(&self) -> ActionName;

    fn slots(&self) -> &'static [ArgSlot] {
        self.name().required_slots()
    }

    async fn execute(
        &self,
        points: &[SpatialPoint],
        service: &dyn ManipulatorService,
    ) -> Result<ManipulatorResponse, ServiceError>;
}

/// Grasp one object and bring it to the user (`grasp_and_give`, `grasp_handover_give`).
#[derive(Debug, Clone)]
pub struct HandOverHandler {
    action: ActionName,
    settings: MotionSettings,
}

impl HandOverHandler {
    pub fn new(action: ActionName, settings: MotionSettings) -> Self {
        Self { action, settings }
    }
}

#[async_trait]
impl ActionHandler for HandOverHandler {
    fn name(&self) -> ActionName {
        self.action
    }

    async fn execute(
        &self,
        points: &[SpatialPoint],
        service: &dyn ManipulatorService,
    ) -> Result<ManipulatorResponse, ServiceError> {
        let [object] = points else {
            return Err(ServiceError::Protocol(format!(
                "{} takes one target, got {}",
                self.action,
                points.len()
            )));
        };
        service
            .execute(self.settings.request(self.action, &[("object", object)]))
            .await
    }
}

/// Grasp an object and put it into a container (`grasp_and_place`).
#[derive(Debug, Clone)]
pub struct PickAndPlaceHandler {
    settings: MotionSettings,
}

impl PickAndPlaceHandler {
    pub fn new(settings: MotionSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl ActionHandler for PickAndPlaceHandler {
    fn name(&self) -> ActionName {
        ActionName::GraspAndPlace
    }

    async fn execute(
        &self,
        points: &[SpatialPoint],
        service: &dyn ManipulatorService,
    ) -> Result<ManipulatorResponse, ServiceError> {
        let [object, container] = points else {
            return Err(ServiceError::Protocol(format!(
                "grasp_and_place takes two targets, got {}",
                points.len()
            )));
        };
        let request = self.settings.request(
            ActionName::GraspAndPlace,
            &[("object", object), ("container", container)],
        );
        service.execute(request).await
    }
}
