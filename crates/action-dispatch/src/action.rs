//! Robot action primitives and their bounding-box arguments

use camera_geometry::BoundingBox;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Primitives the manipulator exposes to the reasoning service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionName {
    GraspAndPlace,
    GraspAndGive,
    GraspHandoverGive,
}

impl ActionName {
    pub const ALL: [ActionName; 3] = [
        ActionName::GraspAndPlace,
        ActionName::GraspAndGive,
        ActionName::GraspHandoverGive,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionName::GraspAndPlace => "grasp_and_place",
            ActionName::GraspAndGive => "grasp_and_give",
            ActionName::GraspHandoverGive => "grasp_handover_give",
        }
    }

    /// Fixed arity: argument slots that must be present and resolvable.
    pub fn required_slots(self) -> &'static [ArgSlot] {
        match self {
            ActionName::GraspAndPlace => &[ArgSlot::Arg1, ArgSlot::Arg2],
            ActionName::GraspAndGive | ActionName::GraspHandoverGive => &[ArgSlot::Arg1],
        }
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionName::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgSlot {
    Arg1,
    Arg2,
}

impl ArgSlot {
    pub fn as_str(self) -> &'static str {
        match self {
            ArgSlot::Arg1 => "arg1",
            ArgSlot::Arg2 => "arg2",
        }
    }
}

impl fmt::Display for ArgSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionArgument {
    pub description: Option<String>,
    pub bbox: BoundingBox,
}

/// A validated action: name plus one argument per required slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionDescriptor {
    pub action: ActionName,
    pub arguments: BTreeMap<ArgSlot, ActionArgument>,
}

impl ActionDescriptor {
    pub fn argument(&self, slot: ArgSlot) -> Option<&ActionArgument> {
        self.arguments.get(&slot)
    }
}

/// What the reasoning service asked for in one turn.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct StructuredReply {
    pub verbal_response: Option<String>,
    pub actions: Vec<ActionDescriptor>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_strings() {
        for a in ActionName::ALL {
            assert_eq!(a.as_str().parse::<ActionName>().unwrap(), a);
            assert_eq!(
                serde_json::to_string(&a).unwrap(),
                format!("\"{}\"", a.as_str())
            );
        }
        assert_eq!("grasp_and_throw".parse::<ActionName>(), Err("grasp_and_throw".to_string()));
    }

    #[test]
    fn arity_table() {
        assert_eq!(ActionName::GraspAndGive.required_slots(), &[ArgSlot::Arg1]);
        assert_eq!(ActionName::GraspHandoverGive.required_slots(), &[ArgSlot::Arg1]);
        assert_eq!(
            ActionName::GraspAndPlace.required_slots(),
            &[ArgSlot::Arg1, ArgSlot::Arg2]
        );
    }
}
