//! Reply layout exchanged with the reasoning service:
//!
//! ```json
//! {"robot_response": "...", "robot_actions": [{"action": "grasp_and_give",
//!   "parameters": {"arg1": {"description": "soda can", "bbox_coordinates": [634, 672, 815, 780]}}}]}
//! ```

use crate::{ActionDescriptor, StructuredReply};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireReply {
    pub robot_response: Option<String>,
    pub robot_actions: Option<Vec<WireAction>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireAction {
    pub action: String,
    pub parameters: BTreeMap<String, WireArgument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireArgument {
    pub description: String,
    pub bbox_coordinates: Vec<i64>,
}

impl WireAction {
    pub fn new(action: &str) -> Self {
        Self {
            action: action.to_string(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, slot: &str, description: &str, bbox: [i64; 4]) -> Self {
        self.parameters.insert(
            slot.to_string(),
            WireArgument {
                description: description.to_string(),
                bbox_coordinates: bbox.to_vec(),
            },
        );
        self
    }
}

impl From<&StructuredReply> for WireReply {
    fn from(reply: &StructuredReply) -> Self {
        let actions: Vec<WireAction> = reply.actions.iter().map(WireAction::from).collect();
        Self {
            robot_response: reply.verbal_response.clone(),
            robot_actions: (!actions.is_empty()).then_some(actions),
        }
    }
}

impl From<&ActionDescriptor> for WireAction {
    fn from(a: &ActionDescriptor) -> Self {
        let parameters = a
            .arguments
            .iter()
            .map(|(slot, arg)| {
                (
                    slot.as_str().to_string(),
                    WireArgument {
                        description: arg.description.clone().unwrap_or_default(),
                        bbox_coordinates: arg.bbox.to_array().iter().map(|&c| c as i64).collect(),
                    },
                )
            })
            .collect();
        Self {
            action: a.action.as_str().to_string(),
            parameters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_exchange_format() {
        let reply = WireReply {
            robot_response: Some("Sure thing.".to_string()),
            robot_actions: Some(vec![WireAction::new("grasp_and_place")
                .arg("arg1", "spam can", [139, 719, 317, 862])
                .arg("arg2", "container", [579, 67, 961, 300])]),
        };
        let v = serde_json::to_value(&reply).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "robot_response": "Sure thing.",
                "robot_actions": [{
                    "action": "grasp_and_place",
                    "parameters": {
                        "arg1": {"description": "spam can", "bbox_coordinates": [139, 719, 317, 862]},
                        "arg2": {"description": "container", "bbox_coordinates": [579, 67, 961, 300]}
                    }
                }]
            })
        );
    }

    #[test]
    fn null_actions_serialize_as_null() {
        let v = serde_json::to_value(WireReply {
            robot_response: Some("I see a red plate.".to_string()),
            robot_actions: None,
        })
        .unwrap();
        assert_eq!(v["robot_actions"], serde_json::Value::Null);
    }
}
