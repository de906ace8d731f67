//! Parser and validator for untrusted replies from the reasoning service.
//!
//! The verbal channel is recovered independently of the action block, so a
//! broken action list never silences the robot. Nothing that fails validation
//! is returned as an action.

use crate::{ActionArgument, ActionDescriptor, ActionName, ArgSlot, StructuredReply};
use camera_geometry::{BoundingBox, BoxGrid, ImageExtent};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReplyError {
    #[error("malformed reply: {reason}")]
    Malformed {
        reason: String,
        verbal_response: Option<String>,
    },
    #[error("unknown action `{action}`")]
    UnknownAction {
        action: String,
        verbal_response: Option<String>,
    },
    #[error("invalid argument {slot} for {action}: {reason}")]
    InvalidArguments {
        action: ActionName,
        slot: ArgSlot,
        reason: String,
        verbal_response: Option<String>,
    },
}

impl ReplyError {
    /// Verbal response recovered despite the failure, if any.
    pub fn verbal_response(&self) -> Option<&str> {
        match self {
            ReplyError::Malformed {
                verbal_response, ..
            }
            | ReplyError::UnknownAction {
                verbal_response, ..
            }
            | ReplyError::InvalidArguments {
                verbal_response, ..
            } => verbal_response.as_deref(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ReplyError::Malformed { .. } => "malformed_reply",
            ReplyError::UnknownAction { .. } => "unknown_action",
            ReplyError::InvalidArguments { .. } => "invalid_arguments",
        }
    }
}

/// Models often wrap JSON in a Markdown fence; take what is inside.
fn strip_code_fence(raw: &str) -> &str {
    let t = raw.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };
    let body = rest.split_once('\n').map_or("", |(_, b)| b);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parses replies for one coordinate grid.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReplyParser {
    pub grid: BoxGrid,
}

impl ReplyParser {
    pub fn new(grid: BoxGrid) -> Self {
        Self { grid }
    }

    /// Validate boxes against the grid as seen by a `width`×`height` frame.
    pub fn parse(
        &self,
        raw: &str,
        width: u32,
        height: u32,
    ) -> Result<StructuredReply, ReplyError> {
        parse_reply(raw, self.grid.extent(width, height))
    }
}

/// Parse a raw reply. `extent` is the coordinate space boxes must lie in.
pub fn parse_reply(raw: &str, extent: ImageExtent) -> Result<StructuredReply, ReplyError> {
    let malformed = |reason: String, verbal: Option<String>| ReplyError::Malformed {
        reason,
        verbal_response: verbal,
    };

    let value: Value = serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| malformed(format!("not JSON: {e}"), None))?;
    let Value::Object(top) = value else {
        return Err(malformed("top level is not an object".to_string(), None));
    };

    if !top.contains_key("robot_response") && !top.contains_key("robot_actions") {
        return Err(malformed(
            "neither `robot_response` nor `robot_actions` present".to_string(),
            None,
        ));
    }

    let verbal = match top.get("robot_response") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s.trim().to_string()),
        Some(other) => {
            return Err(malformed(
                format!("`robot_response` is {}", type_name(other)),
                None,
            ))
        }
    };

    let entries = match top.get("robot_actions") {
        None | Some(Value::Null) => {
            return Ok(StructuredReply {
                verbal_response: verbal,
                actions: Vec::new(),
            })
        }
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(malformed(
                format!("`robot_actions` is {}", type_name(other)),
                verbal,
            ))
        }
    };

    let mut actions = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        match parse_action(entry, extent) {
            Ok(a) => actions.push(a),
            Err(e) => return Err(e.with_verbal(i, verbal)),
        }
    }
    debug!(count = actions.len(), "reply actions validated");
    Ok(StructuredReply {
        verbal_response: verbal,
        actions,
    })
}

/// Failure inside a single action entry, before the verbal response is attached.
enum EntryError {
    Malformed(String),
    Unknown(String),
    Argument(ActionName, ArgSlot, String),
}

impl EntryError {
    fn with_verbal(self, index: usize, verbal_response: Option<String>) -> ReplyError {
        match self {
            EntryError::Malformed(reason) => ReplyError::Malformed {
                reason: format!("robot_actions[{index}]: {reason}"),
                verbal_response,
            },
            EntryError::Unknown(action) => ReplyError::UnknownAction {
                action,
                verbal_response,
            },
            EntryError::Argument(action, slot, reason) => ReplyError::InvalidArguments {
                action,
                slot,
                reason,
                verbal_response,
            },
        }
    }
}

fn parse_action(entry: &Value, extent: ImageExtent) -> Result<ActionDescriptor, EntryError> {
    let obj = entry
        .as_object()
        .ok_or_else(|| EntryError::Malformed(format!("entry is {}", type_name(entry))))?;
    let name = obj
        .get("action")
        .and_then(Value::as_str)
        .ok_or_else(|| EntryError::Malformed("missing `action` name".to_string()))?;
    let action: ActionName = name.parse().map_err(EntryError::Unknown)?;
    let params = obj
        .get("parameters")
        .and_then(Value::as_object)
        .ok_or_else(|| EntryError::Malformed(format!("{action} has no `parameters` object")))?;

    let mut arguments = BTreeMap::new();
    for &slot in action.required_slots() {
        let arg = parse_argument(params, slot, extent)
            .map_err(|reason| EntryError::Argument(action, slot, reason))?;
        arguments.insert(slot, arg);
    }
    Ok(ActionDescriptor { action, arguments })
}

fn parse_argument(
    params: &Map<String, Value>,
    slot: ArgSlot,
    extent: ImageExtent,
) -> Result<ActionArgument, String> {
    let arg = params
        .get(slot.as_str())
        .and_then(Value::as_object)
        .ok_or_else(|| "missing".to_string())?;
    let coords = arg
        .get("bbox_coordinates")
        .and_then(Value::as_array)
        .ok_or_else(|| "missing `bbox_coordinates`".to_string())?
        .iter()
        .map(|c| c.as_i64().ok_or_else(|| format!("non-integer coordinate {c}")))
        .collect::<Result<Vec<_>, _>>()?;
    let bbox = BoundingBox::from_coords(&coords, extent).map_err(|e| e.to_string())?;
    Ok(ActionArgument {
        description: arg
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        bbox,
    })
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
