use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Business-record kinds that may cross the queue boundary. The worker only
/// knows how to re-fetch these; anything else degrades to the captured
/// display string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Protocol,
    WorkOrder,
    Veterinarian,
}

impl RecordKind {
    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "protocol" => Some(RecordKind::Protocol),
            "work_order" => Some(RecordKind::WorkOrder),
            "veterinarian" => Some(RecordKind::Veterinarian),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RecordKind::Protocol => "protocol",
            RecordKind::WorkOrder => "work_order",
            RecordKind::Veterinarian => "veterinarian",
        }
    }
}

/// Identity + display fallback standing in for a live business record while a
/// message sits in the queue. The record may be deleted before the worker
/// runs; `display` is what renders then.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordRef {
    pub id: Uuid,
    pub kind: RecordKind,
    pub display: String,
}

impl RecordRef {
    pub fn new(id: Uuid, kind: RecordKind, display: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            display: display.into(),
        }
    }
}

/// Template context value. Callers construct variants explicitly; there is no
/// runtime probing for "looks like a record".
#[derive(Debug, Clone, PartialEq)]
pub enum ContextValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Record(RecordRef),
    RecordList(Vec<RecordRef>),
    Map(BTreeMap<String, ContextValue>),
}

pub type Context = BTreeMap<String, ContextValue>;

impl From<bool> for ContextValue {
    fn from(value: bool) -> Self {
        ContextValue::Bool(value)
    }
}

impl From<i64> for ContextValue {
    fn from(value: i64) -> Self {
        ContextValue::Integer(value)
    }
}

impl From<u32> for ContextValue {
    fn from(value: u32) -> Self {
        ContextValue::Integer(value as i64)
    }
}

impl From<f64> for ContextValue {
    fn from(value: f64) -> Self {
        ContextValue::Float(value)
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        ContextValue::Text(value.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        ContextValue::Text(value)
    }
}

impl From<RecordRef> for ContextValue {
    fn from(value: RecordRef) -> Self {
        ContextValue::Record(value)
    }
}

impl From<Vec<RecordRef>> for ContextValue {
    fn from(value: Vec<RecordRef>) -> Self {
        ContextValue::RecordList(value)
    }
}
