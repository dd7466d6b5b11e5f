use std::collections::HashMap;

use serde_json::{Map as JsonMap, Value as JsonValue, json};
use tracing::warn;
use uuid::Uuid;

use crate::{
    clients::database::RecordStore,
    models::context::{Context, ContextValue, RecordKind, RecordRef},
};

/// Convert a template context into its transport-safe form. Business records
/// travel as `{id, kind, display}` descriptors; primitives pass through and
/// nested maps recurse.
pub fn serialize_context(context: &Context) -> JsonMap<String, JsonValue> {
    let mut out = JsonMap::new();

    for (key, value) in context {
        out.insert(key.clone(), serialize_value(value));
    }

    out
}

fn serialize_value(value: &ContextValue) -> JsonValue {
    match value {
        ContextValue::Null => JsonValue::Null,
        ContextValue::Bool(b) => json!(b),
        ContextValue::Integer(i) => json!(i),
        ContextValue::Float(f) => json!(f),
        ContextValue::Text(s) => json!(s),
        ContextValue::Record(record) => descriptor(record),
        ContextValue::RecordList(records) => {
            JsonValue::Array(records.iter().map(descriptor).collect())
        }
        ContextValue::Map(map) => JsonValue::Object(serialize_context(map)),
    }
}

fn descriptor(record: &RecordRef) -> JsonValue {
    json!({
        "id": record.id,
        "kind": record.kind.as_str(),
        "display": record.display,
    })
}

/// Rebuild template variables on the worker side. Record descriptors are
/// re-fetched by `{kind, id}`; a deleted record, an unrecognized kind tag or
/// a store failure degrades to the captured display string instead of failing
/// the dispatch. Nested maps flatten to dotted variable names; lists render
/// as comma-joined display strings.
pub async fn deserialize_context(
    context: &JsonMap<String, JsonValue>,
    records: &dyn RecordStore,
) -> HashMap<String, JsonValue> {
    let mut variables = HashMap::new();
    let mut pending: Vec<(String, &JsonMap<String, JsonValue>)> = vec![(String::new(), context)];

    while let Some((prefix, map)) = pending.pop() {
        for (key, value) in map {
            let name = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", prefix, key)
            };

            match value {
                JsonValue::Object(obj) => match as_descriptor(obj) {
                    Some((id, kind, display)) => {
                        let resolved = resolve_display(records, id, kind, display).await;
                        variables.insert(name, JsonValue::String(resolved));
                    }
                    None => pending.push((name, obj)),
                },
                JsonValue::Array(items) => {
                    let mut parts = Vec::with_capacity(items.len());

                    for item in items {
                        match item {
                            JsonValue::Object(obj) => match as_descriptor(obj) {
                                Some((id, kind, display)) => {
                                    parts.push(resolve_display(records, id, kind, display).await);
                                }
                                None => parts.push(item.to_string()),
                            },
                            JsonValue::String(s) => parts.push(s.clone()),
                            other => parts.push(other.to_string()),
                        }
                    }

                    variables.insert(name, JsonValue::String(parts.join(", ")));
                }
                other => {
                    variables.insert(name, other.clone());
                }
            }
        }
    }

    variables
}

fn as_descriptor(obj: &JsonMap<String, JsonValue>) -> Option<(&str, &str, &str)> {
    if obj.len() != 3 {
        return None;
    }

    let id = obj.get("id")?.as_str()?;
    let kind = obj.get("kind")?.as_str()?;
    let display = obj.get("display")?.as_str()?;

    Some((id, kind, display))
}

async fn resolve_display(records: &dyn RecordStore, id: &str, kind: &str, display: &str) -> String {
    let parsed_kind = RecordKind::from_string(kind);
    let parsed_id = Uuid::parse_str(id).ok();

    match (parsed_kind, parsed_id) {
        (Some(record_kind), Some(record_id)) => {
            match records.fetch_display(record_kind, record_id).await {
                Ok(Some(live_display)) => live_display,
                Ok(None) => {
                    warn!(
                        kind,
                        record_id = %record_id,
                        "Record deleted since enqueue, using captured display"
                    );
                    display.to_string()
                }
                Err(e) => {
                    warn!(
                        kind,
                        record_id = %record_id,
                        error = %e,
                        "Record fetch failed, using captured display"
                    );
                    display.to_string()
                }
            }
        }
        _ => {
            warn!(kind, "Unrecognized record descriptor, using captured display");
            display.to_string()
        }
    }
}
