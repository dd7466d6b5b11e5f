use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use uuid::Uuid;

use crate::models::delivery::EmailType;

/// The unit of work published to the dispatch queue. Context is already
/// transport-safe here; the worker re-fetches records on its side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchMessage {
    pub task_id: Uuid,
    pub email_type: EmailType,
    pub recipient_email: String,
    pub subject: String,
    pub context: JsonMap<String, JsonValue>,

    #[serde(default)]
    pub template_name: Option<String>,

    #[serde(default)]
    pub attachment_path: Option<PathBuf>,

    #[serde(default)]
    pub delivery_log_id: Option<Uuid>,
}

/// What the mail transport actually sends: rendered bodies plus an optional
/// on-disk attachment.
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
    pub attachment_path: Option<PathBuf>,
}
