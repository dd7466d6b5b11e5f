use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::status::DeliveryStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailType {
    Verification,
    PasswordReset,
    SampleReception,
    SampleRejection,
    ReportReady,
    WorkOrder,
    Custom,
}

impl EmailType {
    pub fn from_string(s: &str) -> Self {
        match s {
            "verification" => EmailType::Verification,
            "password_reset" => EmailType::PasswordReset,
            "sample_reception" => EmailType::SampleReception,
            "sample_rejection" => EmailType::SampleRejection,
            "report_ready" => EmailType::ReportReady,
            "work_order" => EmailType::WorkOrder,
            _ => EmailType::Custom,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EmailType::Verification => "verification",
            EmailType::PasswordReset => "password_reset",
            EmailType::SampleReception => "sample_reception",
            EmailType::SampleRejection => "sample_rejection",
            EmailType::ReportReady => "report_ready",
            EmailType::WorkOrder => "work_order",
            EmailType::Custom => "custom",
        }
    }
}

impl Display for EmailType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Audit row tracking one notification from enqueue to its terminal outcome.
/// Written once by the facade, updated only by the dispatch task that owns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryLog {
    pub id: Uuid,
    pub email_type: EmailType,
    pub recipient_email: String,
    pub recipient_id: Option<Uuid>,
    pub subject: String,
    pub status: DeliveryStatus,
    pub has_attachment: bool,
    pub error_message: Option<String>,
    pub task_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateDeliveryLog {
    pub email_type: EmailType,
    pub recipient_email: String,
    pub recipient_id: Option<Uuid>,
    pub subject: String,
    pub has_attachment: bool,
}

impl CreateDeliveryLog {
    pub fn new(email_type: EmailType, recipient_email: String, subject: String) -> Self {
        Self {
            email_type,
            recipient_email,
            recipient_id: None,
            subject,
            has_attachment: false,
        }
    }

    pub fn with_recipient(mut self, recipient_id: Uuid) -> Self {
        self.recipient_id = Some(recipient_id);
        self
    }

    pub fn with_attachment(mut self, has_attachment: bool) -> Self {
        self.has_attachment = has_attachment;
        self
    }
}
