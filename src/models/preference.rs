use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::delivery::EmailType;

/// Per-veterinarian notification settings. Materialized lazily with
/// default-allow semantics on first lookup; exactly one row per recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPreference {
    pub recipient_id: Uuid,
    pub notify_on_reception: bool,
    pub notify_on_report_ready: bool,
    pub alternative_email: Option<String>,
    pub include_attachments: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationPreference {
    pub fn defaults(recipient_id: Uuid) -> Self {
        let now = Utc::now();

        Self {
            recipient_id,
            notify_on_reception: true,
            notify_on_report_ready: true,
            alternative_email: None,
            include_attachments: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Categories without an explicit flag (work orders, account emails) are
    /// always sent.
    pub fn should_send(&self, email_type: EmailType) -> bool {
        match email_type {
            EmailType::SampleReception | EmailType::SampleRejection => self.notify_on_reception,
            EmailType::ReportReady => self.notify_on_report_ready,
            _ => true,
        }
    }

    /// The address notifications actually go to: the override if one is set,
    /// otherwise the recipient's own address.
    pub fn effective_email(&self, default_email: &str) -> String {
        match &self.alternative_email {
            Some(email) if !email.is_empty() => email.clone(),
            _ => default_email.to_string(),
        }
    }
}
