use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::{
    context::RecordKind,
    delivery::{CreateDeliveryLog, DeliveryLog, EmailType},
    preference::NotificationPreference,
    status::DeliveryStatus,
};

/// Create/get/update access to delivery logs. The facade creates rows; the
/// dispatch task owning a row is its only writer afterwards.
#[async_trait]
pub trait DeliveryStore: Send + Sync {
    async fn create_delivery(&self, create: CreateDeliveryLog) -> Result<DeliveryLog, Error>;

    async fn set_task_id(&self, id: Uuid, task_id: Uuid) -> Result<(), Error>;

    async fn mark_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<(), Error>;

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), Error>;

    async fn get_delivery(&self, id: Uuid) -> Result<Option<DeliveryLog>, Error>;
}

/// Per-recipient settings with get-or-create semantics: the first lookup for
/// a recipient materializes a default-allow row.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get_or_create(&self, recipient_id: Uuid) -> Result<NotificationPreference, Error>;
}

/// Display lookup for business records referenced from queued contexts. The
/// backing tables belong to the LIMS; this service only reads them.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn fetch_display(&self, kind: RecordKind, id: Uuid) -> Result<Option<String>, Error>;
}

pub struct DatabaseClient {
    client: Client,
}

impl DatabaseClient {
    pub async fn connect(database_url: &str) -> Result<Self, Error> {
        info!("Connecting to PostgreSQL database");

        let (client, connection) = tokio_postgres::connect(database_url, NoTls)
            .await
            .map_err(|e| anyhow!("Failed to connect to database: {}", e))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "PostgreSQL connection closed");
            }
        });

        info!("PostgreSQL connection established");

        Ok(Self { client })
    }

    pub async fn health_check(&self) -> Result<(), Error> {
        self.client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| anyhow!("Database health check failed: {}", e))?;

        Ok(())
    }

    fn delivery_from_row(row: &Row) -> DeliveryLog {
        let email_type: String = row.get("email_type");
        let status: String = row.get("status");

        DeliveryLog {
            id: row.get("id"),
            email_type: EmailType::from_string(&email_type),
            recipient_email: row.get("recipient_email"),
            recipient_id: row.get("recipient_id"),
            subject: row.get("subject"),
            status: DeliveryStatus::from_string(&status),
            has_attachment: row.get("has_attachment"),
            error_message: row.get("error_message"),
            task_id: row.get("task_id"),
            created_at: row.get("created_at"),
            sent_at: row.get("sent_at"),
        }
    }

    fn preference_from_row(row: &Row) -> NotificationPreference {
        NotificationPreference {
            recipient_id: row.get("recipient_id"),
            notify_on_reception: row.get("notify_on_reception"),
            notify_on_report_ready: row.get("notify_on_report_ready"),
            alternative_email: row.get("alternative_email"),
            include_attachments: row.get("include_attachments"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl DeliveryStore for DatabaseClient {
    async fn create_delivery(&self, create: CreateDeliveryLog) -> Result<DeliveryLog, Error> {
        let log = DeliveryLog {
            id: Uuid::new_v4(),
            email_type: create.email_type,
            recipient_email: create.recipient_email,
            recipient_id: create.recipient_id,
            subject: create.subject,
            status: DeliveryStatus::Queued,
            has_attachment: create.has_attachment,
            error_message: None,
            task_id: None,
            created_at: Utc::now(),
            sent_at: None,
        };

        self.client
            .execute(
                r#"
                INSERT INTO delivery_logs (
                    id,
                    email_type,
                    recipient_email,
                    recipient_id,
                    subject,
                    status,
                    has_attachment,
                    created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
                &[
                    &log.id,
                    &log.email_type.as_str(),
                    &log.recipient_email,
                    &log.recipient_id,
                    &log.subject,
                    &log.status.as_str(),
                    &log.has_attachment,
                    &log.created_at,
                ],
            )
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to write delivery log to database");
                anyhow!("Database write failed: {}", e)
            })?;

        debug!(
            delivery_log_id = %log.id,
            email_type = %log.email_type,
            "Delivery log created"
        );

        Ok(log)
    }

    async fn set_task_id(&self, id: Uuid, task_id: Uuid) -> Result<(), Error> {
        self.client
            .execute(
                "UPDATE delivery_logs SET task_id = $2 WHERE id = $1",
                &[&id, &task_id],
            )
            .await
            .map_err(|e| anyhow!("Failed to store task id: {}", e))?;

        Ok(())
    }

    async fn mark_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<(), Error> {
        let updated = self
            .client
            .execute(
                r#"
                UPDATE delivery_logs
                SET status = 'sent', sent_at = $2, error_message = NULL
                WHERE id = $1
                "#,
                &[&id, &sent_at],
            )
            .await
            .map_err(|e| anyhow!("Failed to mark delivery log as sent: {}", e))?;

        if updated == 0 {
            warn!(delivery_log_id = %id, "Delivery log not found");
        }

        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), Error> {
        let updated = self
            .client
            .execute(
                r#"
                UPDATE delivery_logs
                SET status = 'failed', error_message = $2
                WHERE id = $1
                "#,
                &[&id, &error],
            )
            .await
            .map_err(|e| anyhow!("Failed to mark delivery log as failed: {}", e))?;

        if updated == 0 {
            warn!(delivery_log_id = %id, "Delivery log not found");
        }

        Ok(())
    }

    async fn get_delivery(&self, id: Uuid) -> Result<Option<DeliveryLog>, Error> {
        let row = self
            .client
            .query_opt("SELECT * FROM delivery_logs WHERE id = $1", &[&id])
            .await
            .map_err(|e| anyhow!("Failed to fetch delivery log: {}", e))?;

        Ok(row.as_ref().map(Self::delivery_from_row))
    }
}

#[async_trait]
impl PreferenceStore for DatabaseClient {
    async fn get_or_create(&self, recipient_id: Uuid) -> Result<NotificationPreference, Error> {
        let defaults = NotificationPreference::defaults(recipient_id);

        let inserted = self
            .client
            .execute(
                r#"
                INSERT INTO notification_preferences (
                    recipient_id,
                    notify_on_reception,
                    notify_on_report_ready,
                    alternative_email,
                    include_attachments,
                    created_at,
                    updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (recipient_id) DO NOTHING
                "#,
                &[
                    &defaults.recipient_id,
                    &defaults.notify_on_reception,
                    &defaults.notify_on_report_ready,
                    &defaults.alternative_email,
                    &defaults.include_attachments,
                    &defaults.created_at,
                    &defaults.updated_at,
                ],
            )
            .await
            .map_err(|e| anyhow!("Failed to create notification preferences: {}", e))?;

        if inserted > 0 {
            debug!(recipient_id = %recipient_id, "Notification preferences created with defaults");
        }

        let row = self
            .client
            .query_one(
                "SELECT * FROM notification_preferences WHERE recipient_id = $1",
                &[&recipient_id],
            )
            .await
            .map_err(|e| anyhow!("Failed to fetch notification preferences: {}", e))?;

        Ok(Self::preference_from_row(&row))
    }
}

#[async_trait]
impl RecordStore for DatabaseClient {
    async fn fetch_display(&self, kind: RecordKind, id: Uuid) -> Result<Option<String>, Error> {
        let query = match kind {
            RecordKind::Protocol => "SELECT protocol_number FROM protocols WHERE id = $1",
            RecordKind::WorkOrder => "SELECT order_number FROM work_orders WHERE id = $1",
            RecordKind::Veterinarian => "SELECT full_name FROM veterinarians WHERE id = $1",
        };

        let row = self
            .client
            .query_opt(query, &[&id])
            .await
            .map_err(|e| anyhow!("Failed to fetch {} record: {}", kind.as_str(), e))?;

        Ok(row.map(|r| r.get(0)))
    }
}
