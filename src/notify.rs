use std::{collections::BTreeMap, path::Path, sync::Arc};

use anyhow::{Error, Result};
use tracing::info;
use uuid::Uuid;

use crate::{
    clients::{
        database::{DeliveryStore, PreferenceStore},
        queue::DispatchQueue,
    },
    context::serialize_context,
    models::{
        context::{Context, ContextValue, RecordRef},
        delivery::{CreateDeliveryLog, DeliveryLog, EmailType},
        message::DispatchMessage,
        recipient::Recipient,
        validation::validate_email_address,
    },
};

/// Result of a preference-gated notification request. `Skipped` means the
/// resolver suppressed the send: nothing was written, nothing was enqueued.
#[derive(Debug, Clone)]
pub enum QueueOutcome {
    Queued(DeliveryLog),
    Skipped,
}

impl QueueOutcome {
    pub fn delivery_log(&self) -> Option<&DeliveryLog> {
        match self {
            QueueOutcome::Queued(log) => Some(log),
            QueueOutcome::Skipped => None,
        }
    }
}

/// One veterinarian's slice of a work order: the recipient plus the protocols
/// belonging to them.
#[derive(Debug, Clone)]
pub struct WorkOrderRecipient {
    pub veterinarian: Recipient,
    pub protocols: Vec<RecordRef>,
}

/// Synchronous entry point business logic calls to request a notification.
/// Creates the delivery log, serializes context and hands the work to the
/// queue; the caller never waits on rendering or transmission.
pub struct Notifier {
    deliveries: Arc<dyn DeliveryStore>,
    preferences: Arc<dyn PreferenceStore>,
    queue: Arc<dyn DispatchQueue>,
}

impl Notifier {
    pub fn new(
        deliveries: Arc<dyn DeliveryStore>,
        preferences: Arc<dyn PreferenceStore>,
        queue: Arc<dyn DispatchQueue>,
    ) -> Self {
        Self {
            deliveries,
            preferences,
            queue,
        }
    }

    pub async fn queue_email(
        &self,
        email_type: EmailType,
        recipient_email: &str,
        subject: &str,
        context: &Context,
        template_name: Option<&str>,
        attachment_path: Option<&Path>,
        recipient_id: Option<Uuid>,
    ) -> Result<DeliveryLog, Error> {
        validate_email_address(recipient_email)?;

        let mut create =
            CreateDeliveryLog::new(email_type, recipient_email.to_string(), subject.to_string())
                .with_attachment(attachment_path.is_some());
        if let Some(id) = recipient_id {
            create = create.with_recipient(id);
        }

        let log = self.deliveries.create_delivery(create).await?;

        let message = DispatchMessage {
            task_id: Uuid::new_v4(),
            email_type,
            recipient_email: recipient_email.to_string(),
            subject: subject.to_string(),
            context: serialize_context(context),
            template_name: template_name.map(str::to_string),
            attachment_path: attachment_path.map(Path::to_path_buf),
            delivery_log_id: Some(log.id),
        };

        self.queue.publish(&message).await?;
        self.deliveries.set_task_id(log.id, message.task_id).await?;

        info!(
            email_type = %email_type,
            recipient = %recipient_email,
            task_id = %message.task_id,
            "Email queued"
        );

        Ok(DeliveryLog {
            task_id: Some(message.task_id),
            ..log
        })
    }

    pub async fn send_verification_email(
        &self,
        recipient: &Recipient,
        verification_url: &str,
    ) -> Result<DeliveryLog, Error> {
        let mut context: Context = BTreeMap::new();
        context.insert("user".to_string(), recipient.as_record_ref().into());
        context.insert(
            "verification_url".to_string(),
            ContextValue::from(verification_url),
        );

        self.queue_email(
            EmailType::Verification,
            &recipient.email,
            "Verifique su correo electrónico - AdLab Veterinario",
            &context,
            None,
            None,
            Some(recipient.id),
        )
        .await
    }

    pub async fn send_password_reset_email(
        &self,
        recipient: &Recipient,
        reset_url: &str,
        expiry_hours: u32,
    ) -> Result<DeliveryLog, Error> {
        let mut context: Context = BTreeMap::new();
        context.insert("user".to_string(), recipient.as_record_ref().into());
        context.insert("reset_url".to_string(), ContextValue::from(reset_url));
        context.insert("expiry_hours".to_string(), ContextValue::from(expiry_hours));

        self.queue_email(
            EmailType::PasswordReset,
            &recipient.email,
            "Restablezca su contraseña - AdLab Veterinario",
            &context,
            None,
            None,
            Some(recipient.id),
        )
        .await
    }

    pub async fn send_sample_reception_notification(
        &self,
        protocol: &RecordRef,
        veterinarian: &Recipient,
    ) -> Result<QueueOutcome, Error> {
        let prefs = self.preferences.get_or_create(veterinarian.id).await?;

        if !prefs.should_send(EmailType::SampleReception) {
            info!(
                veterinarian = %veterinarian.full_name,
                "Sample reception notification skipped (preferences)"
            );
            return Ok(QueueOutcome::Skipped);
        }

        let recipient_email = prefs.effective_email(&veterinarian.email);
        let subject = format!("Muestra recibida - Protocolo {}", protocol.display);

        let mut context: Context = BTreeMap::new();
        context.insert("protocol".to_string(), protocol.clone().into());
        context.insert(
            "veterinarian".to_string(),
            veterinarian.as_record_ref().into(),
        );

        let log = self
            .queue_email(
                EmailType::SampleReception,
                &recipient_email,
                &subject,
                &context,
                None,
                None,
                Some(veterinarian.id),
            )
            .await?;

        Ok(QueueOutcome::Queued(log))
    }

    pub async fn send_sample_rejection_notification(
        &self,
        protocol: &RecordRef,
        veterinarian: &Recipient,
    ) -> Result<QueueOutcome, Error> {
        let prefs = self.preferences.get_or_create(veterinarian.id).await?;

        // Rejection is gated by the same reception preference flag.
        if !prefs.should_send(EmailType::SampleRejection) {
            info!(
                veterinarian = %veterinarian.full_name,
                "Sample rejection notification skipped (preferences)"
            );
            return Ok(QueueOutcome::Skipped);
        }

        let recipient_email = prefs.effective_email(&veterinarian.email);
        let subject = format!("Muestra rechazada - Protocolo {}", protocol.display);

        let mut context: Context = BTreeMap::new();
        context.insert("protocol".to_string(), protocol.clone().into());
        context.insert(
            "veterinarian".to_string(),
            veterinarian.as_record_ref().into(),
        );

        let log = self
            .queue_email(
                EmailType::SampleRejection,
                &recipient_email,
                &subject,
                &context,
                None,
                None,
                Some(veterinarian.id),
            )
            .await?;

        Ok(QueueOutcome::Queued(log))
    }

    pub async fn send_report_ready_notification(
        &self,
        protocol: &RecordRef,
        veterinarian: &Recipient,
        report_pdf_path: Option<&Path>,
    ) -> Result<QueueOutcome, Error> {
        let prefs = self.preferences.get_or_create(veterinarian.id).await?;

        if !prefs.should_send(EmailType::ReportReady) {
            info!(
                veterinarian = %veterinarian.full_name,
                "Report ready notification skipped (preferences)"
            );
            return Ok(QueueOutcome::Skipped);
        }

        let recipient_email = prefs.effective_email(&veterinarian.email);
        let attachment = if prefs.include_attachments {
            report_pdf_path
        } else {
            None
        };
        let subject = format!("Informe disponible - Protocolo {}", protocol.display);

        let mut context: Context = BTreeMap::new();
        context.insert("protocol".to_string(), protocol.clone().into());
        context.insert(
            "veterinarian".to_string(),
            veterinarian.as_record_ref().into(),
        );
        context.insert(
            "has_attachment".to_string(),
            ContextValue::from(attachment.is_some()),
        );

        let log = self
            .queue_email(
                EmailType::ReportReady,
                &recipient_email,
                &subject,
                &context,
                None,
                attachment,
                Some(veterinarian.id),
            )
            .await?;

        Ok(QueueOutcome::Queued(log))
    }

    /// One email per veterinarian on the work order, each with their own
    /// protocols in context and their own attachment preference applied.
    pub async fn send_work_order_notification(
        &self,
        work_order: &RecordRef,
        recipients: &[WorkOrderRecipient],
        work_order_pdf_path: Option<&Path>,
    ) -> Result<Vec<DeliveryLog>, Error> {
        let mut logs = Vec::with_capacity(recipients.len());

        for entry in recipients {
            let prefs = self.preferences.get_or_create(entry.veterinarian.id).await?;

            let recipient_email = prefs.effective_email(&entry.veterinarian.email);
            let attachment = if prefs.include_attachments {
                work_order_pdf_path
            } else {
                None
            };
            let subject = format!("Orden de trabajo - {}", work_order.display);

            let mut context: Context = BTreeMap::new();
            context.insert("work_order".to_string(), work_order.clone().into());
            context.insert(
                "veterinarian".to_string(),
                entry.veterinarian.as_record_ref().into(),
            );
            context.insert("protocols".to_string(), entry.protocols.clone().into());
            context.insert(
                "has_attachment".to_string(),
                ContextValue::from(attachment.is_some()),
            );

            let log = self
                .queue_email(
                    EmailType::WorkOrder,
                    &recipient_email,
                    &subject,
                    &context,
                    None,
                    attachment,
                    Some(entry.veterinarian.id),
                )
                .await?;

            logs.push(log);
        }

        Ok(logs)
    }

    pub async fn send_custom_notification(
        &self,
        recipient_email: &str,
        subject: &str,
        context: &Context,
        template_name: &str,
        recipient_id: Option<Uuid>,
    ) -> Result<DeliveryLog, Error> {
        self.queue_email(
            EmailType::Custom,
            recipient_email,
            subject,
            context,
            Some(template_name),
            None,
            recipient_id,
        )
        .await
    }
}
