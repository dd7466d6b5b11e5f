use anyhow::{Error, Result};
use chrono::Utc;
use tokio::time::{Duration, sleep};
use tracing::{debug, error, info, warn};

use crate::{
    clients::{
        database::{DeliveryStore, RecordStore},
        smtp::MailTransport,
        template::TemplateRegistry,
    },
    config::Config,
    context::deserialize_context,
    models::{
        message::{DispatchMessage, OutgoingEmail},
        retry::RetryConfig,
    },
};

/// One dispatch attempt: deserialize context, render, transmit, record the
/// outcome. Any failure marks the delivery log FAILED and re-raises so the
/// caller's retry policy takes over; a later successful attempt overwrites
/// FAILED with SENT.
pub async fn process_message(
    payload: &str,
    templates: &TemplateRegistry,
    records: &dyn RecordStore,
    mailer: &dyn MailTransport,
    deliveries: &dyn DeliveryStore,
) -> Result<(), Error> {
    let message = serde_json::from_str::<DispatchMessage>(payload)?;

    info!(
        task_id = %message.task_id,
        email_type = %message.email_type,
        recipient = %message.recipient_email,
        "Processing dispatch message"
    );

    match dispatch_once(&message, templates, records, mailer).await {
        Ok(_) => {
            if let Some(log_id) = message.delivery_log_id {
                if let Err(store_err) = deliveries.mark_sent(log_id, Utc::now()).await {
                    warn!(error = %store_err, "Failed to update delivery log");
                }
            }

            info!(
                task_id = %message.task_id,
                recipient = %message.recipient_email,
                "Email sent successfully"
            );
            Ok(())
        }
        Err(e) => {
            if let Some(log_id) = message.delivery_log_id {
                if let Err(store_err) = deliveries.mark_failed(log_id, &e.to_string()).await {
                    warn!(error = %store_err, "Failed to update delivery log");
                }
            }

            error!(
                task_id = %message.task_id,
                recipient = %message.recipient_email,
                error = %e,
                "Email dispatch failed"
            );
            Err(e)
        }
    }
}

async fn dispatch_once(
    message: &DispatchMessage,
    templates: &TemplateRegistry,
    records: &dyn RecordStore,
    mailer: &dyn MailTransport,
) -> Result<(), Error> {
    let variables = deserialize_context(&message.context, records).await;

    let template = templates.resolve(message.template_name.as_deref(), message.email_type);
    let rendered = templates.render(template, &variables)?;

    let attachment_path = match &message.attachment_path {
        Some(path) => {
            if tokio::fs::try_exists(path).await.unwrap_or(false) {
                Some(path.clone())
            } else {
                warn!(
                    path = %path.display(),
                    "Attachment missing on disk, sending without it"
                );
                None
            }
        }
        None => None,
    };

    mailer
        .send(&OutgoingEmail {
            to: message.recipient_email.clone(),
            subject: message.subject.clone(),
            text_body: rendered.text,
            html_body: rendered.html,
            attachment_path,
        })
        .await
}

/// Plain-text fallback for a rendered HTML body: tags dropped, blank lines
/// collapsed.
pub fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;

    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }

    out.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

impl RetryConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.max_retry_attempts,
            initial_delay_ms: config.initial_retry_delay_ms,
            max_delay_ms: config.max_retry_delay_ms,
            backoff_multiplier: config.retry_backoff_multiplier,
        }
    }
}

pub async fn retry_with_backoff<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay_ms = config.initial_delay_ms;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    info!(
                        attempt,
                        max_attempts = config.max_attempts,
                        "Retry succeeded"
                    );
                }
                return Ok(result);
            }
            Err(e) => {
                if attempt >= config.max_attempts {
                    warn!(
                        max_attempts = config.max_attempts,
                        error = %e,
                        "Retry failed after exhausting all attempts"
                    );
                    return Err(e);
                }

                debug!(
                    attempt,
                    max_attempts = config.max_attempts,
                    delay_ms,
                    "Retry attempt failed, backing off"
                );

                let jitter = rand::random_range(-0.1..=0.1);

                let jittered_delay = (delay_ms as f64 * (1.0 + jitter)) as u64;

                sleep(Duration::from_millis(jittered_delay)).await;

                delay_ms = std::cmp::min(delay_ms * config.backoff_multiplier, config.max_delay_ms);
            }
        }
    }
}
