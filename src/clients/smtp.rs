use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Attachment, Mailbox, MultiPart, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use tracing::{debug, info};

use crate::{config::Config, models::message::OutgoingEmail};

/// Outbound mail seam. Implemented over SMTP in production; tests substitute
/// a scriptable transport.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), Error>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .port(config.smtp_port);

        if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        info!(
            host = %config.smtp_host,
            port = config.smtp_port,
            "SMTP mailer initialized"
        );

        Ok(Self {
            transport: builder.build(),
            from_address: config.smtp_from.clone(),
        })
    }

    pub async fn test_connection(&self) -> Result<(), Error> {
        let ok = self
            .transport
            .test_connection()
            .await
            .map_err(|e| anyhow!("SMTP connection test failed: {}", e))?;

        if !ok {
            return Err(anyhow!("SMTP server did not respond to NOOP"));
        }

        Ok(())
    }

    async fn build_message(&self, email: &OutgoingEmail) -> Result<Message, Error> {
        let from: Mailbox = self
            .from_address
            .parse()
            .map_err(|e| anyhow!("Invalid sender address: {}", e))?;
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| anyhow!("Invalid recipient address: {}", e))?;

        let alternative =
            MultiPart::alternative_plain_html(email.text_body.clone(), email.html_body.clone());

        let body = match &email.attachment_path {
            Some(path) => {
                let content = tokio::fs::read(path)
                    .await
                    .map_err(|e| anyhow!("Failed to read attachment {}: {}", path.display(), e))?;

                let filename = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "adjunto".to_string());

                let content_type = match path.extension().and_then(|ext| ext.to_str()) {
                    Some("pdf") => ContentType::parse("application/pdf")?,
                    _ => ContentType::parse("application/octet-stream")?,
                };

                debug!(filename = %filename, "Attaching file to email");

                MultiPart::mixed()
                    .multipart(alternative)
                    .singlepart(Attachment::new(filename).body(content, content_type))
            }
            None => alternative,
        };

        Message::builder()
            .from(from)
            .to(to)
            .subject(email.subject.clone())
            .multipart(body)
            .map_err(|e| anyhow!("Failed to build email: {}", e))
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), Error> {
        let message = self.build_message(email).await?;

        self.transport
            .send(message)
            .await
            .map_err(|e| anyhow!("SMTP send failed: {}", e))?;

        debug!(to = %email.to, "Email transmitted");

        Ok(())
    }
}
