use std::sync::Arc;

use anyhow::{Error, Result};
use futures_util::StreamExt;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::{
    clients::{
        database::{DeliveryStore, RecordStore},
        queue::RabbitMqClient,
        smtp::MailTransport,
        template::TemplateRegistry,
    },
    models::retry::RetryConfig,
    utils::{process_message, retry_with_backoff},
};

/// Consumes dispatch messages and runs each through the retry policy on its
/// own task. Messages are acknowledged whether dispatch succeeded or
/// exhausted its retries; a final failure lives on only in the delivery log.
pub struct Worker {
    queue: Arc<RabbitMqClient>,
    templates: Arc<TemplateRegistry>,
    records: Arc<dyn RecordStore>,
    mailer: Arc<dyn MailTransport>,
    deliveries: Arc<dyn DeliveryStore>,
    retry_config: RetryConfig,
    concurrency: usize,
}

impl Worker {
    pub fn new(
        queue: Arc<RabbitMqClient>,
        templates: Arc<TemplateRegistry>,
        records: Arc<dyn RecordStore>,
        mailer: Arc<dyn MailTransport>,
        deliveries: Arc<dyn DeliveryStore>,
        retry_config: RetryConfig,
        concurrency: usize,
    ) -> Self {
        Self {
            queue,
            templates,
            records,
            mailer,
            deliveries,
            retry_config,
            concurrency,
        }
    }

    pub async fn run(&self) -> Result<(), Error> {
        let mut consumer = self.queue.create_consumer().await?;
        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        info!(concurrency = self.concurrency, "Worker started");

        while let Some(delivery) = consumer.next().await {
            let delivery = match delivery {
                Ok(delivery) => delivery,
                Err(e) => {
                    error!(error = %e, "Consumer error");
                    continue;
                }
            };

            let permit = semaphore.clone().acquire_owned().await?;

            let queue = Arc::clone(&self.queue);
            let templates = Arc::clone(&self.templates);
            let records = Arc::clone(&self.records);
            let mailer = Arc::clone(&self.mailer);
            let deliveries = Arc::clone(&self.deliveries);
            let retry_config = self.retry_config.clone();

            tokio::spawn(async move {
                let _permit = permit;
                let payload = String::from_utf8_lossy(&delivery.data).to_string();

                let outcome = retry_with_backoff(&retry_config, || {
                    process_message(
                        &payload,
                        templates.as_ref(),
                        records.as_ref(),
                        mailer.as_ref(),
                        deliveries.as_ref(),
                    )
                })
                .await;

                if let Err(e) = outcome {
                    error!(error = %e, "Dispatch abandoned after exhausting retries");
                }

                if let Err(e) = queue.acknowledge(delivery.delivery_tag).await {
                    warn!(error = %e, "Failed to acknowledge message");
                }
            });
        }

        Ok(())
    }
}
