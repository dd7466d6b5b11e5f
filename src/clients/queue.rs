use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties, Consumer,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
        QueueDeclareOptions,
    },
    types::FieldTable,
};
use tracing::info;

use crate::{config::Config, models::message::DispatchMessage};

/// The enqueue side of the async transport, as the facade sees it.
#[async_trait]
pub trait DispatchQueue: Send + Sync {
    async fn publish(&self, message: &DispatchMessage) -> Result<(), Error>;
}

pub struct RabbitMqClient {
    channel: Channel,
    email_queue_name: String,
}

impl RabbitMqClient {
    pub async fn connect(config: &Config) -> Result<Self, Error> {
        info!("Connecting to RabbitMQ");

        let connection = Connection::connect(&config.rabbitmq_url, ConnectionProperties::default())
            .await
            .map_err(|_| anyhow!("Failed to connect to RabbitMQ"))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|_| anyhow!("RabbitMQ channel creation failed"))?;

        channel
            .basic_qos(config.prefetch_count, BasicQosOptions::default())
            .await
            .map_err(|_| anyhow!("Failed to set up QoS"))?;

        channel
            .queue_declare(
                &config.email_queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|_| anyhow!("Failed to declare email queue"))?;

        info!(queue = %config.email_queue_name, "RabbitMQ channel ready");

        Ok(Self {
            channel,
            email_queue_name: config.email_queue_name.clone(),
        })
    }

    pub async fn create_consumer(&self) -> Result<Consumer, Error> {
        let consumer = self
            .channel
            .basic_consume(
                &self.email_queue_name,
                "email_worker",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|_| anyhow!("Failed to create consumer"))?;

        info!(queue = %self.email_queue_name, "Consumer created for queue");

        Ok(consumer)
    }

    pub async fn acknowledge(&self, delivery_tag: u64) -> Result<(), Error> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|_| anyhow!("Failed to acknowledge message"))?;

        Ok(())
    }
}

#[async_trait]
impl DispatchQueue for RabbitMqClient {
    async fn publish(&self, message: &DispatchMessage) -> Result<(), Error> {
        let payload = serde_json::to_vec(message)?;

        self.channel
            .basic_publish(
                "",
                &self.email_queue_name,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_delivery_mode(2),
            )
            .await
            .map_err(|_| anyhow!("Failed to publish dispatch message"))?;

        Ok(())
    }
}
