use std::sync::Arc;

use anyhow::{Error, Result};
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

use email_service::{
    api,
    clients::{
        database::DatabaseClient, queue::RabbitMqClient, smtp::SmtpMailer,
        template::TemplateRegistry,
    },
    config::Config,
    models::retry::RetryConfig,
    worker::Worker,
};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Starting email delivery worker");

    let database = Arc::new(DatabaseClient::connect(&config.database_url).await?);
    let templates = Arc::new(TemplateRegistry::with_defaults());
    let mailer = Arc::new(SmtpMailer::new(&config)?);
    let queue = Arc::new(RabbitMqClient::connect(&config).await?);

    let api_config = config.clone();
    tokio::spawn(async move {
        if let Err(e) = api::run_api_server(api_config).await {
            error!(error = %e, "Health check server exited");
        }
    });

    let worker = Worker::new(
        queue,
        templates,
        database.clone(),
        mailer,
        database,
        RetryConfig::from_config(&config),
        config.worker_concurrency,
    );

    worker.run().await
}
