use std::{collections::HashMap, time::Instant};

use chrono::Utc;
use tracing::{debug, warn};

use crate::{
    clients::{database::DatabaseClient, queue::RabbitMqClient, smtp::SmtpMailer},
    config::Config,
    models::health::{HealthCheckResponse, HealthStatus, ServiceHealth},
};

pub struct HealthChecker {
    config: Config,
}

impl HealthChecker {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn check_all(&self) -> HealthCheckResponse {
        let mut checks = HashMap::new();

        let db_health = self.check_database().await;
        checks.insert("database".to_string(), db_health);

        let rabbitmq_health = self.check_rabbitmq().await;
        checks.insert("message_broker".to_string(), rabbitmq_health);

        let smtp_health = self.check_smtp().await;
        checks.insert("mail_transport".to_string(), smtp_health);

        let overall_status = Self::determine_overall_status(&checks);

        HealthCheckResponse {
            status: overall_status,
            timestamp: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            checks,
        }
    }

    async fn check_database(&self) -> ServiceHealth {
        let start = Instant::now();

        match DatabaseClient::connect(&self.config.database_url).await {
            Ok(client) => match client.health_check().await {
                Ok(_) => {
                    let elapsed = start.elapsed().as_millis() as u64;
                    debug!(response_time_ms = elapsed, "Database health check passed");
                    ServiceHealth::healthy(elapsed)
                }
                Err(e) => {
                    warn!(error = %e, "Database health check failed");
                    ServiceHealth::unhealthy(format!("Health check query failed: {}", e))
                }
            },
            Err(e) => {
                warn!(error = %e, "Database connection failed");
                ServiceHealth::unhealthy(format!("Connection failed: {}", e))
            }
        }
    }

    async fn check_rabbitmq(&self) -> ServiceHealth {
        let start = Instant::now();

        match RabbitMqClient::connect(&self.config).await {
            Ok(_) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(response_time_ms = elapsed, "RabbitMQ health check passed");
                ServiceHealth::healthy(elapsed)
            }
            Err(e) => {
                warn!(error = %e, "RabbitMQ connection failed");
                ServiceHealth::unhealthy(format!("Connection failed: {}", e))
            }
        }
    }

    async fn check_smtp(&self) -> ServiceHealth {
        let start = Instant::now();

        let mailer = match SmtpMailer::new(&self.config) {
            Ok(mailer) => mailer,
            Err(e) => {
                warn!(error = %e, "SMTP mailer creation failed");
                return ServiceHealth::unhealthy(format!("Mailer creation failed: {}", e));
            }
        };

        match mailer.test_connection().await {
            Ok(_) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(response_time_ms = elapsed, "SMTP health check passed");
                ServiceHealth::healthy(elapsed)
            }
            Err(e) => {
                warn!(error = %e, "SMTP health check failed");
                ServiceHealth::unhealthy(format!("Connection failed: {}", e))
            }
        }
    }

    fn determine_overall_status(checks: &HashMap<String, ServiceHealth>) -> HealthStatus {
        let has_unhealthy = checks
            .values()
            .any(|health| health.status == HealthStatus::Unhealthy);

        let has_degraded = checks
            .values()
            .any(|health| health.status == HealthStatus::Degraded);

        if has_unhealthy {
            HealthStatus::Unhealthy
        } else if has_degraded {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}
