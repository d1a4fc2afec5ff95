//! Service configuration, read from the environment (`.env` supported).

use std::env;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} must be set in {environment} environment")]
    MissingSecret {
        name: &'static str,
        environment: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// development | staging | production
    pub environment: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub stripe_api_base: String,
    pub webhook_tolerance_secs: i64,
    pub currency: String,
    /// Base URL of the storefront, used for checkout redirects.
    pub site_url: String,
    pub jwt_secret: String,
    pub jwt_audience: Option<String>,
    pub mail_api_url: String,
    pub mail_api_key: String,
    pub mail_from: String,
    pub storage_url: String,
    pub storage_service_key: String,
    pub proof_bucket: String,
    pub invoice_bucket: String,
    /// When set, internal endpoints require a matching `X-Internal-Key` header.
    pub internal_api_key: Option<String>,
    pub outbox_poll_interval: Duration,
    pub outbox_batch_size: i64,
    pub outbox_max_attempts: i32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = var_or("ENVIRONMENT", "development");

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            host: var_or("HOST", "0.0.0.0"),
            port: parsed_or("PORT", 8080),
            stripe_secret_key: require_secret("STRIPE_SECRET_KEY", &environment)?,
            stripe_webhook_secret: require_secret("STRIPE_WEBHOOK_SECRET", &environment)?,
            stripe_api_base: var_or("STRIPE_API_BASE", "https://api.stripe.com"),
            webhook_tolerance_secs: parsed_or("WEBHOOK_TOLERANCE_SECS", 300),
            currency: var_or("CURRENCY", "gbp"),
            site_url: var_or("SITE_URL", "http://localhost:5173"),
            jwt_secret: require_secret("JWT_SECRET", &environment)?,
            jwt_audience: optional("JWT_AUDIENCE"),
            mail_api_url: var_or("MAIL_API_URL", "https://api.resend.com/emails"),
            mail_api_key: require_secret("MAIL_API_KEY", &environment)?,
            mail_from: var_or("MAIL_FROM", "Loadify Market <orders@loadify.market>"),
            storage_url: var_or("STORAGE_URL", "http://localhost:54321/storage/v1"),
            storage_service_key: require_secret("STORAGE_SERVICE_KEY", &environment)?,
            proof_bucket: var_or("PROOF_BUCKET", "proof-of-delivery"),
            invoice_bucket: var_or("INVOICE_BUCKET", "invoices"),
            internal_api_key: optional("INTERNAL_API_KEY"),
            outbox_poll_interval: Duration::from_secs(parsed_or("OUTBOX_POLL_SECS", 5)),
            outbox_batch_size: parsed_or("OUTBOX_BATCH_SIZE", 20),
            outbox_max_attempts: parsed_or("OUTBOX_MAX_ATTEMPTS", 8),
            environment,
        })
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn parsed_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Secrets must be present outside development; development gets a placeholder.
fn require_secret(name: &'static str, environment: &str) -> Result<String, ConfigError> {
    match optional(name) {
        Some(value) => Ok(value),
        None if environment == "development" => Ok(format!("dev-{name}-not-for-production")),
        None => Err(ConfigError::MissingSecret {
            name,
            environment: environment.to_string(),
        }),
    }
}
