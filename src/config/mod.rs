use std::env;

use thiserror::Error;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEFAULT_PORT: u16 = 3001;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),

    #[error("invalid value for {0}")]
    InvalidVar(&'static str),
}

/// Payment gateway settings handed to the gateway client. Holds the API
/// secret, the webhook shared secret, the client-side publishable key and
/// the base URL redirects are built from.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub secret_key: String,
    pub publishable_key: String,
    pub webhook_secret: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub payment: PaymentConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/stitch".to_string());

        let port = match env::var("PORT") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidVar("PORT"))?,
            Err(_) => DEFAULT_PORT,
        };

        Ok(Self {
            database_url,
            port,
            payment: PaymentConfig {
                secret_key: require("STRIPE_SECRET_KEY")?,
                publishable_key: env::var("STRIPE_PUBLISHABLE_KEY").unwrap_or_default(),
                webhook_secret: require("STRIPE_WEBHOOK_SECRET")?,
                base_url: require("BASE_URL")?.trim_end_matches('/').to_string(),
            },
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingVar(name))
}
