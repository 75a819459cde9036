use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::domain::Platform;
use crate::token_manager::OAuthClient;
use crate::verification::WebhookSecrets;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Test => "test",
            Self::Production => "production",
        }
    }

    /// Dev-only routes are mounted everywhere except production.
    pub fn allows_dev_routes(&self) -> bool {
        *self != Self::Production
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            "production" | "prod" => Ok(Self::Production),
            other => anyhow::bail!("unknown APP_ENV: {other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Clone)]
pub struct PlatformConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub scope: String,
    pub auth_url: String,
    pub api_url: String,
    pub webhook_secret: Option<String>,
    pub webhook_secret_secondary: Option<String>,
}

impl PlatformConfig {
    fn from_env(prefix: &str, scope: &str, auth_url: &str, api_url: &str) -> Self {
        let var = |name: &str| optional(&format!("{prefix}_{name}"));
        Self {
            client_id: var("CLIENT_ID"),
            client_secret: var("CLIENT_SECRET"),
            scope: var("SCOPE").unwrap_or_else(|| scope.into()),
            auth_url: var("AUTH_URL").unwrap_or_else(|| auth_url.into()),
            api_url: var("API_URL").unwrap_or_else(|| api_url.into()),
            webhook_secret: var("WEBHOOK_SECRET"),
            webhook_secret_secondary: var("WEBHOOK_SECRET_SECONDARY"),
        }
    }

    /// `None` unless both the client id and secret are set.
    pub fn oauth_client(&self) -> Option<OAuthClient> {
        Some(OAuthClient {
            client_id: self.client_id.clone()?,
            client_secret: self.client_secret.clone()?,
            scope: self.scope.clone(),
            token_url: self.auth_url.clone(),
        })
    }

    pub fn webhook_secrets(&self) -> WebhookSecrets {
        WebhookSecrets::new(self.webhook_secret.clone(), self.webhook_secret_secondary.clone())
    }
}

#[derive(Clone)]
pub struct WebhookSettings {
    pub max_skew_secs: i64,
    pub dedup_capacity: usize,
    pub dedup_ttl: Duration,
}

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub db_max_connections: u32,
    pub otlp_endpoint: Option<String>,
    pub log_format: LogFormat,
    pub environment: Environment,
    pub admin_api_token: Option<String>,
    pub public_base_url: String,
    pub outbound_timeout: Duration,
    pub token_refresh_interval: Duration,
    pub webhooks: WebhookSettings,
    pub ubereats: PlatformConfig,
    pub foodpanda: PlatformConfig,
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T>(name: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(name)
        .unwrap_or_else(|_| default.into())
        .parse()
        .with_context(|| format!("invalid {name}"))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL required")?,
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            db_max_connections: parsed("DB_MAX_CONNECTIONS", "20")?,
            otlp_endpoint: optional("OTEL_EXPORTER_OTLP_ENDPOINT"),
            log_format: match optional("LOG_FORMAT").as_deref() {
                Some("pretty") => LogFormat::Pretty,
                _ => LogFormat::Json,
            },
            environment: env::var("APP_ENV")
                .unwrap_or_else(|_| "production".into())
                .parse()?,
            admin_api_token: optional("ADMIN_API_TOKEN"),
            public_base_url: env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| "http://localhost:8080".into()),
            outbound_timeout: Duration::from_secs(parsed("OUTBOUND_TIMEOUT_SECS", "30")?),
            token_refresh_interval: Duration::from_secs(parsed("TOKEN_REFRESH_INTERVAL_SECS", "60")?),
            webhooks: WebhookSettings {
                max_skew_secs: parsed("WEBHOOK_MAX_SKEW_SECS", "300")?,
                dedup_capacity: parsed("WEBHOOK_DEDUP_CAPACITY", "10000")?,
                dedup_ttl: Duration::from_secs(parsed("WEBHOOK_DEDUP_TTL_SECS", "3600")?),
            },
            ubereats: PlatformConfig::from_env(
                "UBER_EATS",
                "eats.store eats.order eats.store.status.write",
                "https://auth.uber.com/oauth/v2/token",
                "https://api.uber.com",
            ),
            foodpanda: PlatformConfig::from_env(
                "FOODPANDA",
                "catalog orders",
                "https://auth.foodpanda.com/oauth/v2/token",
                "https://api.foodpanda.com",
            ),
        })
    }

    pub fn platform(&self, platform: Platform) -> &PlatformConfig {
        match platform {
            Platform::UberEats => &self.ubereats,
            Platform::Foodpanda => &self.foodpanda,
        }
    }

    pub fn oauth_clients(&self) -> HashMap<Platform, OAuthClient> {
        Platform::ALL
            .into_iter()
            .filter_map(|p| self.platform(p).oauth_client().map(|c| (p, c)))
            .collect()
    }

    pub fn webhook_secrets(&self) -> HashMap<Platform, WebhookSecrets> {
        Platform::ALL
            .into_iter()
            .map(|p| (p, self.platform(p).webhook_secrets()))
            .collect()
    }

    pub fn catalog_callback_url(&self) -> String {
        format!(
            "{}/webhooks/foodpanda/catalog-callback",
            self.public_base_url.trim_end_matches('/')
        )
    }
}
