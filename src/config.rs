use std::str::FromStr;

use shuttle_runtime::SecretStore;
use url::Url;

const DEFAULT_SESSION_IDLE_TIMEOUT_SECS: i64 = 30 * 60;
const DEFAULT_SESSION_CLEANUP_INTERVAL_SECS: u64 = 5 * 60;
const DEFAULT_PAYMENT_INTENT_TTL_SECS: i64 = 60 * 60;
/// Upper bound for every timeout setting.
const MAX_TIMEOUT_SECS: i64 = 30 * 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing secret {0}")]
    Missing(&'static str),
    #[error("Invalid secret {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    pub storage: StorageBackend,
    pub payment: PaymentConfig,
    pub dashboard: DashboardConfig,
    pub session: SessionConfig,
}

#[derive(Clone, Debug)]
pub struct TelegramConfig(pub String);

/// Where user documents live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Memory { capacity: usize },
    Redis { url: String },
    Turso { url: String, token: String },
}

#[derive(Clone, Debug)]
pub struct PaymentConfig {
    /// Confirm Telegram payments as soon as the button is pressed.
    pub simulate: bool,
    /// Telegram Payments provider token, Telegram invoices are offered only when set.
    pub provider_token: Option<String>,
    /// Unconfirmed payments are dropped after this long.
    pub intent_ttl_secs: i64,
    /// M-Pesa checkout page, the method is offered only when set.
    pub mpesa_pay_url: Option<Url>,
}

#[derive(Clone, Debug)]
pub struct DashboardConfig {
    pub url: Url,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Memory usage estimate:
    /// - Conversation state: ~300 bytes per entry × 1,000 = ~0.3 MB
    pub cache_capacity: usize,
    pub idle_timeout_secs: i64,
    pub cleanup_interval_secs: u64,
}

impl AppConfig {
    pub fn from_secrets(secret_store: &SecretStore) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| secret_store.get(key))
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        info!("Building AppConfig...");

        let secrets = Secrets { lookup };

        let storage = match secrets.optional("STORAGE_BACKEND").as_deref().unwrap_or("memory") {
            "memory" => StorageBackend::Memory { capacity: 1_000 },
            "redis" => StorageBackend::Redis {
                url: secrets.required("REDIS_URL")?,
            },
            "turso" => StorageBackend::Turso {
                url: secrets.required("TURSO_URL")?,
                token: secrets.required("TURSO_TOKEN")?,
            },
            other => {
                return Err(ConfigError::Invalid {
                    key: "STORAGE_BACKEND",
                    reason: format!("unknown backend {}", other),
                })
            }
        };

        let config = AppConfig {
            telegram: TelegramConfig(secrets.required("TELEGRAM_BOT_TOKEN")?),
            storage,
            payment: PaymentConfig {
                simulate: secrets.parsed_or("SIMULATE_PAYMENTS", false)?,
                provider_token: secrets.optional("PAYMENT_PROVIDER_TOKEN"),
                intent_ttl_secs: secrets.timeout_secs("PAYMENT_INTENT_TTL_SECS", DEFAULT_PAYMENT_INTENT_TTL_SECS)?,
                mpesa_pay_url: secrets
                    .optional("MPESA_PAY_URL")
                    .map(|raw| parse_url("MPESA_PAY_URL", &raw))
                    .transpose()?,
            },
            dashboard: DashboardConfig {
                url: parse_url("DASHBOARD_URL", &secrets.required("DASHBOARD_URL")?)?,
            },
            session: SessionConfig {
                cache_capacity: 1_000,
                idle_timeout_secs: secrets.timeout_secs("SESSION_IDLE_TIMEOUT_SECS", DEFAULT_SESSION_IDLE_TIMEOUT_SECS)?,
                cleanup_interval_secs: secrets
                    .timeout_secs("SESSION_CLEANUP_INTERVAL_SECS", DEFAULT_SESSION_CLEANUP_INTERVAL_SECS as i64)?
                    as u64,
            },
        };

        if !config.payment.simulate && config.payment.provider_token.is_none() {
            warn!("PAYMENT_PROVIDER_TOKEN is not set, Telegram payments are disabled");
        }

        info!("AppConfig built");

        Ok(config)
    }
}

struct Secrets<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Secrets<F> {
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.optional(key).ok_or(ConfigError::Missing(key))
    }

    /// Seconds in `1..=MAX_TIMEOUT_SECS`.
    fn timeout_secs(&self, key: &'static str, default: i64) -> Result<i64, ConfigError> {
        let secs = self.parsed_or(key, default)?;
        if !(1..=MAX_TIMEOUT_SECS).contains(&secs) {
            return Err(ConfigError::Invalid {
                key,
                reason: format!("must be between 1 and {} seconds", MAX_TIMEOUT_SECS),
            });
        }
        Ok(secs)
    }

    fn parsed_or<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            Some(raw) => raw.parse::<T>().map_err(|e| ConfigError::Invalid {
                key,
                reason: e.to_string(),
            }),
            None => Ok(default),
        }
    }
}

fn parse_url(key: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}
