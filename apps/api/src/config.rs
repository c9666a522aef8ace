//! API configuration.
//!
//! Sources, later ones winning:
//! ```text
//! 1. ApiConfig::default()
//! 2. comandas.toml (optional, working directory)
//! 3. COMANDAS_* environment, "__" between sections
//!      COMANDAS_SERVER__PORT=9000
//!      COMANDAS_AUTH__JWT_SECRET=...
//!      COMANDAS_PROVIDERS__REDE_SANDBOX=false
//! ```

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use comandas_core::{BusinessCalendar, Money, INITIAL_CASH};
use comandas_pinpad::ProviderSettings;

/// Secret used when none is configured. Fine for development only.
pub const DEV_JWT_SECRET: &str = "comandas-dev-secret-change-in-production";

/// API configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub server: ServerConfig,

    /// SQLite file path.
    pub database_path: String,

    pub auth: AuthConfig,
    pub business: BusinessConfig,
    pub providers: ProvidersConfig,
    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for signing tokens.
    pub jwt_secret: String,

    /// Access token lifetime in seconds.
    pub access_lifetime_secs: i64,

    /// Refresh token lifetime in seconds.
    pub refresh_lifetime_secs: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessConfig {
    /// Whole hours from UTC used to decide what "today" means.
    pub utc_offset_hours: i32,

    /// Opening cash float, in centavos.
    pub initial_cash_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub rede_sandbox: bool,
    pub mercado_pago_base_url: String,
    pub mercado_pago_payer_email: String,

    /// Used when a pinpad's own timeout is not positive.
    pub timeout_secs: u64,
}

/// First superuser, created when the users table is empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub admin_email: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            server: ServerConfig::default(),
            database_path: "./comandas.db".to_string(),
            auth: AuthConfig::default(),
            business: BusinessConfig::default(),
            providers: ProvidersConfig::default(),
            bootstrap: BootstrapConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            access_lifetime_secs: 3600,      // 1 hour
            refresh_lifetime_secs: 604_800,  // 7 days
        }
    }
}

impl Default for BusinessConfig {
    fn default() -> Self {
        BusinessConfig {
            utc_offset_hours: comandas_core::calendar::DEFAULT_UTC_OFFSET_HOURS,
            initial_cash_cents: INITIAL_CASH.cents(),
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        let settings = ProviderSettings::default();
        ProvidersConfig {
            rede_sandbox: settings.rede_sandbox,
            mercado_pago_base_url: settings.mercado_pago_base_url,
            mercado_pago_payer_email: settings.mercado_pago_payer_email,
            timeout_secs: settings.default_timeout_seconds,
        }
    }
}

impl ApiConfig {
    /// Loads defaults, then `comandas.toml`, then the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("comandas")
    }

    /// Same as [`ApiConfig::load`] with another file stem.
    pub fn load_from(file_stem: &str) -> Result<Self, ConfigError> {
        let config: ApiConfig = Config::builder()
            .add_source(Config::try_from(&ApiConfig::default())?)
            .add_source(File::with_name(file_stem).required(false))
            .add_source(
                Environment::with_prefix("COMANDAS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Rejects values the server can't start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("auth.jwt_secret".to_string()));
        }
        if self.auth.access_lifetime_secs <= 0 {
            return Err(ConfigError::InvalidValue("auth.access_lifetime_secs".to_string()));
        }
        if self.auth.refresh_lifetime_secs <= self.auth.access_lifetime_secs {
            return Err(ConfigError::InvalidValue("auth.refresh_lifetime_secs".to_string()));
        }
        if self.business.initial_cash_cents < 0 {
            return Err(ConfigError::InvalidValue("business.initial_cash_cents".to_string()));
        }
        self.calendar()?;

        let bootstrap = &self.bootstrap;
        if bootstrap.admin_username.is_some() != bootstrap.admin_password.is_some() {
            return Err(ConfigError::InvalidValue(
                "bootstrap.admin_username and bootstrap.admin_password go together".to_string(),
            ));
        }
        Ok(())
    }

    /// Business calendar for the configured offset.
    pub fn calendar(&self) -> Result<BusinessCalendar, ConfigError> {
        BusinessCalendar::from_offset_hours(self.business.utc_offset_hours)
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))
    }

    pub fn initial_cash(&self) -> Money {
        Money::from_cents(self.business.initial_cash_cents)
    }

    pub fn provider_settings(&self) -> ProviderSettings {
        ProviderSettings {
            mercado_pago_base_url: self.providers.mercado_pago_base_url.clone(),
            mercado_pago_payer_email: self.providers.mercado_pago_payer_email.clone(),
            rede_sandbox: self.providers.rede_sandbox,
            default_timeout_seconds: self.providers.timeout_secs,
        }
    }

    /// `host:port` to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
