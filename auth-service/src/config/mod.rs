use secrecy::{ExposeSecret, SecretString};
use service_core::config as core_config;
use service_core::error::AppError;
use sqlx::postgres::PgConnectOptions;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub token: TokenConfig,
    pub refresh_store: RefreshStoreKind,
    pub redis: Option<RedisConfig>,
    pub roles_path: Option<String>,
    pub operation_timeout_ms: u64,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub user: String,
    pub password: SecretString,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub max_connections: u32,
    pub conn_max_lifetime_seconds: u64,
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(self.password.expose_secret())
            .database(&self.name)
    }
}

/// Signing and lifetime settings for issued tokens.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub signing_key: SecretString,
    pub access_token_expiry_minutes: i64,
    pub refresh_token_expiry_days: i64,
    pub enforce_rotation: bool,
}

impl TokenConfig {
    pub const MIN_SIGNING_KEY_BYTES: usize = 32;
    pub const MAX_ACCESS_TOKEN_EXPIRY_MINUTES: i64 = 24 * 60;
    pub const MAX_REFRESH_TOKEN_EXPIRY_DAYS: i64 = 365;

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.signing_key.expose_secret().len() < Self::MIN_SIGNING_KEY_BYTES {
            anyhow::bail!(
                "TOKEN_SIGNING_KEY must be at least {} bytes",
                Self::MIN_SIGNING_KEY_BYTES
            );
        }

        if !(1..=Self::MAX_ACCESS_TOKEN_EXPIRY_MINUTES).contains(&self.access_token_expiry_minutes) {
            anyhow::bail!(
                "TOKEN_ACCESS_EXPIRY_MINUTES must be between 1 and {}",
                Self::MAX_ACCESS_TOKEN_EXPIRY_MINUTES
            );
        }

        if !(1..=Self::MAX_REFRESH_TOKEN_EXPIRY_DAYS).contains(&self.refresh_token_expiry_days) {
            anyhow::bail!(
                "TOKEN_REFRESH_EXPIRY_DAYS must be between 1 and {}",
                Self::MAX_REFRESH_TOKEN_EXPIRY_DAYS
            );
        }

        let refresh_minutes = self
            .refresh_token_expiry_days
            .checked_mul(24 * 60)
            .ok_or_else(|| anyhow::anyhow!("TOKEN_REFRESH_EXPIRY_DAYS is out of range"))?;
        if self.access_token_expiry_minutes >= refresh_minutes {
            anyhow::bail!("access token lifetime must be shorter than refresh token lifetime");
        }

        Ok(())
    }

    /// Saturates for unvalidated configs; `validate` bounds the days.
    pub fn refresh_lifetime_seconds(&self) -> i64 {
        self.refresh_token_expiry_days.saturating_mul(24 * 60 * 60)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RefreshStoreKind {
    Memory,
    Redis,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        Self::from_source(common, |key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source. Every
    /// missing required variable is reported in a single error.
    pub fn from_source<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut vars = Vars::new(lookup);

        let db_user = vars.required("DB_USER");
        let db_password = vars.required("DB_PASSWORD");
        let db_host = vars.required("DB_ADDR");
        let db_port = vars.required("DB_PORT");
        let db_name = vars.required("DB_NAME");
        let signing_key = vars.required("TOKEN_SIGNING_KEY");

        if !vars.missing.is_empty() {
            return Err(config_error(format!(
                "missing required environment variables: {}",
                vars.missing.join(", ")
            )));
        }

        let environment: Environment = vars.parsed("ENVIRONMENT", Environment::Dev)?;
        let refresh_store: RefreshStoreKind =
            vars.parsed("REFRESH_STORE", RefreshStoreKind::Memory)?;

        let config = AuthConfig {
            common,
            environment,
            service_name: vars.or("SERVICE_NAME", "banking-auth"),
            service_version: vars.or("SERVICE_VERSION", env!("CARGO_PKG_VERSION")),
            log_level: vars.or("LOG_LEVEL", "info"),
            otlp_endpoint: vars.optional("OTLP_ENDPOINT"),
            database: DatabaseConfig {
                user: db_user,
                password: SecretString::new(db_password),
                host: db_host,
                port: parse_value("DB_PORT", &db_port)?,
                name: db_name,
                max_connections: vars.parsed("DB_MAX_CONNECTIONS", 10)?,
                conn_max_lifetime_seconds: vars.parsed("DB_CONN_MAX_LIFETIME_SECONDS", 180)?,
            },
            token: TokenConfig {
                signing_key: SecretString::new(signing_key),
                access_token_expiry_minutes: vars.parsed("TOKEN_ACCESS_EXPIRY_MINUTES", 15)?,
                refresh_token_expiry_days: vars.parsed("TOKEN_REFRESH_EXPIRY_DAYS", 7)?,
                enforce_rotation: vars.parsed("TOKEN_ENFORCE_ROTATION", true)?,
            },
            refresh_store,
            redis: vars.optional("REDIS_URL").map(|url| RedisConfig { url }),
            roles_path: vars.optional("ROLE_PERMISSIONS_PATH"),
            operation_timeout_ms: vars.parsed("OPERATION_TIMEOUT_MS", 5000)?,
            rate_limit: RateLimitConfig {
                login_attempts: vars.parsed("RATE_LIMIT_LOGIN_ATTEMPTS", 5)?,
                login_window_seconds: vars.parsed("RATE_LIMIT_LOGIN_WINDOW_SECONDS", 900)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(config_error("SERVER_PORT must be greater than 0"));
        }

        self.token.validate().map_err(AppError::ConfigError)?;

        if self.operation_timeout_ms == 0 {
            return Err(config_error("OPERATION_TIMEOUT_MS must be positive"));
        }

        if self.refresh_store == RefreshStoreKind::Redis && self.redis.is_none() {
            return Err(config_error("REDIS_URL is required when REFRESH_STORE=redis"));
        }

        if self.rate_limit.login_attempts == 0 || self.rate_limit.login_window_seconds == 0 {
            return Err(config_error("login rate limit must be positive"));
        }

        if self.environment == Environment::Prod && self.refresh_store == RefreshStoreKind::Memory
        {
            tracing::warn!("In-memory refresh store in production does not survive restarts");
        }

        Ok(())
    }
}

struct Vars<F> {
    lookup: F,
    missing: Vec<&'static str>,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn new(lookup: F) -> Self {
        Self {
            lookup,
            missing: Vec::new(),
        }
    }

    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&mut self, key: &'static str) -> String {
        match self.optional(key) {
            Some(value) => value,
            None => {
                self.missing.push(key);
                String::new()
            }
        }
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T, AppError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            Some(raw) => parse_value(key, &raw),
            None => Ok(default),
        }
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| config_error(format!("{} is invalid: {}", key, e)))
}

fn config_error(message: impl Into<String>) -> AppError {
    AppError::ConfigError(anyhow::anyhow!(message.into()))
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl FromStr for RefreshStoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(RefreshStoreKind::Memory),
            "redis" => Ok(RefreshStoreKind::Redis),
            _ => Err(format!("Invalid refresh store: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const KEY: &str = "0123456789abcdef0123456789abcdef";

    fn common() -> core_config::Config {
        core_config::Config {
            address: "127.0.0.1".to_string(),
            port: 8080,
        }
    }

    fn base() -> HashMap<&'static str, String> {
        HashMap::from([
            ("DB_USER", "banking".to_string()),
            ("DB_PASSWORD", "secret".to_string()),
            ("DB_ADDR", "localhost".to_string()),
            ("DB_PORT", "5432".to_string()),
            ("DB_NAME", "banking".to_string()),
            ("TOKEN_SIGNING_KEY", KEY.to_string()),
        ])
    }

    fn load(vars: HashMap<&'static str, String>) -> Result<AuthConfig, AppError> {
        AuthConfig::from_source(common(), move |key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_optional_vars_are_absent() {
        let config = load(base()).unwrap();

        assert_eq!(config.environment, Environment::Dev);
        assert_eq!(config.token.access_token_expiry_minutes, 15);
        assert_eq!(config.token.refresh_token_expiry_days, 7);
        assert!(config.token.enforce_rotation);
        assert_eq!(config.refresh_store, RefreshStoreKind::Memory);
        assert_eq!(config.operation_timeout_ms, 5000);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.rate_limit.login_attempts, 5);
    }

    #[test]
    fn all_missing_variables_are_reported_together() {
        let err = load(HashMap::new()).unwrap_err().to_string();
        for key in ["DB_USER", "DB_PASSWORD", "DB_ADDR", "DB_PORT", "DB_NAME", "TOKEN_SIGNING_KEY"] {
            assert!(err.contains(key), "{} not reported in {}", key, err);
        }
    }

    #[test]
    fn short_signing_key_is_rejected() {
        let mut vars = base();
        vars.insert("TOKEN_SIGNING_KEY", "too-short".to_string());
        assert!(load(vars).is_err());
    }

    #[test]
    fn access_lifetime_must_be_shorter_than_refresh_lifetime() {
        let mut vars = base();
        vars.insert("TOKEN_ACCESS_EXPIRY_MINUTES", "1440".to_string());
        vars.insert("TOKEN_REFRESH_EXPIRY_DAYS", "1".to_string());
        assert!(load(vars).is_err());
    }

    #[test]
    fn non_positive_lifetimes_are_rejected() {
        let mut vars = base();
        vars.insert("TOKEN_ACCESS_EXPIRY_MINUTES", "0".to_string());
        assert!(load(vars).is_err());

        let mut vars = base();
        vars.insert("TOKEN_REFRESH_EXPIRY_DAYS", "-3".to_string());
        assert!(load(vars).is_err());
    }

    #[test]
    fn oversized_lifetimes_are_rejected() {
        let mut vars = base();
        vars.insert("TOKEN_REFRESH_EXPIRY_DAYS", i64::MAX.to_string());
        assert!(load(vars).is_err());

        let mut vars = base();
        vars.insert("TOKEN_ACCESS_EXPIRY_MINUTES", i64::MAX.to_string());
        assert!(load(vars).is_err());

        let mut vars = base();
        vars.insert("TOKEN_REFRESH_EXPIRY_DAYS", "366".to_string());
        assert!(load(vars).is_err());

        let mut vars = base();
        vars.insert("TOKEN_REFRESH_EXPIRY_DAYS", "365".to_string());
        assert!(load(vars).is_ok());
    }

    #[test]
    fn refresh_lifetime_saturates_instead_of_overflowing() {
        let token = TokenConfig {
            signing_key: SecretString::new("k".repeat(32)),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: i64::MAX,
            enforce_rotation: true,
        };
        assert!(token.validate().is_err());
        assert_eq!(token.refresh_lifetime_seconds(), i64::MAX);
    }

    #[test]
    fn redis_store_requires_url() {
        let mut vars = base();
        vars.insert("REFRESH_STORE", "redis".to_string());
        assert!(load(vars.clone()).is_err());

        vars.insert("REDIS_URL", "redis://localhost:6379".to_string());
        let config = load(vars).unwrap();
        assert_eq!(config.refresh_store, RefreshStoreKind::Redis);
        assert_eq!(config.redis.unwrap().url, "redis://localhost:6379");
    }

    #[test]
    fn rotation_can_be_disabled() {
        let mut vars = base();
        vars.insert("TOKEN_ENFORCE_ROTATION", "false".to_string());
        assert!(!load(vars).unwrap().token.enforce_rotation);
    }

    #[test]
    fn unparseable_values_are_rejected() {
        let mut vars = base();
        vars.insert("DB_PORT", "not-a-port".to_string());
        assert!(load(vars).is_err());

        let mut vars = base();
        vars.insert("REFRESH_STORE", "memcached".to_string());
        assert!(load(vars).is_err());
    }

    #[test]
    fn refresh_lifetime_in_seconds() {
        let config = load(base()).unwrap();
        assert_eq!(config.token.refresh_lifetime_seconds(), 7 * 86_400);
    }
}
