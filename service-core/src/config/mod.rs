use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::Deserialize;

/// Listener settings shared by every service, read from `SERVER_*` variables.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Load `.{APP_ENV}.env` (default `development`) and then `.env` into the
/// process environment. Variables already set are never overridden.
pub fn load_env_files() {
    let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
    dotenvy::from_filename(format!(".{}.env", env)).ok();
    dotenvy::dotenv().ok();
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        load_env_files();

        let config = Cfg::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("SERVER").try_parsing(true))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_address_joins_host_and_port() {
        let config = Config {
            address: "127.0.0.1".to_string(),
            port: 9000,
        };
        assert_eq!(config.bind_address(), "127.0.0.1:9000");
    }
}
