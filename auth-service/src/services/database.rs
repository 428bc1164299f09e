//! PostgreSQL-backed credential store.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use super::credentials::CredentialStore;
use crate::config::DatabaseConfig;
use crate::models::CredentialRecord;

/// Create a PostgreSQL connection pool.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    tracing::info!(
        host = %config.host,
        database = %config.name,
        "Connecting to PostgreSQL..."
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(30))
        .max_lifetime(Duration::from_secs(config.conn_max_lifetime_seconds))
        .connect_with(config.connect_options())
        .await?;

    tracing::info!("Successfully connected to PostgreSQL");

    Ok(pool)
}

/// Run database migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations completed");
    Ok(())
}

#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn lookup(&self, login_id: &str) -> Result<Option<CredentialRecord>, anyhow::Error> {
        sqlx::query_as::<_, CredentialRecord>(
            "SELECT username, password_hash, role, customer_id FROM users WHERE username = $1",
        )
        .bind(login_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to look up credentials: {}", e))
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| anyhow::anyhow!("Database health check failed: {}", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn config() -> DatabaseConfig {
        DatabaseConfig {
            user: "banking".to_string(),
            password: SecretString::new("codecamp".to_string()),
            host: "localhost".to_string(),
            port: 5432,
            name: "banking".to_string(),
            max_connections: 2,
            conn_max_lifetime_seconds: 180,
        }
    }

    #[tokio::test]
    #[ignore] // Requires running PostgreSQL
    async fn lookup_unknown_user_returns_none() {
        let pool = create_pool(&config()).await.expect("pool");
        run_migrations(&pool).await.expect("migrations");

        let store = PgCredentialStore::new(pool);
        let record = store.lookup("nobody-by-this-name").await.expect("lookup");
        assert!(record.is_none());
    }
}
