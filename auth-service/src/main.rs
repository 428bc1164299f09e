use banking_auth::{
    build_router,
    config::{AuthConfig, RefreshStoreKind},
    services::{
        database::{create_pool, run_migrations},
        metrics::init_metrics,
        InMemoryRefreshStore, LoginService, PermissionRegistry, PgCredentialStore,
        RedisRefreshStore, RefreshStateStore, SystemClock,
    },
    AppState,
};
use service_core::error::AppError;
use service_core::middleware::rate_limit::create_ip_rate_limiter;
use service_core::observability::init_tracing;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = AuthConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    init_metrics().map_err(|e| AppError::InternalError(e.into()))?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        rotation = config.token.enforce_rotation,
        refresh_store = ?config.refresh_store,
        "Starting banking authentication service"
    );

    let pool = create_pool(&config.database)
        .await
        .map_err(|e| AppError::DatabaseError(e.into()))?;
    run_migrations(&pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.into()))?;
    let credential_store = Arc::new(PgCredentialStore::new(pool));

    let clock = Arc::new(SystemClock);
    let refresh_store: Arc<dyn RefreshStateStore> = match config.refresh_store {
        RefreshStoreKind::Memory => Arc::new(InMemoryRefreshStore::new(
            config.token.refresh_lifetime_seconds(),
            clock.clone(),
        )),
        RefreshStoreKind::Redis => {
            let redis = config.redis.as_ref().ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!("REDIS_URL is required for redis store"))
            })?;
            Arc::new(
                RedisRefreshStore::new(redis, config.token.refresh_lifetime_seconds())
                    .await
                    .map_err(AppError::InternalError)?,
            )
        }
    };

    let registry = match &config.roles_path {
        Some(path) => {
            tracing::info!(path = %path, "Loading role permissions from file");
            PermissionRegistry::from_json_file(path).map_err(AppError::ConfigError)?
        }
        None => PermissionRegistry::banking_defaults(),
    };
    tracing::info!(roles = registry.roles().count(), "Permission registry loaded");

    let login_service = LoginService::new(
        &config.token,
        registry,
        credential_store,
        refresh_store,
        clock,
    )
    .map_err(AppError::ConfigError)?;

    let login_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.login_attempts,
        config.rate_limit.login_window_seconds,
    );

    let state = AppState {
        login_service,
        operation_timeout: Duration::from_millis(config.operation_timeout_ms),
        login_rate_limiter,
    };
    let app = build_router(state);

    let addr: SocketAddr = config
        .common
        .bind_address()
        .parse()
        .map_err(|e: std::net::AddrParseError| AppError::ConfigError(e.into()))?;

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
