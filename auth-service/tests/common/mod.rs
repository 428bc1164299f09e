//! Shared setup for banking-auth integration tests: an engine wired to
//! in-memory stores and a manually driven clock.

#![allow(dead_code)]

use banking_auth::{
    build_router,
    config::TokenConfig,
    models::CredentialRecord,
    services::{
        InMemoryCredentialStore, InMemoryRefreshStore, LoginService, ManualClock,
        PermissionRegistry, RefreshStateStore, RotateOutcome,
    },
    utils::{hash_password, Password},
    AppState,
};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use secrecy::SecretString;
use service_core::axum::Router;
use service_core::middleware::rate_limit::create_ip_rate_limiter;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

pub const SIGNING_KEY: &str = "integration-signing-key-0123456789abcdef";
pub const ALICE_SECRET: &str = "correct-secret";

pub fn token_config(enforce_rotation: bool) -> TokenConfig {
    TokenConfig {
        signing_key: SecretString::new(SIGNING_KEY.to_string()),
        access_token_expiry_minutes: 15,
        refresh_token_expiry_days: 7,
        enforce_rotation,
    }
}

pub const REFRESH_TTL_SECONDS: i64 = 7 * 86_400;

pub fn registry() -> PermissionRegistry {
    PermissionRegistry::new([
        ("teller".to_string(), vec!["view_balance", "transfer"]),
        ("auditor".to_string(), vec!["view_balance"]),
        (
            "admin".to_string(),
            vec!["GetAllCustomers", "GetCustomer", "NewAccount", "NewTransaction"],
        ),
        ("user".to_string(), vec!["GetCustomer", "NewTransaction"]),
    ])
}

/// Argon2 is slow in debug builds, so every record shares one hash.
fn alice_hash() -> String {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| {
        hash_password(&Password::new(ALICE_SECRET.to_string()))
            .expect("hash")
            .into_string()
    })
    .clone()
}

pub fn record(login_id: &str, role: &str, customer_id: Option<&str>) -> CredentialRecord {
    CredentialRecord {
        login_id: login_id.to_string(),
        secret_hash: alice_hash(),
        role: role.to_string(),
        customer_id: customer_id.map(str::to_string),
    }
}

pub fn secret(value: &str) -> Password {
    Password::new(value.to_string())
}

pub fn deadline() -> tokio::time::Instant {
    tokio::time::Instant::now() + Duration::from_secs(5)
}

/// Refresh store that sleeps before every call, for deadline tests.
/// The call only reaches the inner store once the sleep completes.
pub struct SlowRefreshStore {
    inner: Arc<InMemoryRefreshStore>,
    delay_ms: AtomicU64,
}

impl SlowRefreshStore {
    pub fn new(inner: Arc<InMemoryRefreshStore>) -> Self {
        Self {
            inner,
            delay_ms: AtomicU64::new(0),
        }
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    async fn pause(&self) {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }
}

#[async_trait]
impl RefreshStateStore for SlowRefreshStore {
    async fn get_current(&self, family_id: &str) -> Result<Option<String>, anyhow::Error> {
        self.pause().await;
        self.inner.get_current(family_id).await
    }

    async fn set_current(&self, family_id: &str, token_id: &str) -> Result<(), anyhow::Error> {
        self.pause().await;
        self.inner.set_current(family_id, token_id).await
    }

    async fn rotate(
        &self,
        family_id: &str,
        expected: &str,
        next: &str,
    ) -> Result<RotateOutcome, anyhow::Error> {
        self.pause().await;
        self.inner.rotate(family_id, expected, next).await
    }

    async fn revoke(&self, family_id: &str) -> Result<(), anyhow::Error> {
        self.pause().await;
        self.inner.revoke(family_id).await
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        self.inner.health_check().await
    }
}

pub struct TestEngine {
    pub service: LoginService,
    pub clock: Arc<ManualClock>,
    pub credentials: Arc<InMemoryCredentialStore>,
    pub refresh_store: Arc<InMemoryRefreshStore>,
}

impl TestEngine {
    pub fn new() -> Self {
        Self::with_rotation(true)
    }

    pub fn with_rotation(enforce_rotation: bool) -> Self {
        Self::build(enforce_rotation, |store| store as Arc<dyn RefreshStateStore>)
    }

    /// Engine whose service reaches `refresh_store` through a
    /// [`SlowRefreshStore`] with no delay until one is set.
    pub fn with_slow_refresh_store() -> (Self, Arc<SlowRefreshStore>) {
        let mut slow = None;
        let engine = Self::build(true, |store| {
            let wrapped = Arc::new(SlowRefreshStore::new(store));
            slow = Some(wrapped.clone());
            wrapped as Arc<dyn RefreshStateStore>
        });
        (engine, slow.expect("slow store"))
    }

    /// A second service over this engine's stores and clock, with its own
    /// role table.
    pub fn service_with_registry(&self, registry: PermissionRegistry) -> LoginService {
        LoginService::new(
            &token_config(true),
            registry,
            self.credentials.clone(),
            self.refresh_store.clone(),
            self.clock.clone(),
        )
        .expect("login service")
    }

    fn build<F>(enforce_rotation: bool, wrap: F) -> Self
    where
        F: FnOnce(Arc<InMemoryRefreshStore>) -> Arc<dyn RefreshStateStore>,
    {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 2, 8, 30, 0).unwrap(),
        ));
        let credentials = Arc::new(InMemoryCredentialStore::new());
        credentials.insert(record("alice", "teller", None));
        credentials.insert(record("2001", "user", Some("2001")));
        credentials.insert(record("admin", "admin", None));
        credentials.insert(record("mallory", "janitor", None));

        let refresh_store = Arc::new(InMemoryRefreshStore::new(
            REFRESH_TTL_SECONDS,
            clock.clone(),
        ));

        let service = LoginService::new(
            &token_config(enforce_rotation),
            registry(),
            credentials.clone(),
            wrap(refresh_store.clone()),
            clock.clone(),
        )
        .expect("login service");

        Self {
            service,
            clock,
            credentials,
            refresh_store,
        }
    }

    pub fn router(&self) -> Router {
        self.router_with_login_limit(100)
    }

    pub fn router_with_login_limit(&self, attempts: u32) -> Router {
        build_router(AppState {
            login_service: self.service.clone(),
            operation_timeout: Duration::from_secs(5),
            login_rate_limiter: create_ip_rate_limiter(attempts, 60),
        })
    }
}
