//! Token engine: credential checks, token minting, refresh rotation and
//! verification, plus the stores they depend on.

mod clock;
pub mod credentials;
pub mod database;
mod deadline;
pub mod error;
mod issuer;
mod login;
pub mod metrics;
mod permissions;
pub mod redis;
pub mod refresh_store;
mod refresher;
mod token_codec;
mod verifier;

pub use clock::{Clock, ManualClock, SystemClock};
pub use credentials::{CredentialStore, CredentialVerifier, InMemoryCredentialStore};
pub use database::PgCredentialStore;
pub use error::AuthError;
pub use issuer::TokenIssuer;
pub use login::LoginService;
pub use permissions::PermissionRegistry;
pub use redis::RedisRefreshStore;
pub use refresh_store::{InMemoryRefreshStore, RefreshStateStore, RotateOutcome};
pub use refresher::TokenRefresher;
pub use token_codec::TokenCodec;
pub use verifier::TokenVerifier;
