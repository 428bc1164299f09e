use std::future::Future;
use tokio::time::{timeout_at, Instant};

use super::AuthError;

/// Run a store call under the caller's deadline. Backend failures surface as
/// `AuthError::Store`, an elapsed deadline as `AuthError::Timeout`.
pub async fn within<T, F>(deadline: Instant, operation: F) -> Result<T, AuthError>
where
    F: Future<Output = Result<T, anyhow::Error>>,
{
    match timeout_at(deadline, operation).await {
        Ok(result) => result.map_err(AuthError::Store),
        Err(_) => Err(AuthError::Timeout),
    }
}
