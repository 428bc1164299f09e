use service_core::error::AppError;

/// Self-service registration is not offered; accounts are provisioned by the bank
#[utoipa::path(
    post,
    path = "/auth/register",
    responses(
        (status = 501, description = "Registration is not available", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn register() -> AppError {
    AppError::NotImplemented("Registration is not available".to_string())
}
