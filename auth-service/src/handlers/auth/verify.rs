use service_core::{
    axum::{
        extract::{Query, State},
        http::{header::AUTHORIZATION, HeaderMap, StatusCode},
        response::{IntoResponse, Response},
        Json,
    },
    error::AppError,
};

use crate::{
    dtos::auth::{VerifyQuery, VerifyResponse},
    AppState,
};

/// Verify an access token, optionally checking it against a route
#[utoipa::path(
    get,
    path = "/auth/verify",
    params(VerifyQuery),
    responses(
        (status = 200, description = "Token is valid and authorized", body = VerifyResponse),
        (status = 401, description = "Authentication failed", body = ErrorResponse),
        (status = 403, description = "Token does not grant the route", body = VerifyResponse)
    ),
    tag = "Authentication",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn verify(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<VerifyQuery>,
) -> Result<Response, AppError> {
    let token = bearer_token(&headers)
        .or(query.token.as_deref())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Authentication failed")))?;

    let claims = state.login_service.verify(token)?;

    if let Some(route_name) = query.route_name.as_deref() {
        if !claims.is_authorized_for(route_name, query.customer_id.as_deref()) {
            tracing::warn!(
                subject = %claims.sub,
                route = route_name,
                "Token does not authorize requested route"
            );
            let body = VerifyResponse {
                is_authorized: false,
                claims: None,
            };
            return Ok((StatusCode::FORBIDDEN, Json(body)).into_response());
        }
    }

    let body = VerifyResponse {
        is_authorized: true,
        claims: Some(claims),
    };
    Ok((StatusCode::OK, Json(body)).into_response())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
}
