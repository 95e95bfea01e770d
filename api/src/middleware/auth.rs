use axum::{
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use common::models::UserClaims;

use crate::state::AppState;

/// Authentication middleware that validates Bearer JWT tokens and stores
/// the claims in request extensions for handlers and the RBAC layer.
#[tracing::instrument(skip(state, req, next))]
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        tracing::warn!("Invalid authorization header format");
        StatusCode::UNAUTHORIZED
    })?;

    let claims = validate_token(token, &state)?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Validate a JWT issued by this service
#[tracing::instrument(skip(token, state))]
fn validate_token(token: &str, state: &AppState) -> Result<UserClaims, StatusCode> {
    let validation = jsonwebtoken::Validation::default();

    let token_data = jsonwebtoken::decode::<UserClaims>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(state.config.auth.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::warn!(error = %e, "Failed to validate token");
        StatusCode::UNAUTHORIZED
    })?;

    if token_data.claims.exp < chrono::Utc::now().timestamp() {
        tracing::warn!("Token expired");
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(token_data.claims)
}
