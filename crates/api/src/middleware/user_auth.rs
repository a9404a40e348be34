//! User JWT authentication middleware.

use axum::{
    body::Body,
    extract::State,
    http::{header, request::Parts, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use shared::jwt::{extract_user_id, JwtConfig, JwtError};
use uuid::Uuid;

use crate::app::AppState;

/// Caller identity taken from a valid access token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    /// Token id, logged for session tracing.
    pub jti: String,
}

impl AuthenticatedUser {
    pub fn validate(jwt: &JwtConfig, token: &str) -> Result<Self, JwtError> {
        let claims = jwt.validate_access_token(token)?;
        let user_id = extract_user_id(&claims)?;
        Ok(Self {
            user_id,
            jti: claims.jti,
        })
    }
}

/// Token from an `Authorization: Bearer ...` header, if one is present.
pub fn bearer_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Validates the token of `parts`, `None` when absent or invalid.
pub(crate) fn authenticate_parts(parts: &Parts, jwt: &JwtConfig) -> Option<AuthenticatedUser> {
    let token = bearer_token(&parts.headers)?;
    match AuthenticatedUser::validate(jwt, token) {
        Ok(auth) => Some(auth),
        Err(e) => {
            tracing::debug!(error = %e, "JWT validation failed");
            None
        }
    }
}

/// Rejects requests without a valid access token. The identity is stored in
/// request extensions for the extractors and the rate limiter.
pub async fn require_user_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(req.headers()) else {
        return unauthorized_response("Missing or invalid Authorization header");
    };

    match AuthenticatedUser::validate(&state.jwt, token) {
        Ok(auth) => {
            req.extensions_mut().insert(auth);
            next.run(req).await
        }
        Err(e) => {
            tracing::debug!(error = %e, "JWT validation failed");
            unauthorized_response("Invalid or expired token")
        }
    }
}

/// Attaches the identity when a valid token is sent; never rejects.
pub async fn optional_user_auth(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let (mut parts, body) = req.into_parts();
    if let Some(auth) = authenticate_parts(&parts, &state.jwt) {
        parts.extensions.insert(auth);
    }
    next.run(Request::from_parts(parts, body)).await
}

fn unauthorized_response(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": "unauthorized",
            "message": message
        })),
    )
        .into_response()
}
