//! User JWT authentication extractors.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::user_auth::{authenticate_parts, bearer_token, AuthenticatedUser};

/// The signed-in caller. Rejects with 401 when there is no valid token.
#[derive(Debug, Clone)]
pub struct UserAuth {
    pub user_id: Uuid,
    pub jti: String,
}

impl From<AuthenticatedUser> for UserAuth {
    fn from(data: AuthenticatedUser) -> Self {
        Self {
            user_id: data.user_id,
            jti: data.jti,
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for UserAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(auth) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(auth.clone().into());
        }

        if bearer_token(&parts.headers).is_none() {
            return Err(ApiError::Unauthorized(
                "Missing or invalid Authorization header".to_string(),
            ));
        }

        authenticate_parts(parts, &state.jwt)
            .map(Into::into)
            .ok_or_else(|| ApiError::Unauthorized("Invalid or expired token".to_string()))
    }
}

/// The caller if signed in. Handlers decide what anonymous access means.
#[derive(Debug, Clone)]
pub struct OptionalUserAuth(pub Option<UserAuth>);

impl OptionalUserAuth {
    pub fn user_id(&self) -> Option<Uuid> {
        self.0.as_ref().map(|auth| auth.user_id)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for OptionalUserAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(auth) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(OptionalUserAuth(Some(auth.clone().into())));
        }

        Ok(OptionalUserAuth(
            authenticate_parts(parts, &state.jwt).map(Into::into),
        ))
    }
}
