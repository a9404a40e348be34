//! Profile endpoints of the signed-in user.

use axum::{extract::State, Json};
use domain::models::user::UpdateProfileRequest;
use domain::models::{User, UserProfile};
use persistence::repositories::UserRepository;
use tracing::info;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;

/// GET /api/v1/users/me
pub async fn get_me(
    State(state): State<AppState>,
    user_auth: UserAuth,
) -> Result<Json<UserProfile>, ApiError> {
    let repo = UserRepository::new(state.pool.clone());
    let user: User = repo
        .find_by_id(user_auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?
        .into();

    Ok(Json(user.into()))
}

/// Updates display name and/or avatar. An empty avatar URL clears it.
///
/// PUT /api/v1/users/me
pub async fn update_me(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Json(mut request): Json<UpdateProfileRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    let clear_avatar = request
        .avatar_url
        .as_deref()
        .is_some_and(|url| url.trim().is_empty());
    if clear_avatar {
        request.avatar_url = None;
    }
    request.validate()?;

    let repo = UserRepository::new(state.pool.clone());
    let display_name = request.display_name.as_deref().map(str::trim);
    let avatar_url = if clear_avatar {
        Some("")
    } else {
        request.avatar_url.as_deref().map(str::trim)
    };

    let user: User = repo
        .update_profile(user_auth.user_id, display_name, avatar_url)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?
        .into();

    info!(user_id = %user.id, "Profile updated");
    Ok(Json(user.into()))
}
