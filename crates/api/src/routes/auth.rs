//! Authentication routes for registration, login and token management.

use axum::{extract::State, http::StatusCode, Json};
use domain::models::{FamilyRole, UserProfile};
use persistence::repositories::FamilyRepository;
use serde::{Deserialize, Serialize};
use shared::jwt::IssuedTokens;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::metrics::{record_family_joined, record_user_registered};
use crate::routes::families::resolve_invite_code;
use crate::services::auth::{AuthResult, AuthService};

/// Request body for user registration.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// At least 8 characters with an uppercase letter, a lowercase letter and a digit.
    #[validate(custom(function = "shared::validation::validate_password_strength"))]
    pub password: String,

    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub password_confirmation: String,

    #[validate(
        length(min = 1, max = 100, message = "Display name must be 1-100 characters"),
        custom(function = "shared::validation::validate_not_blank")
    )]
    pub display_name: String,

    /// Code from an invite link. The new account joins that family.
    #[serde(default)]
    #[validate(length(max = 32, message = "Invite code is too long"))]
    pub invite_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct LogoutRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,

    #[serde(default)]
    pub all_devices: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Reset token is required"))]
    pub token: String,

    #[validate(custom(function = "shared::validation::validate_password_strength"))]
    pub new_password: String,

    #[validate(must_match(other = "new_password", message = "Passwords do not match"))]
    pub password_confirmation: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct VerifyEmailRequest {
    #[validate(length(min = 1, message = "Verification token is required"))]
    pub token: String,
}

/// Token pair in responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct TokensResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl From<IssuedTokens> for TokensResponse {
    fn from(tokens: IssuedTokens) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: tokens.expires_in,
        }
    }
}

/// Signed-in user with their session tokens.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct AuthResponse {
    pub user: UserProfile,
    pub tokens: TokensResponse,
}

impl From<AuthResult> for AuthResponse {
    fn from(result: AuthResult) -> Self {
        Self {
            user: result.user.into(),
            tokens: result.tokens.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct RegisterResponse {
    #[serde(flatten)]
    pub auth: AuthResponse,
    pub requires_email_verification: bool,
    /// Family joined through `invite_code`, if any.
    pub family_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Register a new user with email and password.
///
/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    request.validate()?;

    // A bad invite code fails the request before any account exists.
    let families = FamilyRepository::new(state.pool.clone());
    let invited_family = match request
        .invite_code
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty())
    {
        Some(code) => Some(resolve_invite_code(&families, code).await?),
        None => None,
    };

    let email = normalize_email(&request.email);
    let auth_service = AuthService::new(state.pool.clone(), state.jwt.clone());
    let registration = auth_service
        .register(&email, &request.password, &request.display_name)
        .await?;
    record_user_registered();

    let family_id = match invited_family {
        Some(family) => {
            join_invited_family(&families, family.id, registration.auth.user.id).await
        }
        None => None,
    };

    let user = &registration.auth.user;
    if let Err(e) = state
        .email
        .send_verification_email(
            &user.email,
            Some(&user.display_name),
            &registration.verification_token,
        )
        .await
    {
        warn!(user_id = %user.id, error = %e, "Failed to send verification email");
    }

    let response = RegisterResponse {
        auth: registration.auth.into(),
        requires_email_verification: true,
        family_id,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// The account already exists at this point, so a failed join is logged and
/// the user can join later with the same code.
async fn join_invited_family(
    families: &FamilyRepository,
    family_id: Uuid,
    user_id: Uuid,
) -> Option<Uuid> {
    match families.add_member(family_id, user_id, FamilyRole::Member).await {
        Ok(_) => {
            record_family_joined();
            info!(family_id = %family_id, user_id = %user_id, "Joined family at registration");
            Some(family_id)
        }
        Err(e) => {
            warn!(family_id = %family_id, user_id = %user_id, error = %e, "Failed to join invited family");
            None
        }
    }
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    request.validate()?;

    let auth_service = AuthService::new(state.pool.clone(), state.jwt.clone());
    let result = auth_service
        .login(&normalize_email(&request.email), &request.password)
        .await?;

    Ok(Json(result.into()))
}

/// Exchange a refresh token for a new token pair.
///
/// POST /api/v1/auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<TokensResponse>, ApiError> {
    request.validate()?;

    let auth_service = AuthService::new(state.pool.clone(), state.jwt.clone());
    let tokens = auth_service.refresh(&request.refresh_token).await?;

    Ok(Json(tokens.into()))
}

/// POST /api/v1/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    Json(request): Json<LogoutRequest>,
) -> Result<StatusCode, ApiError> {
    request.validate()?;

    let auth_service = AuthService::new(state.pool.clone(), state.jwt.clone());
    auth_service
        .logout(&request.refresh_token, request.all_devices)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Answers the same whether or not the account exists.
///
/// POST /api/v1/auth/forgot-password
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    request.validate()?;

    let auth_service = AuthService::new(state.pool.clone(), state.jwt.clone());
    if let Some(ticket) = auth_service
        .forgot_password(&normalize_email(&request.email))
        .await?
    {
        if let Err(e) = state
            .email
            .send_password_reset_email(
                &ticket.user.email,
                Some(&ticket.user.display_name),
                &ticket.token,
            )
            .await
        {
            warn!(user_id = %ticket.user.id, error = %e, "Failed to send password reset email");
        }
    }

    Ok(Json(MessageResponse {
        message: "If an account exists for this email, a reset link has been sent.".to_string(),
    }))
}

/// POST /api/v1/auth/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    request.validate()?;

    let auth_service = AuthService::new(state.pool.clone(), state.jwt.clone());
    auth_service
        .reset_password(&request.token, &request.new_password)
        .await?;

    Ok(Json(MessageResponse {
        message: "Password has been reset. Sign in with your new password.".to_string(),
    }))
}

/// POST /api/v1/auth/verify-email
pub async fn verify_email(
    State(state): State<AppState>,
    Json(request): Json<VerifyEmailRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    request.validate()?;

    let auth_service = AuthService::new(state.pool.clone(), state.jwt.clone());
    let user = auth_service.verify_email(&request.token).await?;

    Ok(Json(user.into()))
}
