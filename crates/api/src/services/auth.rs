//! Authentication service: registration, login, session rotation and the
//! one-time token flows (email verification, password reset).

use chrono::{Duration, Utc};
use domain::models::User;
use persistence::repositories::UserRepository;
use shared::crypto::{generate_secure_token, sha256_hex};
use shared::jwt::{extract_user_id, IssuedTokens, JwtConfig, JwtError};
use shared::password::{hash_password, verify_password, PasswordError};
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Verification links stay valid for a day.
const VERIFICATION_TOKEN_TTL_HOURS: i64 = 24;
/// Reset links stay valid for an hour.
const RESET_TOKEN_TTL_HOURS: i64 = 1;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Email already registered")]
    EmailAlreadyExists,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("User is disabled")]
    UserDisabled,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Invalid or expired reset token")]
    InvalidResetToken,

    #[error("Invalid or expired verification token")]
    InvalidVerificationToken,

    #[error("Token error: {0}")]
    TokenError(#[from] JwtError),

    #[error("Password error: {0}")]
    PasswordError(#[from] PasswordError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// A signed-in user and the tokens of their new session.
#[derive(Debug, Clone)]
pub struct AuthResult {
    pub user: User,
    pub tokens: IssuedTokens,
}

/// Result of registration. The verification token is for the email only.
#[derive(Debug, Clone)]
pub struct Registration {
    pub auth: AuthResult,
    pub verification_token: String,
}

/// Reset token issued for an existing account.
#[derive(Debug, Clone)]
pub struct PasswordResetTicket {
    pub user: User,
    pub token: String,
}

pub struct AuthService {
    users: UserRepository,
    jwt: Arc<JwtConfig>,
}

impl AuthService {
    pub fn new(pool: PgPool, jwt: Arc<JwtConfig>) -> Self {
        Self {
            users: UserRepository::new(pool),
            jwt,
        }
    }

    /// Creates an account and signs it in. Password strength is checked by
    /// the request DTO before this is called.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Registration, AuthError> {
        if self.users.find_by_email(email).await?.is_some() {
            return Err(AuthError::EmailAlreadyExists);
        }

        let password_hash = hash_password(password)?;

        let user: User = match self
            .users
            .create_user(email, &password_hash, display_name.trim())
            .await
        {
            Ok(entity) => entity.into(),
            // Lost a race with a concurrent registration of the same email.
            Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some("23505") => {
                return Err(AuthError::EmailAlreadyExists);
            }
            Err(e) => return Err(e.into()),
        };

        let tokens = self.start_session(user.id).await?;

        let verification_token = generate_secure_token();
        self.users
            .set_verification_token(
                user.id,
                &sha256_hex(&verification_token),
                Utc::now() + Duration::hours(VERIFICATION_TOKEN_TTL_HOURS),
            )
            .await?;

        info!(user_id = %user.id, "User registered");

        Ok(Registration {
            auth: AuthResult { user, tokens },
            verification_token,
        })
    }

    /// Unknown email and wrong password give the same error.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResult, AuthError> {
        let user: User = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?
            .into();

        if !verify_password(password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            return Err(AuthError::UserDisabled);
        }

        self.users.update_last_login(user.id).await?;
        let tokens = self.start_session(user.id).await?;

        info!(user_id = %user.id, "User logged in");
        Ok(AuthResult { user, tokens })
    }

    /// Exchanges a refresh token for a new pair. The old refresh token stops
    /// working as soon as the session row is rotated.
    pub async fn refresh(&self, refresh_token: &str) -> Result<IssuedTokens, AuthError> {
        let claims = self
            .jwt
            .validate_refresh_token(refresh_token)
            .map_err(invalid_refresh)?;
        let user_id = extract_user_id(&claims).map_err(invalid_refresh)?;

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;
        if !user.is_active {
            return Err(AuthError::UserDisabled);
        }

        let tokens = self.jwt.issue_session(user_id)?;
        let rotated = self
            .users
            .rotate_session(
                &sha256_hex(&claims.jti),
                &sha256_hex(&tokens.session_id),
                self.session_expiry(),
            )
            .await?;

        if !rotated {
            debug!(user_id = %user_id, "Refresh token has no live session");
            return Err(AuthError::InvalidRefreshToken);
        }

        Ok(tokens)
    }

    /// Ends the session of `refresh_token`, or every session of its user.
    pub async fn logout(&self, refresh_token: &str, all_devices: bool) -> Result<(), AuthError> {
        let claims = self
            .jwt
            .validate_refresh_token(refresh_token)
            .map_err(invalid_refresh)?;
        let user_id = extract_user_id(&claims).map_err(invalid_refresh)?;

        if all_devices {
            let ended = self.users.revoke_all_sessions(user_id).await?;
            info!(user_id = %user_id, sessions = ended, "Signed out everywhere");
        } else if self
            .users
            .delete_session(&sha256_hex(&claims.jti))
            .await?
            .is_none()
        {
            debug!(user_id = %user_id, "Session already ended");
        }

        Ok(())
    }

    /// Returns a reset ticket for an active account, `None` otherwise. The
    /// caller answers the same way in both cases.
    pub async fn forgot_password(
        &self,
        email: &str,
    ) -> Result<Option<PasswordResetTicket>, AuthError> {
        let user: User = match self.users.find_by_email(email).await? {
            Some(entity) if entity.is_active => entity.into(),
            _ => {
                debug!("Password reset requested for unknown or disabled account");
                return Ok(None);
            }
        };

        let token = generate_secure_token();
        self.users
            .set_reset_token(
                user.id,
                &sha256_hex(&token),
                Utc::now() + Duration::hours(RESET_TOKEN_TTL_HOURS),
            )
            .await?;

        info!(user_id = %user.id, "Password reset token issued");
        Ok(Some(PasswordResetTicket { user, token }))
    }

    /// Sets a new password and ends every session of the account.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        let password_hash = hash_password(new_password)?;

        let user_id = self
            .users
            .reset_password(&sha256_hex(token), &password_hash)
            .await?
            .ok_or(AuthError::InvalidResetToken)?;

        info!(user_id = %user_id, "Password reset, all sessions ended");
        Ok(())
    }

    pub async fn verify_email(&self, token: &str) -> Result<User, AuthError> {
        let user: User = self
            .users
            .verify_email(&sha256_hex(token))
            .await?
            .ok_or(AuthError::InvalidVerificationToken)?
            .into();

        info!(user_id = %user.id, "Email verified");
        Ok(user)
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<User, AuthError> {
        self.users
            .find_by_id(user_id)
            .await?
            .map(User::from)
            .ok_or(AuthError::UserNotFound)
    }

    async fn start_session(&self, user_id: Uuid) -> Result<IssuedTokens, AuthError> {
        let tokens = self.jwt.issue_session(user_id)?;
        self.users
            .create_session(
                user_id,
                &sha256_hex(&tokens.session_id),
                self.session_expiry(),
            )
            .await?;
        Ok(tokens)
    }

    fn session_expiry(&self) -> chrono::DateTime<Utc> {
        Utc::now() + Duration::seconds(self.jwt.refresh_token_expiry_secs)
    }
}

fn invalid_refresh(err: JwtError) -> AuthError {
    match err {
        JwtError::TokenExpired | JwtError::InvalidToken | JwtError::DecodingError(_) => {
            AuthError::InvalidRefreshToken
        }
        other => AuthError::TokenError(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_refresh_classification() {
        assert!(matches!(
            invalid_refresh(JwtError::TokenExpired),
            AuthError::InvalidRefreshToken
        ));
        assert!(matches!(
            invalid_refresh(JwtError::DecodingError("bad base64".into())),
            AuthError::InvalidRefreshToken
        ));
        assert!(matches!(
            invalid_refresh(JwtError::InvalidKey("no key".into())),
            AuthError::TokenError(_)
        ));
    }
}
