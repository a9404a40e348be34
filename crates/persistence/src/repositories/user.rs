//! User repository: accounts, sessions and one-time tokens.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{UserEntity, UserSessionEntity};
use crate::metrics::QueryTimer;

const USER_COLUMNS: &str = "id, email, password_hash, display_name, avatar_url, is_active, \
                            email_verified, created_at, updated_at, last_login_at";

#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_by_id");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Case-insensitive lookup.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_by_email");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        display_name: &str,
    ) -> Result<UserEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_user");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            r#"
            INSERT INTO users (email, password_hash, display_name)
            VALUES (LOWER($1), $2, $3)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(password_hash)
        .bind(display_name)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn update_last_login(&self, id: Uuid) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("update_last_login");
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        timer.record();
        Ok(())
    }

    /// Updates the provided profile fields; `None` keeps the current value and
    /// an empty avatar URL clears it.
    pub async fn update_profile(
        &self,
        id: Uuid,
        display_name: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_user_profile");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            r#"
            UPDATE users
            SET display_name = COALESCE($2, display_name),
                avatar_url = CASE WHEN $3::text IS NULL THEN avatar_url ELSE NULLIF($3, '') END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(display_name)
        .bind(avatar_url)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn set_verification_token(
        &self,
        id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("set_verification_token");
        sqlx::query(
            r#"
            UPDATE users
            SET verification_token_hash = $2, verification_expires_at = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(())
    }

    /// Consumes a verification token. Returns the verified user, or `None`
    /// if the token is unknown or expired.
    pub async fn verify_email(&self, token_hash: &str) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("verify_email");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            r#"
            UPDATE users
            SET email_verified = true,
                verification_token_hash = NULL,
                verification_expires_at = NULL,
                updated_at = NOW()
            WHERE verification_token_hash = $1 AND verification_expires_at > NOW()
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn set_reset_token(
        &self,
        id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("set_reset_token");
        sqlx::query(
            r#"
            UPDATE users
            SET reset_token_hash = $2, reset_expires_at = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(())
    }

    /// Consumes a reset token, stores the new hash and ends every session of
    /// the user. Returns the user id, or `None` for an unknown/expired token.
    pub async fn reset_password(
        &self,
        token_hash: &str,
        new_password_hash: &str,
    ) -> Result<Option<Uuid>, sqlx::Error> {
        let timer = QueryTimer::new("reset_password");
        let mut tx = self.pool.begin().await?;

        let user_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE users
            SET password_hash = $2,
                reset_token_hash = NULL,
                reset_expires_at = NULL,
                updated_at = NOW()
            WHERE reset_token_hash = $1 AND reset_expires_at > NOW()
            RETURNING id
            "#,
        )
        .bind(token_hash)
        .bind(new_password_hash)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(id) = user_id {
            sqlx::query("DELETE FROM user_sessions WHERE user_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        timer.record();
        Ok(user_id)
    }

    pub async fn create_session(
        &self,
        user_id: Uuid,
        refresh_token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<UserSessionEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_user_session");
        let result = sqlx::query_as::<_, UserSessionEntity>(
            r#"
            INSERT INTO user_sessions (user_id, refresh_token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, refresh_token_hash, expires_at, created_at, last_used_at
            "#,
        )
        .bind(user_id)
        .bind(refresh_token_hash)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Swaps a live session's refresh hash for a new one. Returns `false`
    /// when the old session is unknown or expired (e.g. a reused token).
    pub async fn rotate_session(
        &self,
        old_refresh_hash: &str,
        new_refresh_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("rotate_user_session");
        let result = sqlx::query(
            r#"
            UPDATE user_sessions
            SET refresh_token_hash = $2, expires_at = $3, last_used_at = NOW()
            WHERE refresh_token_hash = $1 AND expires_at > NOW()
            "#,
        )
        .bind(old_refresh_hash)
        .bind(new_refresh_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected() == 1)
    }

    /// Deletes one session. Returns the owning user, if the session existed.
    pub async fn delete_session(&self, refresh_hash: &str) -> Result<Option<Uuid>, sqlx::Error> {
        let timer = QueryTimer::new("delete_user_session");
        let result = sqlx::query_scalar(
            "DELETE FROM user_sessions WHERE refresh_token_hash = $1 RETURNING user_id",
        )
        .bind(refresh_hash)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn revoke_all_sessions(&self, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("revoke_all_user_sessions");
        let result = sqlx::query("DELETE FROM user_sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        timer.record();
        Ok(result.rows_affected())
    }
}
