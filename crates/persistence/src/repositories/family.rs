//! Family repository: families, memberships and invite codes.

use domain::models::family::FamilyRole;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::entities::{
    FamilyEntity, FamilyMemberWithUserEntity, FamilyMembershipEntity, FamilyRoleDb,
};
use crate::metrics::QueryTimer;

const INVITE_CODE_CONSTRAINT: &str = "families_invite_code_key";
const MAX_INVITE_CODE_ATTEMPTS: usize = 10;

fn is_invite_code_collision(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.constraint() == Some(INVITE_CODE_CONSTRAINT))
}

fn invite_codes_exhausted() -> sqlx::Error {
    sqlx::Error::Protocol("Could not generate a unique invite code".to_string())
}

#[derive(Clone)]
pub struct FamilyRepository {
    pool: PgPool,
}

impl FamilyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a family with the creator as owner, in one transaction.
    ///
    /// Invite codes come from `generate_code`; a colliding code is replaced
    /// and the insert retried.
    pub async fn create_family<F>(
        &self,
        name: &str,
        created_by: Uuid,
        generate_code: F,
    ) -> Result<FamilyEntity, sqlx::Error>
    where
        F: Fn() -> String,
    {
        let timer = QueryTimer::new("create_family");

        for _ in 0..MAX_INVITE_CODE_ATTEMPTS {
            let mut tx = self.pool.begin().await?;

            let inserted = sqlx::query_as::<_, FamilyEntity>(
                r#"
                INSERT INTO families (name, invite_code, created_by)
                VALUES ($1, $2, $3)
                RETURNING id, name, invite_code, created_by, created_at, updated_at
                "#,
            )
            .bind(name)
            .bind(generate_code())
            .bind(created_by)
            .fetch_one(&mut *tx)
            .await;

            let family = match inserted {
                Ok(family) => family,
                Err(e) if is_invite_code_collision(&e) => {
                    debug!("Invite code collision, retrying");
                    tx.rollback().await?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            sqlx::query(
                r#"
                INSERT INTO family_members (family_id, user_id, role)
                VALUES ($1, $2, 'owner')
                "#,
            )
            .bind(family.id)
            .bind(created_by)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            timer.record();
            return Ok(family);
        }

        Err(invite_codes_exhausted())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<FamilyEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_family_by_id");
        let result = sqlx::query_as::<_, FamilyEntity>(
            r#"
            SELECT id, name, invite_code, created_by, created_at, updated_at
            FROM families
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Looks up a family by its canonical invite code.
    pub async fn find_by_invite_code(&self, code: &str) -> Result<Option<FamilyEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_family_by_invite_code");
        let result = sqlx::query_as::<_, FamilyEntity>(
            r#"
            SELECT id, name, invite_code, created_by, created_at, updated_at
            FROM families
            WHERE invite_code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// The user's membership, if any. A user belongs to at most one family.
    pub async fn find_membership_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<FamilyMembershipEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_membership_for_user");
        let result = sqlx::query_as::<_, FamilyMembershipEntity>(
            r#"
            SELECT id, family_id, user_id, role, nickname, joined_at
            FROM family_members
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn get_membership(
        &self,
        family_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<FamilyMembershipEntity>, sqlx::Error> {
        let timer = QueryTimer::new("get_family_membership");
        let result = sqlx::query_as::<_, FamilyMembershipEntity>(
            r#"
            SELECT id, family_id, user_id, role, nickname, joined_at
            FROM family_members
            WHERE family_id = $1 AND user_id = $2
            "#,
        )
        .bind(family_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn update_name(
        &self,
        family_id: Uuid,
        name: &str,
    ) -> Result<Option<FamilyEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_family_name");
        let result = sqlx::query_as::<_, FamilyEntity>(
            r#"
            UPDATE families
            SET name = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, invite_code, created_by, created_at, updated_at
            "#,
        )
        .bind(family_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Deletes the family; restaurants, visits and memberships cascade.
    pub async fn delete_family(&self, family_id: Uuid) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("delete_family");
        let result = sqlx::query("DELETE FROM families WHERE id = $1")
            .bind(family_id)
            .execute(&self.pool)
            .await?;
        timer.record();
        Ok(result.rows_affected())
    }

    /// Replaces the invite code in a single statement, so the old code stops
    /// matching as soon as this commits.
    pub async fn regenerate_invite_code<F>(
        &self,
        family_id: Uuid,
        generate_code: F,
    ) -> Result<Option<FamilyEntity>, sqlx::Error>
    where
        F: Fn() -> String,
    {
        let timer = QueryTimer::new("regenerate_invite_code");

        for _ in 0..MAX_INVITE_CODE_ATTEMPTS {
            let updated = sqlx::query_as::<_, FamilyEntity>(
                r#"
                UPDATE families
                SET invite_code = $2, updated_at = NOW()
                WHERE id = $1
                RETURNING id, name, invite_code, created_by, created_at, updated_at
                "#,
            )
            .bind(family_id)
            .bind(generate_code())
            .fetch_optional(&self.pool)
            .await;

            match updated {
                Err(e) if is_invite_code_collision(&e) => continue,
                other => {
                    timer.record();
                    return other;
                }
            }
        }

        Err(invite_codes_exhausted())
    }

    pub async fn add_member(
        &self,
        family_id: Uuid,
        user_id: Uuid,
        role: FamilyRole,
    ) -> Result<FamilyMembershipEntity, sqlx::Error> {
        let timer = QueryTimer::new("add_family_member");
        let result = sqlx::query_as::<_, FamilyMembershipEntity>(
            r#"
            INSERT INTO family_members (family_id, user_id, role)
            VALUES ($1, $2, $3)
            RETURNING id, family_id, user_id, role, nickname, joined_at
            "#,
        )
        .bind(family_id)
        .bind(user_id)
        .bind(FamilyRoleDb::from(role))
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn remove_member(&self, family_id: Uuid, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("remove_family_member");
        let result = sqlx::query("DELETE FROM family_members WHERE family_id = $1 AND user_id = $2")
            .bind(family_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        timer.record();
        Ok(result.rows_affected())
    }

    pub async fn update_member_role(
        &self,
        family_id: Uuid,
        user_id: Uuid,
        role: FamilyRole,
    ) -> Result<Option<FamilyMembershipEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_family_member_role");
        let result = sqlx::query_as::<_, FamilyMembershipEntity>(
            r#"
            UPDATE family_members
            SET role = $3
            WHERE family_id = $1 AND user_id = $2
            RETURNING id, family_id, user_id, role, nickname, joined_at
            "#,
        )
        .bind(family_id)
        .bind(user_id)
        .bind(FamilyRoleDb::from(role))
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Members with their user details, owner first then by join date.
    pub async fn list_members(
        &self,
        family_id: Uuid,
    ) -> Result<Vec<FamilyMemberWithUserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_family_members");
        let result = sqlx::query_as::<_, FamilyMemberWithUserEntity>(
            r#"
            SELECT fm.user_id, u.display_name, u.email, u.avatar_url, fm.nickname, fm.role, fm.joined_at
            FROM family_members fm
            JOIN users u ON u.id = fm.user_id
            WHERE fm.family_id = $1
            ORDER BY fm.role, fm.joined_at
            "#,
        )
        .bind(family_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Hands ownership to another member in one transaction. The old owner
    /// becomes an admin. Returns `false` if the target is not a member.
    pub async fn transfer_ownership(
        &self,
        family_id: Uuid,
        current_owner_id: Uuid,
        new_owner_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("transfer_family_ownership");
        let mut tx = self.pool.begin().await?;

        // Demote first: the single-owner index rejects two owners at once.
        sqlx::query(
            r#"
            UPDATE family_members
            SET role = 'admin'
            WHERE family_id = $1 AND user_id = $2 AND role = 'owner'
            "#,
        )
        .bind(family_id)
        .bind(current_owner_id)
        .execute(&mut *tx)
        .await?;

        let promoted = sqlx::query(
            r#"
            UPDATE family_members
            SET role = 'owner'
            WHERE family_id = $1 AND user_id = $2
            "#,
        )
        .bind(family_id)
        .bind(new_owner_id)
        .execute(&mut *tx)
        .await?;

        if promoted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;
        timer.record();
        Ok(true)
    }
}
