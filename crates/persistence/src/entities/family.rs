//! Family entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::family::{FamilyMember, FamilyMembership, FamilyRole};
use sqlx::FromRow;
use uuid::Uuid;

/// Maps the PostgreSQL `family_role` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "family_role", rename_all = "lowercase")]
pub enum FamilyRoleDb {
    Owner,
    Admin,
    Member,
}

impl From<FamilyRoleDb> for FamilyRole {
    fn from(db_role: FamilyRoleDb) -> Self {
        match db_role {
            FamilyRoleDb::Owner => FamilyRole::Owner,
            FamilyRoleDb::Admin => FamilyRole::Admin,
            FamilyRoleDb::Member => FamilyRole::Member,
        }
    }
}

impl From<FamilyRole> for FamilyRoleDb {
    fn from(role: FamilyRole) -> Self {
        match role {
            FamilyRole::Owner => FamilyRoleDb::Owner,
            FamilyRole::Admin => FamilyRoleDb::Admin,
            FamilyRole::Member => FamilyRoleDb::Member,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct FamilyEntity {
    pub id: Uuid,
    pub name: String,
    pub invite_code: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FamilyEntity> for domain::models::Family {
    fn from(entity: FamilyEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            invite_code: entity.invite_code,
            created_by: entity.created_by,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct FamilyMembershipEntity {
    pub id: Uuid,
    pub family_id: Uuid,
    pub user_id: Uuid,
    pub role: FamilyRoleDb,
    pub nickname: Option<String>,
    pub joined_at: DateTime<Utc>,
}

impl From<FamilyMembershipEntity> for FamilyMembership {
    fn from(entity: FamilyMembershipEntity) -> Self {
        Self {
            id: entity.id,
            family_id: entity.family_id,
            user_id: entity.user_id,
            role: entity.role.into(),
            nickname: entity.nickname,
            joined_at: entity.joined_at,
        }
    }
}

/// Membership joined with the member's user row.
#[derive(Debug, Clone, FromRow)]
pub struct FamilyMemberWithUserEntity {
    pub user_id: Uuid,
    pub display_name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub nickname: Option<String>,
    pub role: FamilyRoleDb,
    pub joined_at: DateTime<Utc>,
}

impl From<FamilyMemberWithUserEntity> for FamilyMember {
    fn from(entity: FamilyMemberWithUserEntity) -> Self {
        Self {
            user_id: entity.user_id,
            display_name: entity.display_name,
            email: entity.email,
            avatar_url: entity.avatar_url,
            nickname: entity.nickname,
            role: entity.role.into(),
            joined_at: entity.joined_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_conversion_round_trip() {
        for role in [FamilyRole::Owner, FamilyRole::Admin, FamilyRole::Member] {
            let db: FamilyRoleDb = role.into();
            assert_eq!(FamilyRole::from(db), role);
        }
    }
}
