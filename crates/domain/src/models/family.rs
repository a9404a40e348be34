//! Family domain models: the group of users sharing one restaurant journal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

/// Role within a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FamilyRole {
    Owner,
    Admin,
    Member,
}

impl FamilyRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            FamilyRole::Owner => "owner",
            FamilyRole::Admin => "admin",
            FamilyRole::Member => "member",
        }
    }

    /// Rename the family and remove members.
    pub fn can_manage_family(&self) -> bool {
        matches!(self, FamilyRole::Owner | FamilyRole::Admin)
    }

    /// Whether this role may remove a member holding `target`.
    ///
    /// Owners remove anyone but another owner; admins remove plain members.
    pub fn can_remove(&self, target: FamilyRole) -> bool {
        match self {
            FamilyRole::Owner => target != FamilyRole::Owner,
            FamilyRole::Admin => target == FamilyRole::Member,
            FamilyRole::Member => false,
        }
    }

    pub fn can_regenerate_invite_code(&self) -> bool {
        matches!(self, FamilyRole::Owner)
    }

    pub fn can_change_roles(&self) -> bool {
        matches!(self, FamilyRole::Owner)
    }

    pub fn can_delete_family(&self) -> bool {
        matches!(self, FamilyRole::Owner)
    }

    pub fn can_transfer_ownership(&self) -> bool {
        matches!(self, FamilyRole::Owner)
    }

    /// Owners must hand the family over (or delete it) before leaving.
    pub fn can_leave(&self) -> bool {
        !matches!(self, FamilyRole::Owner)
    }
}

impl FromStr for FamilyRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "owner" => Ok(FamilyRole::Owner),
            "admin" => Ok(FamilyRole::Admin),
            "member" => Ok(FamilyRole::Member),
            _ => Err(format!("Invalid family role: {}", s)),
        }
    }
}

impl fmt::Display for FamilyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Family {
    pub id: Uuid,
    pub name: String,
    pub invite_code: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user's membership in a family.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FamilyMembership {
    pub id: Uuid,
    pub family_id: Uuid,
    pub user_id: Uuid,
    pub role: FamilyRole,
    pub nickname: Option<String>,
    pub joined_at: DateTime<Utc>,
}

/// A member as listed on the family page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FamilyMember {
    pub user_id: Uuid,
    pub display_name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub nickname: Option<String>,
    pub role: FamilyRole,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct CreateFamilyRequest {
    #[validate(
        length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"),
        custom(function = "shared::validation::validate_not_blank")
    )]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct UpdateFamilyRequest {
    #[validate(
        length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"),
        custom(function = "shared::validation::validate_not_blank")
    )]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct JoinFamilyRequest {
    #[validate(length(min = 1, max = 32, message = "Invite code is required"))]
    pub code: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChangeRoleRequest {
    pub role: FamilyRole,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TransferOwnershipRequest {
    pub new_owner_id: Uuid,
}

/// Response for the caller's family page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FamilyDetail {
    pub id: Uuid,
    pub name: String,
    pub invite_code: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub your_role: FamilyRole,
    pub members: Vec<FamilyMember>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct InviteCodeResponse {
    pub invite_code: String,
}
