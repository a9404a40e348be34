//! Family endpoints. The caller's family is always resolved from their own
//! membership, never from the path.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::models::family::{
    ChangeRoleRequest, CreateFamilyRequest, FamilyDetail, InviteCodeResponse, JoinFamilyRequest,
    TransferOwnershipRequest, UpdateFamilyRequest,
};
use domain::models::{
    generate_invite_code, normalize_invite_code, Family, FamilyMember, FamilyMembership,
    FamilyRole,
};
use persistence::entities::FamilyEntity;
use persistence::repositories::FamilyRepository;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;
use crate::middleware::metrics::record_family_joined;

const INVALID_INVITE_CODE: &str = "Invalid invite code";

/// Membership of `user_id`, or 404 when they have no family yet.
pub(crate) async fn caller_membership(
    repo: &FamilyRepository,
    user_id: Uuid,
) -> Result<FamilyMembership, ApiError> {
    repo.find_membership_for_user(user_id)
        .await?
        .map(FamilyMembership::from)
        .ok_or_else(|| ApiError::NotFound("You are not a member of any family".to_string()))
}

async fn family_detail(
    repo: &FamilyRepository,
    family: FamilyEntity,
    your_role: FamilyRole,
) -> Result<FamilyDetail, ApiError> {
    let family: Family = family.into();
    let members: Vec<FamilyMember> = repo
        .list_members(family.id)
        .await?
        .into_iter()
        .map(FamilyMember::from)
        .collect();

    Ok(FamilyDetail {
        id: family.id,
        name: family.name,
        invite_code: family.invite_code,
        created_by: family.created_by,
        created_at: family.created_at,
        updated_at: family.updated_at,
        your_role,
        members,
    })
}

async fn load_family(repo: &FamilyRepository, family_id: Uuid) -> Result<FamilyEntity, ApiError> {
    repo.find_by_id(family_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Family not found".to_string()))
}

fn require(allowed: bool, message: &str) -> Result<(), ApiError> {
    if allowed {
        Ok(())
    } else {
        Err(ApiError::Forbidden(message.to_string()))
    }
}

async fn ensure_no_family(repo: &FamilyRepository, user_id: Uuid) -> Result<(), ApiError> {
    if repo.find_membership_for_user(user_id).await?.is_some() {
        return Err(ApiError::Conflict(
            "You already belong to a family".to_string(),
        ));
    }
    Ok(())
}

/// Create a family with the caller as owner.
///
/// POST /api/v1/families
pub async fn create_family(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Json(request): Json<CreateFamilyRequest>,
) -> Result<(StatusCode, Json<FamilyDetail>), ApiError> {
    request.validate()?;

    let repo = FamilyRepository::new(state.pool.clone());
    ensure_no_family(&repo, user_auth.user_id).await?;

    let family = repo
        .create_family(request.name.trim(), user_auth.user_id, generate_invite_code)
        .await?;

    info!(family_id = %family.id, user_id = %user_auth.user_id, "Family created");

    let detail = family_detail(&repo, family, FamilyRole::Owner).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// GET /api/v1/families/me
pub async fn get_my_family(
    State(state): State<AppState>,
    user_auth: UserAuth,
) -> Result<Json<FamilyDetail>, ApiError> {
    let repo = FamilyRepository::new(state.pool.clone());
    let membership = caller_membership(&repo, user_auth.user_id).await?;
    let family = load_family(&repo, membership.family_id).await?;

    Ok(Json(family_detail(&repo, family, membership.role).await?))
}

/// Rename the family. Owner or admin.
///
/// PUT /api/v1/families/me
pub async fn update_my_family(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Json(request): Json<UpdateFamilyRequest>,
) -> Result<Json<FamilyDetail>, ApiError> {
    request.validate()?;

    let repo = FamilyRepository::new(state.pool.clone());
    let membership = caller_membership(&repo, user_auth.user_id).await?;
    require(
        membership.role.can_manage_family(),
        "Only owners and admins can rename the family",
    )?;

    let family = repo
        .update_name(membership.family_id, request.name.trim())
        .await?
        .ok_or_else(|| ApiError::NotFound("Family not found".to_string()))?;

    info!(family_id = %family.id, "Family renamed");
    Ok(Json(family_detail(&repo, family, membership.role).await?))
}

/// Delete the family with its restaurants and visits. Owner only.
///
/// DELETE /api/v1/families/me
pub async fn delete_my_family(
    State(state): State<AppState>,
    user_auth: UserAuth,
) -> Result<StatusCode, ApiError> {
    let repo = FamilyRepository::new(state.pool.clone());
    let membership = caller_membership(&repo, user_auth.user_id).await?;
    require(
        membership.role.can_delete_family(),
        "Only the owner can delete the family",
    )?;

    if repo.delete_family(membership.family_id).await? == 0 {
        return Err(ApiError::NotFound("Family not found".to_string()));
    }

    info!(family_id = %membership.family_id, user_id = %user_auth.user_id, "Family deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Family behind a user-typed invite code. Malformed and unknown codes give
/// the same 404.
pub(crate) async fn resolve_invite_code(
    repo: &FamilyRepository,
    raw: &str,
) -> Result<FamilyEntity, ApiError> {
    let code = normalize_invite_code(raw)
        .map_err(|_| ApiError::NotFound(INVALID_INVITE_CODE.to_string()))?;
    match repo.find_by_invite_code(&code).await? {
        Some(family) => Ok(family),
        None => {
            debug!("Unknown invite code");
            Err(ApiError::NotFound(INVALID_INVITE_CODE.to_string()))
        }
    }
}

/// Join a family with an invite code. Malformed and unknown codes are
/// answered identically.
///
/// POST /api/v1/families/join
pub async fn join_family(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Json(request): Json<JoinFamilyRequest>,
) -> Result<Json<FamilyDetail>, ApiError> {
    request.validate()?;

    let repo = FamilyRepository::new(state.pool.clone());
    ensure_no_family(&repo, user_auth.user_id).await?;

    let family = resolve_invite_code(&repo, &request.code).await?;

    repo.add_member(family.id, user_auth.user_id, FamilyRole::Member)
        .await?;
    record_family_joined();

    info!(family_id = %family.id, user_id = %user_auth.user_id, "Joined family");
    Ok(Json(family_detail(&repo, family, FamilyRole::Member).await?))
}

/// Replace the invite code. The previous code stops working immediately.
///
/// POST /api/v1/families/me/invite-code
pub async fn regenerate_invite_code(
    State(state): State<AppState>,
    user_auth: UserAuth,
) -> Result<Json<InviteCodeResponse>, ApiError> {
    let repo = FamilyRepository::new(state.pool.clone());
    let membership = caller_membership(&repo, user_auth.user_id).await?;
    require(
        membership.role.can_regenerate_invite_code(),
        "Only the owner can regenerate the invite code",
    )?;

    let family = repo
        .regenerate_invite_code(membership.family_id, generate_invite_code)
        .await?
        .ok_or_else(|| ApiError::NotFound("Family not found".to_string()))?;

    info!(family_id = %family.id, "Invite code regenerated");
    Ok(Json(InviteCodeResponse {
        invite_code: family.invite_code,
    }))
}

/// POST /api/v1/families/me/leave
pub async fn leave_family(
    State(state): State<AppState>,
    user_auth: UserAuth,
) -> Result<StatusCode, ApiError> {
    let repo = FamilyRepository::new(state.pool.clone());
    let membership = caller_membership(&repo, user_auth.user_id).await?;
    require(
        membership.role.can_leave(),
        "The owner cannot leave. Transfer ownership first or delete the family.",
    )?;

    repo.remove_member(membership.family_id, user_auth.user_id)
        .await?;

    info!(family_id = %membership.family_id, user_id = %user_auth.user_id, "Left family");
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/families/me/members/:user_id
pub async fn remove_member(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(target_user_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if target_user_id == user_auth.user_id {
        return Err(ApiError::Validation(
            "Use the leave endpoint to remove yourself".to_string(),
        ));
    }

    let repo = FamilyRepository::new(state.pool.clone());
    let membership = caller_membership(&repo, user_auth.user_id).await?;
    require(
        membership.role.can_manage_family(),
        "Only owners and admins can remove members",
    )?;

    let target: FamilyMembership = repo
        .get_membership(membership.family_id, target_user_id)
        .await?
        .map(Into::into)
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;
    require(
        membership.role.can_remove(target.role),
        "You cannot remove this member",
    )?;

    repo.remove_member(membership.family_id, target_user_id)
        .await?;

    info!(
        family_id = %membership.family_id,
        removed_user_id = %target_user_id,
        removed_by = %user_auth.user_id,
        "Member removed"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// Set a member's role to admin or member. Owner only.
///
/// PUT /api/v1/families/me/members/:user_id/role
pub async fn change_member_role(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(target_user_id): Path<Uuid>,
    Json(request): Json<ChangeRoleRequest>,
) -> Result<Json<FamilyDetail>, ApiError> {
    if request.role == FamilyRole::Owner {
        return Err(ApiError::Validation(
            "Use transfer-ownership to make someone the owner".to_string(),
        ));
    }
    if target_user_id == user_auth.user_id {
        return Err(ApiError::Validation(
            "You cannot change your own role".to_string(),
        ));
    }

    let repo = FamilyRepository::new(state.pool.clone());
    let membership = caller_membership(&repo, user_auth.user_id).await?;
    require(
        membership.role.can_change_roles(),
        "Only the owner can change roles",
    )?;

    repo.update_member_role(membership.family_id, target_user_id, request.role)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;

    info!(
        family_id = %membership.family_id,
        user_id = %target_user_id,
        role = %request.role,
        "Member role changed"
    );

    let family = load_family(&repo, membership.family_id).await?;
    Ok(Json(family_detail(&repo, family, membership.role).await?))
}

/// Make another member the owner; the caller becomes an admin.
///
/// POST /api/v1/families/me/transfer-ownership
pub async fn transfer_ownership(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Json(request): Json<TransferOwnershipRequest>,
) -> Result<Json<FamilyDetail>, ApiError> {
    if request.new_owner_id == user_auth.user_id {
        return Err(ApiError::Validation("You already own this family".to_string()));
    }

    let repo = FamilyRepository::new(state.pool.clone());
    let membership = caller_membership(&repo, user_auth.user_id).await?;
    require(
        membership.role.can_transfer_ownership(),
        "Only the owner can transfer ownership",
    )?;

    let transferred = repo
        .transfer_ownership(membership.family_id, user_auth.user_id, request.new_owner_id)
        .await?;
    if !transferred {
        return Err(ApiError::NotFound("Member not found".to_string()));
    }

    info!(
        family_id = %membership.family_id,
        from = %user_auth.user_id,
        to = %request.new_owner_id,
        "Ownership transferred"
    );

    let family = load_family(&repo, membership.family_id).await?;
    Ok(Json(family_detail(&repo, family, FamilyRole::Admin).await?))
}
