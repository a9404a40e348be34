//! Visit endpoints. Writes go through the visit recorder, which performs
//! authentication, validation and family checks before touching storage.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::models::{RecordVisitRequest, VisitDetail};
use domain::services::RecordedVisit;
use persistence::repositories::VisitRepository;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{OptionalUserAuth, UserAuth};
use crate::middleware::metrics::record_visit_saved;
use crate::routes::restaurants::visible_restaurant;

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct VisitListResponse {
    pub visits: Vec<VisitDetail>,
    pub total: usize,
}

async fn load_visit(
    repo: &VisitRepository,
    restaurant_id: Uuid,
    visit_id: Uuid,
) -> Result<VisitDetail, ApiError> {
    let visit = repo
        .find_in_restaurant(restaurant_id, visit_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Visit not found".to_string()))?;

    repo.load_details(vec![visit])
        .await?
        .pop()
        .ok_or_else(|| ApiError::NotFound("Visit not found".to_string()))
}

async fn saved_visit(
    state: &AppState,
    restaurant_id: Uuid,
    recorded: &RecordedVisit,
) -> Result<VisitDetail, ApiError> {
    record_visit_saved(recorded.created);

    let repo = VisitRepository::new(state.pool.clone());
    load_visit(&repo, restaurant_id, recorded.visit_id).await
}

/// Visits of a restaurant, newest date first.
///
/// GET /api/v1/restaurants/:restaurant_id/visits
pub async fn list_visits(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(restaurant_id): Path<Uuid>,
) -> Result<Json<VisitListResponse>, ApiError> {
    let restaurant = visible_restaurant(&state, user_auth.user_id, restaurant_id).await?;

    let repo = VisitRepository::new(state.pool.clone());
    let visits = repo
        .load_details(repo.list_for_restaurant(restaurant.id).await?)
        .await?;

    Ok(Json(VisitListResponse {
        total: visits.len(),
        visits,
    }))
}

/// Record a new visit with its dishes and attendees.
///
/// POST /api/v1/restaurants/:restaurant_id/visits
pub async fn create_visit(
    State(state): State<AppState>,
    user_auth: OptionalUserAuth,
    Path(restaurant_id): Path<Uuid>,
    Json(request): Json<RecordVisitRequest>,
) -> Result<(StatusCode, Json<VisitDetail>), ApiError> {
    let recorded = state
        .visit_recorder
        .record(user_auth.user_id(), restaurant_id, None, request)
        .await?;

    let visit = saved_visit(&state, restaurant_id, &recorded).await?;
    Ok((StatusCode::CREATED, Json(visit)))
}

/// Replace a visit, including its full dish and attendee lists.
///
/// PUT /api/v1/restaurants/:restaurant_id/visits/:visit_id
pub async fn update_visit(
    State(state): State<AppState>,
    user_auth: OptionalUserAuth,
    Path((restaurant_id, visit_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<RecordVisitRequest>,
) -> Result<Json<VisitDetail>, ApiError> {
    let recorded = state
        .visit_recorder
        .record(user_auth.user_id(), restaurant_id, Some(visit_id), request)
        .await?;

    Ok(Json(saved_visit(&state, restaurant_id, &recorded).await?))
}

/// DELETE /api/v1/restaurants/:restaurant_id/visits/:visit_id
pub async fn delete_visit(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path((restaurant_id, visit_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let restaurant = visible_restaurant(&state, user_auth.user_id, restaurant_id).await?;

    let deleted = VisitRepository::new(state.pool.clone())
        .delete(restaurant.id, visit_id)
        .await?;
    if deleted == 0 {
        return Err(ApiError::NotFound("Visit not found".to_string()));
    }

    info!(visit_id = %visit_id, restaurant_id = %restaurant.id, user_id = %user_auth.user_id, "Visit deleted");
    Ok(StatusCode::NO_CONTENT)
}
