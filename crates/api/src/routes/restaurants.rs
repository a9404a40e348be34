//! Restaurant endpoints, scoped to the caller's family.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::restaurant::{clean_optional, CreateRestaurantRequest, UpdateRestaurantRequest};
use domain::models::{Restaurant, RestaurantDetail, RestaurantSummary};
use domain::services::{
    aggregate_restaurant, filter_and_sort, stats_by_restaurant, RestaurantListQuery, VisitFacts,
};
use persistence::repositories::{
    FamilyRepository, RestaurantInput, RestaurantPatch, RestaurantRepository, VisitRepository,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;
use validator::{Validate, ValidateUrl};

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;
use crate::routes::families::caller_membership;

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct RestaurantListResponse {
    pub restaurants: Vec<RestaurantSummary>,
    pub total: usize,
}

/// Family id of the caller.
async fn caller_family_id(state: &AppState, user_id: Uuid) -> Result<Uuid, ApiError> {
    let families = FamilyRepository::new(state.pool.clone());
    Ok(caller_membership(&families, user_id).await?.family_id)
}

/// Restaurant `restaurant_id` if it belongs to the caller's family. Other
/// families' restaurants are reported as missing.
pub(crate) async fn visible_restaurant(
    state: &AppState,
    user_id: Uuid,
    restaurant_id: Uuid,
) -> Result<Restaurant, ApiError> {
    let family_id = caller_family_id(state, user_id).await?;
    RestaurantRepository::new(state.pool.clone())
        .find_in_family(family_id, restaurant_id)
        .await?
        .map(Restaurant::from)
        .ok_or_else(|| ApiError::NotFound("Restaurant not found".to_string()))
}

/// List restaurants with their statistics, filtered and sorted.
///
/// GET /api/v1/restaurants?search=&cuisine=&sort=recent|rating|visits|name
pub async fn list_restaurants(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Query(query): Query<RestaurantListQuery>,
) -> Result<Json<RestaurantListResponse>, ApiError> {
    let family_id = caller_family_id(&state, user_auth.user_id).await?;
    let repo = RestaurantRepository::new(state.pool.clone());

    let restaurants = repo.list_for_family(family_id).await?;
    let mut stats = stats_by_restaurant(
        repo.visit_facts_for_family(family_id)
            .await?
            .into_iter()
            .map(Into::into),
    );

    let summaries: Vec<RestaurantSummary> = restaurants
        .into_iter()
        .map(|entity| {
            let restaurant = Restaurant::from(entity);
            let stats = stats.remove(&restaurant.id).unwrap_or_default();
            RestaurantSummary { restaurant, stats }
        })
        .collect();

    let restaurants = filter_and_sort(&summaries, &query);
    Ok(Json(RestaurantListResponse {
        total: restaurants.len(),
        restaurants,
    }))
}

/// POST /api/v1/restaurants
pub async fn create_restaurant(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Json(mut request): Json<CreateRestaurantRequest>,
) -> Result<(StatusCode, Json<Restaurant>), ApiError> {
    request.cuisine = clean_optional(request.cuisine);
    request.address = clean_optional(request.address);
    request.website = clean_optional(request.website);
    request.notes = clean_optional(request.notes);
    request.validate()?;

    let family_id = caller_family_id(&state, user_auth.user_id).await?;
    let repo = RestaurantRepository::new(state.pool.clone());
    let input = RestaurantInput {
        name: request.name.trim(),
        cuisine: request.cuisine.as_deref(),
        address: request.address.as_deref(),
        website: request.website.as_deref(),
        notes: request.notes.as_deref(),
    };
    let restaurant: Restaurant = repo
        .create(family_id, user_auth.user_id, &input)
        .await?
        .into();

    info!(
        restaurant_id = %restaurant.id,
        family_id = %family_id,
        user_id = %user_auth.user_id,
        "Restaurant created"
    );
    Ok((StatusCode::CREATED, Json(restaurant)))
}

/// Restaurant with statistics and all visits, newest first.
///
/// GET /api/v1/restaurants/:restaurant_id
pub async fn get_restaurant(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(restaurant_id): Path<Uuid>,
) -> Result<Json<RestaurantDetail>, ApiError> {
    let restaurant = visible_restaurant(&state, user_auth.user_id, restaurant_id).await?;

    let visits_repo = VisitRepository::new(state.pool.clone());
    let visits = visits_repo
        .load_details(visits_repo.list_for_restaurant(restaurant.id).await?)
        .await?;
    let stats = aggregate_restaurant(visits.iter().map(|v| VisitFacts::from(&v.visit)));

    Ok(Json(RestaurantDetail {
        restaurant,
        stats,
        visits,
    }))
}

/// Updates the given fields. An empty optional field clears it.
///
/// PUT /api/v1/restaurants/:restaurant_id
pub async fn update_restaurant(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(restaurant_id): Path<Uuid>,
    Json(request): Json<UpdateRestaurantRequest>,
) -> Result<Json<Restaurant>, ApiError> {
    request.validate()?;
    if let Some(website) = request.website.as_deref().map(str::trim) {
        if !website.is_empty() && !website.validate_url() {
            return Err(ApiError::Validation("Website must be a valid URL".to_string()));
        }
    }

    let family_id = caller_family_id(&state, user_auth.user_id).await?;
    let repo = RestaurantRepository::new(state.pool.clone());
    let patch = RestaurantPatch {
        name: request.name.as_deref().map(str::trim),
        cuisine: request.cuisine.as_deref().map(str::trim),
        address: request.address.as_deref().map(str::trim),
        website: request.website.as_deref().map(str::trim),
        notes: request.notes.as_deref().map(str::trim),
    };

    let restaurant: Restaurant = repo
        .update(family_id, restaurant_id, &patch)
        .await?
        .ok_or_else(|| ApiError::NotFound("Restaurant not found".to_string()))?
        .into();

    info!(restaurant_id = %restaurant.id, user_id = %user_auth.user_id, "Restaurant updated");
    Ok(Json(restaurant))
}

/// Deletes the restaurant with all of its visits.
///
/// DELETE /api/v1/restaurants/:restaurant_id
pub async fn delete_restaurant(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(restaurant_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let family_id = caller_family_id(&state, user_auth.user_id).await?;
    let deleted = RestaurantRepository::new(state.pool.clone())
        .delete(family_id, restaurant_id)
        .await?;

    if deleted == 0 {
        return Err(ApiError::NotFound("Restaurant not found".to_string()));
    }

    info!(restaurant_id = %restaurant_id, user_id = %user_auth.user_id, "Restaurant deleted");
    Ok(StatusCode::NO_CONTENT)
}
