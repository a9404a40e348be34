//! Visit recorder: writes a visit together with its dishes and attendees.
//!
//! The recorder owns the checks that must pass before anything is written
//! (authentication, field validation, family membership) and hands a fully
//! resolved [`VisitWrite`] to a [`VisitStore`]. A store backed by a real
//! transaction writes all three parts or none. A store that cannot do that
//! reports [`StoreError::Incomplete`], and the recorder either removes the
//! orphaned visit or reports [`RecordVisitError::IncompleteRecord`].

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::models::restaurant::clean_optional;
use crate::models::visit::DishInput;
use crate::models::RecordVisitRequest;

/// Upper bounds on the children of one visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisitLimits {
    pub max_dishes: usize,
    pub max_attendees: usize,
}

impl Default for VisitLimits {
    fn default() -> Self {
        Self {
            max_dishes: 50,
            max_attendees: 30,
        }
    }
}

/// A dish ready to be stored, in submission order.
#[derive(Debug, Clone, PartialEq)]
pub struct DishWrite {
    pub name: String,
    pub rating: Option<i16>,
    pub price: Option<Decimal>,
    pub notes: Option<String>,
}

impl From<DishInput> for DishWrite {
    fn from(input: DishInput) -> Self {
        Self {
            name: input.name.trim().to_string(),
            rating: input.rating,
            price: input.price,
            notes: clean_optional(input.notes),
        }
    }
}

/// Everything the store needs to persist one visit.
#[derive(Debug, Clone, PartialEq)]
pub struct VisitWrite {
    /// Set when editing; the visit row is updated and its children replaced.
    pub visit_id: Option<Uuid>,
    pub restaurant_id: Uuid,
    pub family_id: Uuid,
    pub actor_id: Uuid,
    pub date: NaiveDate,
    pub overall_rating: Option<i16>,
    pub value_for_money: Option<i16>,
    pub total_bill: Option<Decimal>,
    pub number_of_people: Option<i32>,
    pub would_recommend: Option<bool>,
    pub notes: Option<String>,
    pub dishes: Vec<DishWrite>,
    /// Distinct family members, in submission order.
    pub attendee_user_ids: Vec<Uuid>,
}

/// Outcome of a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedVisit {
    pub visit_id: Uuid,
    pub created: bool,
    pub dish_count: usize,
    pub attendee_count: usize,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Conflicting write: {0}")]
    Conflict(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// The visit row exists but some of its children were not written.
    #[error("Visit {visit_id} was stored without all of its details: {reason}")]
    Incomplete { visit_id: Uuid, reason: String },

    #[error("Storage error: {0}")]
    Other(String),
}

/// Storage used by the recorder.
#[async_trait]
pub trait VisitStore: Send + Sync {
    /// Family that owns the restaurant, or `None` if it does not exist.
    async fn restaurant_family(&self, restaurant_id: Uuid) -> Result<Option<Uuid>, StoreError>;

    async fn family_member_ids(&self, family_id: Uuid) -> Result<Vec<Uuid>, StoreError>;

    /// Restaurant the visit belongs to, or `None` if it does not exist.
    async fn visit_restaurant(&self, visit_id: Uuid) -> Result<Option<Uuid>, StoreError>;

    /// Writes the visit row and replaces its dishes and attendees.
    /// Returns the visit id.
    async fn write_visit(&self, write: &VisitWrite) -> Result<Uuid, StoreError>;

    /// Deletes a visit and everything attached to it.
    async fn discard_visit(&self, visit_id: Uuid) -> Result<(), StoreError>;
}

#[derive(Debug, Error)]
pub enum RecordVisitError {
    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Restaurant not found")]
    RestaurantNotFound,

    /// The actor is not in the family that owns the restaurant.
    #[error("Restaurant not found")]
    NotFamilyMember,

    #[error("User {0} is not a member of this family")]
    AttendeeNotMember(Uuid),

    #[error("Visit not found")]
    VisitNotFound,

    /// A partial write was rolled back; nothing was recorded.
    #[error("The visit could not be saved and nothing was recorded")]
    NotRecorded,

    /// The visit is stored but some dishes or attendees are missing.
    #[error("Visit {visit_id} was recorded with missing details")]
    IncompleteRecord { visit_id: Uuid },

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for RecordVisitError {
    fn from(err: StoreError) -> Self {
        RecordVisitError::Store(err)
    }
}

pub struct VisitRecorder<S: ?Sized> {
    store: Arc<S>,
    limits: VisitLimits,
}

impl<S: VisitStore + ?Sized> VisitRecorder<S> {
    pub fn new(store: Arc<S>, limits: VisitLimits) -> Self {
        Self { store, limits }
    }

    /// Records a new visit, or replaces `existing_visit_id` in full.
    ///
    /// Nothing is written unless every check passes.
    pub async fn record(
        &self,
        actor: Option<Uuid>,
        restaurant_id: Uuid,
        existing_visit_id: Option<Uuid>,
        request: RecordVisitRequest,
    ) -> Result<RecordedVisit, RecordVisitError> {
        let actor_id = actor.ok_or(RecordVisitError::AuthenticationRequired)?;

        request.validate()?;
        let attendees = self.check_limits(&request)?;

        let family_id = self
            .store
            .restaurant_family(restaurant_id)
            .await?
            .ok_or(RecordVisitError::RestaurantNotFound)?;

        let members = self.store.family_member_ids(family_id).await?;
        if !members.contains(&actor_id) {
            return Err(RecordVisitError::NotFamilyMember);
        }

        if let Some(stranger) = attendees.iter().find(|id| !members.contains(id)) {
            return Err(RecordVisitError::AttendeeNotMember(*stranger));
        }

        if let Some(visit_id) = existing_visit_id {
            match self.store.visit_restaurant(visit_id).await? {
                Some(owner) if owner == restaurant_id => {}
                _ => return Err(RecordVisitError::VisitNotFound),
            }
        }

        let write = VisitWrite {
            visit_id: existing_visit_id,
            restaurant_id,
            family_id,
            actor_id,
            date: request.date,
            overall_rating: request.overall_rating,
            value_for_money: request.value_for_money,
            total_bill: request.total_bill,
            number_of_people: request.number_of_people,
            would_recommend: request.would_recommend,
            notes: clean_optional(request.notes),
            dishes: request.dishes.into_iter().map(DishWrite::from).collect(),
            attendee_user_ids: attendees,
        };

        match self.store.write_visit(&write).await {
            Ok(visit_id) => {
                info!(
                    visit_id = %visit_id,
                    restaurant_id = %restaurant_id,
                    user_id = %actor_id,
                    dishes = write.dishes.len(),
                    attendees = write.attendee_user_ids.len(),
                    edit = existing_visit_id.is_some(),
                    "Visit recorded"
                );
                Ok(RecordedVisit {
                    visit_id,
                    created: existing_visit_id.is_none(),
                    dish_count: write.dishes.len(),
                    attendee_count: write.attendee_user_ids.len(),
                })
            }
            Err(StoreError::Incomplete { visit_id, reason }) => {
                Err(self.recover_partial_write(visit_id, existing_visit_id, &reason).await)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn recover_partial_write(
        &self,
        visit_id: Uuid,
        existing_visit_id: Option<Uuid>,
        reason: &str,
    ) -> RecordVisitError {
        warn!(visit_id = %visit_id, reason = %reason, "Partial visit write");

        // An edited visit existed before this request; deleting it would lose data.
        if existing_visit_id.is_some() {
            return RecordVisitError::IncompleteRecord { visit_id };
        }

        match self.store.discard_visit(visit_id).await {
            Ok(()) => {
                info!(visit_id = %visit_id, "Partially written visit removed");
                RecordVisitError::NotRecorded
            }
            Err(err) => {
                warn!(visit_id = %visit_id, error = %err, "Failed to remove partially written visit");
                RecordVisitError::IncompleteRecord { visit_id }
            }
        }
    }

    /// Enforces the child limits and returns the distinct attendees.
    fn check_limits(&self, request: &RecordVisitRequest) -> Result<Vec<Uuid>, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if request.dishes.len() > self.limits.max_dishes {
            errors.add("dishes", limit_error("too_many_dishes", "dishes", self.limits.max_dishes));
        }

        let attendees = distinct(&request.attendee_user_ids, self.limits.max_attendees);
        if attendees.is_none() {
            errors.add(
                "attendee_user_ids",
                limit_error("too_many_attendees", "attendees", self.limits.max_attendees),
            );
        }

        match attendees {
            Some(attendees) if errors.is_empty() => Ok(attendees),
            _ => Err(errors),
        }
    }
}

fn limit_error(code: &'static str, what: &str, max: usize) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(format!("A visit can have at most {} {}", max, what).into());
    err
}

/// Distinct ids in first-seen order, or `None` once more than `max` are found.
fn distinct(ids: &[Uuid], max: usize) -> Option<Vec<Uuid>> {
    let mut seen = HashSet::new();
    let mut ordered = Vec::new();
    for id in ids {
        if seen.insert(*id) {
            if ordered.len() == max {
                return None;
            }
            ordered.push(*id);
        }
    }
    Some(ordered)
}
