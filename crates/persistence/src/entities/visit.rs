//! Visit, dish and attendee entities (database row mappings).

use chrono::{DateTime, NaiveDate, Utc};
use domain::services::VisitFacts;
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct VisitEntity {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub family_id: Uuid,
    pub date: NaiveDate,
    pub overall_rating: Option<i16>,
    pub value_for_money: Option<i16>,
    pub total_bill: Option<Decimal>,
    pub number_of_people: Option<i32>,
    pub would_recommend: Option<bool>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<VisitEntity> for domain::models::Visit {
    fn from(entity: VisitEntity) -> Self {
        Self {
            id: entity.id,
            restaurant_id: entity.restaurant_id,
            family_id: entity.family_id,
            date: entity.date,
            overall_rating: entity.overall_rating,
            value_for_money: entity.value_for_money,
            total_bill: entity.total_bill,
            number_of_people: entity.number_of_people,
            would_recommend: entity.would_recommend,
            notes: entity.notes,
            created_by: entity.created_by,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DishEntity {
    pub id: Uuid,
    pub visit_id: Uuid,
    pub name: String,
    pub rating: Option<i16>,
    pub price: Option<Decimal>,
    pub notes: Option<String>,
    pub position: i32,
}

impl From<DishEntity> for domain::models::Dish {
    fn from(entity: DishEntity) -> Self {
        Self {
            id: entity.id,
            visit_id: entity.visit_id,
            name: entity.name,
            rating: entity.rating,
            price: entity.price,
            notes: entity.notes,
            position: entity.position,
        }
    }
}

/// Attendee row joined with the user's display name.
#[derive(Debug, Clone, FromRow)]
pub struct VisitAttendeeEntity {
    pub visit_id: Uuid,
    pub user_id: Uuid,
    pub display_name: String,
}

impl From<VisitAttendeeEntity> for domain::models::VisitAttendee {
    fn from(entity: VisitAttendeeEntity) -> Self {
        Self {
            user_id: entity.user_id,
            display_name: entity.display_name,
        }
    }
}

/// The columns of a visit that feed restaurant statistics.
#[derive(Debug, Clone, FromRow)]
pub struct VisitFactsEntity {
    pub restaurant_id: Uuid,
    pub overall_rating: Option<i16>,
    pub total_bill: Option<Decimal>,
    pub date: NaiveDate,
}

impl From<VisitFactsEntity> for (Uuid, VisitFacts) {
    fn from(entity: VisitFactsEntity) -> Self {
        (
            entity.restaurant_id,
            VisitFacts {
                overall_rating: entity.overall_rating,
                total_bill: entity.total_bill,
                date: entity.date,
            },
        )
    }
}
