//! Restaurant entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct RestaurantEntity {
    pub id: Uuid,
    pub family_id: Uuid,
    pub name: String,
    pub cuisine: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RestaurantEntity> for domain::models::Restaurant {
    fn from(entity: RestaurantEntity) -> Self {
        Self {
            id: entity.id,
            family_id: entity.family_id,
            name: entity.name,
            cuisine: entity.cuisine,
            address: entity.address,
            website: entity.website,
            notes: entity.notes,
            created_by: entity.created_by,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
