//! Restaurant repository.

use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{RestaurantEntity, VisitFactsEntity};
use crate::metrics::QueryTimer;

/// Fields of a new restaurant, already trimmed.
#[derive(Debug, Clone)]
pub struct RestaurantInput<'a> {
    pub name: &'a str,
    pub cuisine: Option<&'a str>,
    pub address: Option<&'a str>,
    pub website: Option<&'a str>,
    pub notes: Option<&'a str>,
}

/// Partial update. `None` keeps a field; `Some("")` clears an optional one.
#[derive(Debug, Clone, Default)]
pub struct RestaurantPatch<'a> {
    pub name: Option<&'a str>,
    pub cuisine: Option<&'a str>,
    pub address: Option<&'a str>,
    pub website: Option<&'a str>,
    pub notes: Option<&'a str>,
}

#[derive(Clone)]
pub struct RestaurantRepository {
    pool: PgPool,
}

impl RestaurantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        family_id: Uuid,
        created_by: Uuid,
        input: &RestaurantInput<'_>,
    ) -> Result<RestaurantEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_restaurant");
        let result = sqlx::query_as::<_, RestaurantEntity>(
            r#"
            INSERT INTO restaurants (family_id, name, cuisine, address, website, notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, family_id, name, cuisine, address, website, notes, created_by, created_at, updated_at
            "#,
        )
        .bind(family_id)
        .bind(input.name)
        .bind(input.cuisine)
        .bind(input.address)
        .bind(input.website)
        .bind(input.notes)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Finds a restaurant inside one family; other families' rows are invisible.
    pub async fn find_in_family(
        &self,
        family_id: Uuid,
        restaurant_id: Uuid,
    ) -> Result<Option<RestaurantEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_restaurant_in_family");
        let result = sqlx::query_as::<_, RestaurantEntity>(
            r#"
            SELECT id, family_id, name, cuisine, address, website, notes, created_by, created_at, updated_at
            FROM restaurants
            WHERE id = $1 AND family_id = $2
            "#,
        )
        .bind(restaurant_id)
        .bind(family_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// All restaurants of a family, newest first.
    pub async fn list_for_family(
        &self,
        family_id: Uuid,
    ) -> Result<Vec<RestaurantEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_restaurants_for_family");
        let result = sqlx::query_as::<_, RestaurantEntity>(
            r#"
            SELECT id, family_id, name, cuisine, address, website, notes, created_by, created_at, updated_at
            FROM restaurants
            WHERE family_id = $1
            ORDER BY created_at DESC, id
            "#,
        )
        .bind(family_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Rating, bill and date of every visit in the family, for statistics.
    pub async fn visit_facts_for_family(
        &self,
        family_id: Uuid,
    ) -> Result<Vec<VisitFactsEntity>, sqlx::Error> {
        let timer = QueryTimer::new("visit_facts_for_family");
        let result = sqlx::query_as::<_, VisitFactsEntity>(
            r#"
            SELECT restaurant_id, overall_rating, total_bill, date
            FROM visits
            WHERE family_id = $1
            "#,
        )
        .bind(family_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn update(
        &self,
        family_id: Uuid,
        restaurant_id: Uuid,
        patch: &RestaurantPatch<'_>,
    ) -> Result<Option<RestaurantEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_restaurant");
        let result = sqlx::query_as::<_, RestaurantEntity>(
            r#"
            UPDATE restaurants
            SET name = COALESCE($3, name),
                cuisine = CASE WHEN $4::text IS NULL THEN cuisine ELSE NULLIF($4, '') END,
                address = CASE WHEN $5::text IS NULL THEN address ELSE NULLIF($5, '') END,
                website = CASE WHEN $6::text IS NULL THEN website ELSE NULLIF($6, '') END,
                notes = CASE WHEN $7::text IS NULL THEN notes ELSE NULLIF($7, '') END,
                updated_at = NOW()
            WHERE id = $1 AND family_id = $2
            RETURNING id, family_id, name, cuisine, address, website, notes, created_by, created_at, updated_at
            "#,
        )
        .bind(restaurant_id)
        .bind(family_id)
        .bind(patch.name)
        .bind(patch.cuisine)
        .bind(patch.address)
        .bind(patch.website)
        .bind(patch.notes)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Deletes a restaurant; its visits, dishes and attendees cascade.
    pub async fn delete(&self, family_id: Uuid, restaurant_id: Uuid) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("delete_restaurant");
        let result = sqlx::query("DELETE FROM restaurants WHERE id = $1 AND family_id = $2")
            .bind(restaurant_id)
            .bind(family_id)
            .execute(&self.pool)
            .await?;
        timer.record();
        Ok(result.rows_affected())
    }
}
