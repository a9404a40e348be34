//! Visit repository and the transactional visit store.

use async_trait::async_trait;
use domain::models::{Dish, VisitAttendee, VisitDetail};
use domain::services::{StoreError, VisitStore, VisitWrite};
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

use crate::entities::{DishEntity, VisitAttendeeEntity, VisitEntity};
use crate::metrics::QueryTimer;

const VISIT_COLUMNS: &str = "id, restaurant_id, family_id, date, overall_rating, value_for_money, \
                             total_bill, number_of_people, would_recommend, notes, created_by, \
                             created_at, updated_at";

/// Classifies a database error for the visit recorder.
pub fn store_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(err.to_string())
        }
        sqlx::Error::RowNotFound => StoreError::Conflict("visit no longer exists".to_string()),
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some("23505") | Some("23503") => StoreError::Conflict(db.message().to_string()),
            _ => StoreError::Other(err.to_string()),
        },
        _ => StoreError::Other(err.to_string()),
    }
}

#[derive(Clone)]
pub struct VisitRepository {
    pool: PgPool,
}

impl VisitRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Visits of a restaurant, most recent date first.
    pub async fn list_for_restaurant(
        &self,
        restaurant_id: Uuid,
    ) -> Result<Vec<VisitEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_visits_for_restaurant");
        let result = sqlx::query_as::<_, VisitEntity>(&format!(
            r#"
            SELECT {VISIT_COLUMNS}
            FROM visits
            WHERE restaurant_id = $1
            ORDER BY date DESC, created_at DESC
            "#
        ))
        .bind(restaurant_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn find_in_restaurant(
        &self,
        restaurant_id: Uuid,
        visit_id: Uuid,
    ) -> Result<Option<VisitEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_visit_in_restaurant");
        let result = sqlx::query_as::<_, VisitEntity>(&format!(
            "SELECT {VISIT_COLUMNS} FROM visits WHERE id = $1 AND restaurant_id = $2"
        ))
        .bind(visit_id)
        .bind(restaurant_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn dishes_for_visits(&self, visit_ids: &[Uuid]) -> Result<Vec<DishEntity>, sqlx::Error> {
        let timer = QueryTimer::new("dishes_for_visits");
        let result = sqlx::query_as::<_, DishEntity>(
            r#"
            SELECT id, visit_id, name, rating, price, notes, position
            FROM dishes
            WHERE visit_id = ANY($1)
            ORDER BY visit_id, position
            "#,
        )
        .bind(visit_ids)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn attendees_for_visits(
        &self,
        visit_ids: &[Uuid],
    ) -> Result<Vec<VisitAttendeeEntity>, sqlx::Error> {
        let timer = QueryTimer::new("attendees_for_visits");
        let result = sqlx::query_as::<_, VisitAttendeeEntity>(
            r#"
            SELECT va.visit_id, va.user_id, u.display_name
            FROM visit_attendees va
            JOIN users u ON u.id = va.user_id
            WHERE va.visit_id = ANY($1)
            ORDER BY u.display_name, va.user_id
            "#,
        )
        .bind(visit_ids)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Attaches dishes and attendees to each visit, keeping the visit order.
    pub async fn load_details(
        &self,
        visits: Vec<VisitEntity>,
    ) -> Result<Vec<VisitDetail>, sqlx::Error> {
        if visits.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = visits.iter().map(|v| v.id).collect();

        let mut dishes: HashMap<Uuid, Vec<Dish>> = HashMap::new();
        for dish in self.dishes_for_visits(&ids).await? {
            dishes.entry(dish.visit_id).or_default().push(dish.into());
        }

        let mut attendees: HashMap<Uuid, Vec<VisitAttendee>> = HashMap::new();
        for attendee in self.attendees_for_visits(&ids).await? {
            attendees
                .entry(attendee.visit_id)
                .or_default()
                .push(attendee.into());
        }

        Ok(visits
            .into_iter()
            .map(|visit| {
                let id = visit.id;
                VisitDetail::new(
                    visit.into(),
                    dishes.remove(&id).unwrap_or_default(),
                    attendees.remove(&id).unwrap_or_default(),
                )
            })
            .collect())
    }

    pub async fn delete(&self, restaurant_id: Uuid, visit_id: Uuid) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("delete_visit");
        let result = sqlx::query("DELETE FROM visits WHERE id = $1 AND restaurant_id = $2")
            .bind(visit_id)
            .bind(restaurant_id)
            .execute(&self.pool)
            .await?;
        timer.record();
        Ok(result.rows_affected())
    }

    async fn write_in_transaction(&self, write: &VisitWrite) -> Result<Uuid, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let visit_id = match write.visit_id {
            None => insert_visit(&mut tx, write).await?,
            Some(visit_id) => {
                update_visit(&mut tx, visit_id, write).await?;
                sqlx::query("DELETE FROM dishes WHERE visit_id = $1")
                    .bind(visit_id)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("DELETE FROM visit_attendees WHERE visit_id = $1")
                    .bind(visit_id)
                    .execute(&mut *tx)
                    .await?;
                visit_id
            }
        };

        for (position, dish) in write.dishes.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO dishes (visit_id, name, rating, price, notes, position)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(visit_id)
            .bind(&dish.name)
            .bind(dish.rating)
            .bind(dish.price)
            .bind(&dish.notes)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        if !write.attendee_user_ids.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO visit_attendees (visit_id, user_id)
                SELECT $1, UNNEST($2::uuid[])
                "#,
            )
            .bind(visit_id)
            .bind(&write.attendee_user_ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(visit_id)
    }
}

async fn insert_visit(
    tx: &mut Transaction<'_, Postgres>,
    write: &VisitWrite,
) -> Result<Uuid, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        INSERT INTO visits (
            restaurant_id, family_id, date, overall_rating, value_for_money,
            total_bill, number_of_people, would_recommend, notes, created_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id
        "#,
    )
    .bind(write.restaurant_id)
    .bind(write.family_id)
    .bind(write.date)
    .bind(write.overall_rating)
    .bind(write.value_for_money)
    .bind(write.total_bill)
    .bind(write.number_of_people)
    .bind(write.would_recommend)
    .bind(&write.notes)
    .bind(write.actor_id)
    .fetch_one(&mut **tx)
    .await
}

/// Overwrites the visit's own fields. `created_by` is left as it was.
async fn update_visit(
    tx: &mut Transaction<'_, Postgres>,
    visit_id: Uuid,
    write: &VisitWrite,
) -> Result<(), sqlx::Error> {
    let updated: Option<Uuid> = sqlx::query_scalar(
        r#"
        UPDATE visits
        SET date = $3,
            overall_rating = $4,
            value_for_money = $5,
            total_bill = $6,
            number_of_people = $7,
            would_recommend = $8,
            notes = $9,
            updated_at = NOW()
        WHERE id = $1 AND restaurant_id = $2
        RETURNING id
        "#,
    )
    .bind(visit_id)
    .bind(write.restaurant_id)
    .bind(write.date)
    .bind(write.overall_rating)
    .bind(write.value_for_money)
    .bind(write.total_bill)
    .bind(write.number_of_people)
    .bind(write.would_recommend)
    .bind(&write.notes)
    .fetch_optional(&mut **tx)
    .await?;

    updated.map(|_| ()).ok_or(sqlx::Error::RowNotFound)
}

#[async_trait]
impl VisitStore for VisitRepository {
    async fn restaurant_family(&self, restaurant_id: Uuid) -> Result<Option<Uuid>, StoreError> {
        let timer = QueryTimer::new("restaurant_family");
        let result = sqlx::query_scalar("SELECT family_id FROM restaurants WHERE id = $1")
            .bind(restaurant_id)
            .fetch_optional(&self.pool)
            .await;
        timer.record();
        result.map_err(store_error)
    }

    async fn family_member_ids(&self, family_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let timer = QueryTimer::new("visit_family_member_ids");
        let result = sqlx::query_scalar("SELECT user_id FROM family_members WHERE family_id = $1")
            .bind(family_id)
            .fetch_all(&self.pool)
            .await;
        timer.record();
        result.map_err(store_error)
    }

    async fn visit_restaurant(&self, visit_id: Uuid) -> Result<Option<Uuid>, StoreError> {
        let timer = QueryTimer::new("visit_restaurant");
        let result = sqlx::query_scalar("SELECT restaurant_id FROM visits WHERE id = $1")
            .bind(visit_id)
            .fetch_optional(&self.pool)
            .await;
        timer.record();
        result.map_err(store_error)
    }

    /// Visit row, child deletes and child inserts commit together or not at all.
    async fn write_visit(&self, write: &VisitWrite) -> Result<Uuid, StoreError> {
        let timer = QueryTimer::new("write_visit");
        let result = self.write_in_transaction(write).await;
        timer.record();
        result.map_err(store_error)
    }

    async fn discard_visit(&self, visit_id: Uuid) -> Result<(), StoreError> {
        let timer = QueryTimer::new("discard_visit");
        let result = sqlx::query("DELETE FROM visits WHERE id = $1")
            .bind(visit_id)
            .execute(&self.pool)
            .await;
        timer.record();
        result.map(|_| ()).map_err(store_error)
    }
}
