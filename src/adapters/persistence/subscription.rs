use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    domain::entities::subscription::Subscription,
    use_cases::subscriptions::SubscriptionRepo,
};

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, name, price, currency, end_at, status, \
     category, vendor, notes, next_reminder_at, last_notified_at, created_at, updated_at";

#[async_trait]
impl SubscriptionRepo for PostgresPersistence {
    async fn list_for_user(&self, user_id: Uuid, q: Option<&str>) -> AppResult<Vec<Subscription>> {
        let pattern = q.map(|q| format!("%{}%", q.trim()));
        let recs = sqlx::query_as::<_, Subscription>(&format!(
            r#"SELECT {SUBSCRIPTION_COLUMNS}
               FROM subscriptions
               WHERE user_id = $1
                 AND ($2::text IS NULL
                      OR name ILIKE $2
                      OR vendor ILIKE $2
                      OR category ILIKE $2)
               ORDER BY end_at ASC NULLS LAST"#,
        ))
        .bind(user_id)
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        Ok(recs)
    }

    async fn get(&self, user_id: Uuid, id: Uuid) -> AppResult<Option<Subscription>> {
        let rec = sqlx::query_as::<_, Subscription>(&format!(
            r#"SELECT {SUBSCRIPTION_COLUMNS}
               FROM subscriptions
               WHERE id = $1 AND user_id = $2"#,
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(rec)
    }

    async fn insert(&self, sub: &Subscription) -> AppResult<Subscription> {
        let rec = sqlx::query_as::<_, Subscription>(&format!(
            r#"INSERT INTO subscriptions
                   (id, user_id, name, price, currency, end_at, status,
                    category, vendor, notes, next_reminder_at, last_notified_at,
                    created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
               RETURNING {SUBSCRIPTION_COLUMNS}"#,
        ))
        .bind(sub.id)
        .bind(sub.user_id)
        .bind(&sub.name)
        .bind(sub.price)
        .bind(sub.currency)
        .bind(sub.end_at)
        .bind(sub.status)
        .bind(&sub.category)
        .bind(&sub.vendor)
        .bind(&sub.notes)
        .bind(sub.next_reminder_at)
        .bind(sub.last_notified_at)
        .bind(sub.created_at)
        .bind(sub.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(rec)
    }

    async fn update(&self, sub: &Subscription) -> AppResult<Subscription> {
        let rec = sqlx::query_as::<_, Subscription>(&format!(
            r#"UPDATE subscriptions
               SET name = $3,
                   price = $4,
                   currency = $5,
                   end_at = $6,
                   status = $7,
                   category = $8,
                   vendor = $9,
                   notes = $10,
                   next_reminder_at = $11,
                   last_notified_at = $12,
                   updated_at = $13
               WHERE id = $1 AND user_id = $2
               RETURNING {SUBSCRIPTION_COLUMNS}"#,
        ))
        .bind(sub.id)
        .bind(sub.user_id)
        .bind(&sub.name)
        .bind(sub.price)
        .bind(sub.currency)
        .bind(sub.end_at)
        .bind(sub.status)
        .bind(&sub.category)
        .bind(&sub.vendor)
        .bind(&sub.notes)
        .bind(sub.next_reminder_at)
        .bind(sub.last_notified_at)
        .bind(sub.updated_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound)?;

        Ok(rec)
    }

    async fn upsert(&self, sub: &Subscription) -> AppResult<Subscription> {
        // The ownership guard on the conflict arm keeps an import from
        // overwriting another user's row that happens to share an id.
        let rec = sqlx::query_as::<_, Subscription>(&format!(
            r#"INSERT INTO subscriptions
                   (id, user_id, name, price, currency, end_at, status,
                    category, vendor, notes, next_reminder_at, last_notified_at,
                    created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
               ON CONFLICT (id) DO UPDATE
               SET name = EXCLUDED.name,
                   price = EXCLUDED.price,
                   currency = EXCLUDED.currency,
                   end_at = EXCLUDED.end_at,
                   status = EXCLUDED.status,
                   category = EXCLUDED.category,
                   vendor = EXCLUDED.vendor,
                   notes = EXCLUDED.notes,
                   next_reminder_at = EXCLUDED.next_reminder_at,
                   updated_at = EXCLUDED.updated_at
               WHERE subscriptions.user_id = EXCLUDED.user_id
               RETURNING {SUBSCRIPTION_COLUMNS}"#,
        ))
        .bind(sub.id)
        .bind(sub.user_id)
        .bind(&sub.name)
        .bind(sub.price)
        .bind(sub.currency)
        .bind(sub.end_at)
        .bind(sub.status)
        .bind(&sub.category)
        .bind(&sub.vendor)
        .bind(&sub.notes)
        .bind(sub.next_reminder_at)
        .bind(sub.last_notified_at)
        .bind(sub.created_at)
        .bind(sub.updated_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::InvalidInput("Conflicting subscription id".into()))?;

        Ok(rec)
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(r#"DELETE FROM subscriptions WHERE id = $1 AND user_id = $2"#)
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
