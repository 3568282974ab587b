use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::AppResult,
    domain::entities::{
        notification::{Notification, NotificationChannel, NotificationStatus},
        settings::UserSettings,
        subscription::Subscription,
    },
    use_cases::reminders::{ReminderCandidate, ReminderRepo},
};

#[derive(sqlx::FromRow)]
struct CandidateRow {
    #[sqlx(flatten)]
    subscription: Subscription,
    #[sqlx(flatten)]
    settings: UserSettings,
    telegram_chat_id: i64,
}

#[async_trait]
impl ReminderRepo for PostgresPersistence {
    async fn list_candidates(&self) -> AppResult<Vec<ReminderCandidate>> {
        // Sticky statuses can never become eligible, so they are filtered
        // here; everything else is re-evaluated by the engine.
        let rows = sqlx::query_as::<_, CandidateRow>(
            r#"SELECT s.id, s.user_id, s.name, s.price, s.currency, s.end_at, s.status,
                      s.category, s.vendor, s.notes, s.next_reminder_at, s.last_notified_at,
                      s.created_at, s.updated_at,
                      u.reminder_days_before, u.default_currency, u.locale, u.timezone,
                      t.telegram_chat_id
               FROM subscriptions s
               JOIN users u ON u.id = s.user_id
               JOIN telegram_accounts t ON t.user_id = u.id AND t.is_active
               WHERE s.status IN ('active', 'expired')
               ORDER BY s.end_at ASC NULLS LAST"#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ReminderCandidate {
                subscription: row.subscription,
                settings: row.settings,
                chat_id: row.telegram_chat_id,
            })
            .collect())
    }

    async fn record_notification(&self, notification: &Notification) -> AppResult<()> {
        sqlx::query(
            r#"INSERT INTO notifications (id, subscription_id, channel, status, sent_at, error, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(notification.id)
        .bind(notification.subscription_id)
        .bind(notification.channel)
        .bind(notification.status)
        .bind(notification.sent_at)
        .bind(&notification.error)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn last_sent_at(
        &self,
        subscription_id: Uuid,
        channel: NotificationChannel,
    ) -> AppResult<Option<DateTime<Utc>>> {
        let rec = sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"SELECT sent_at FROM notifications
               WHERE subscription_id = $1
                 AND channel = $2
                 AND status = $3
                 AND sent_at IS NOT NULL
               ORDER BY sent_at DESC
               LIMIT 1"#,
        )
        .bind(subscription_id)
        .bind(channel)
        .bind(NotificationStatus::Sent)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rec)
    }

    async fn mark_notified(&self, subscription_id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        sqlx::query("UPDATE subscriptions SET last_notified_at = $2 WHERE id = $1")
            .bind(subscription_id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
