use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::entities::settings::UserSettings;
use crate::domain::entities::subscription::Currency;

// User row as stored; settings columns live on the same table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub locale: String,
    pub timezone: String,
    pub default_currency: Currency,
    pub reminder_days_before: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn settings(&self) -> UserSettings {
        UserSettings {
            reminder_days_before: self.reminder_days_before,
            default_currency: self.default_currency,
            locale: self.locale.clone(),
            timezone: self.timezone.clone(),
        }
    }
}
