use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::domain::entities::subscription::Currency;

/// Per-user preferences that drive reminder computation and display.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub reminder_days_before: i32,
    pub default_currency: Currency,
    pub locale: String,
    pub timezone: String,
}

impl UserSettings {
    /// Parsed IANA timezone; unknown names fall back to UTC rather than
    /// failing a read path.
    pub fn tz(&self) -> Tz {
        self.timezone.parse().unwrap_or(chrono_tz::UTC)
    }
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            reminder_days_before: 7,
            default_currency: Currency::Usd,
            locale: "en".to_string(),
            timezone: "UTC".to_string(),
        }
    }
}
