//! Subscription status engine.
//!
//! Pure functions over a subscription record, the owning user's settings
//! and an explicit `now`. Nothing here is persisted: stored `canceled` and
//! `archived` are sticky user decisions, every other stored status is
//! advisory and callers re-derive the effective status on each read.
//! Day granularity is the calendar-day difference in the user's timezone,
//! so an item due today is 0 days away.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::app_error::{AppError, AppResult};
use crate::domain::entities::settings::UserSettings;
use crate::domain::entities::subscription::{Subscription, SubscriptionStatus};

fn local_date(at: DateTime<Utc>, tz: Tz) -> NaiveDate {
    at.with_timezone(&tz).date_naive()
}

/// Calendar days between now and `target` in `tz`. Negative when overdue.
pub fn days_until(target: DateTime<Utc>, now: DateTime<Utc>, tz: Tz) -> i64 {
    local_date(target, tz)
        .signed_duration_since(local_date(now, tz))
        .num_days()
}

/// Whether `target` falls strictly before the start of the current day.
pub fn is_before_today(target: DateTime<Utc>, now: DateTime<Utc>, tz: Tz) -> bool {
    local_date(target, tz) < local_date(now, tz)
}

/// Effective status of a subscription at `now`.
///
/// Stored `archived`/`canceled` win unconditionally. Otherwise the record is
/// `expired` once `end_at` is before the start of the current day, and
/// `active` in every other case, including a stored `expired` whose `end_at`
/// moved back into the future and a record with no `end_at` at all.
pub fn resolve_status(sub: &Subscription, now: DateTime<Utc>, tz: Tz) -> SubscriptionStatus {
    if sub.status.is_sticky() {
        return sub.status;
    }
    match sub.end_at {
        Some(end) if is_before_today(end, now, tz) => SubscriptionStatus::Expired,
        _ => SubscriptionStatus::Active,
    }
}

/// Reminder-queue eligibility.
///
/// Overdue items always show, even while snoozed; otherwise an unexpired
/// snooze hides the record, and within the lead window it shows.
pub fn should_show_in_reminders(
    sub: &Subscription,
    settings: &UserSettings,
    now: DateTime<Utc>,
) -> bool {
    let tz = settings.tz();
    if resolve_status(sub, now, tz).is_sticky() {
        return false;
    }
    let Some(end) = sub.end_at else {
        return false;
    };
    if is_before_today(end, now, tz) {
        return true;
    }
    if let Some(snoozed_until) = sub.next_reminder_at {
        if snoozed_until > now {
            return false;
        }
    }
    days_until(end, now, tz) <= i64::from(settings.reminder_days_before)
}

/// Ascending sort key for the reminder queue: most urgent first, records
/// without any usable date last.
pub fn reminder_sort_key(sub: &Subscription) -> i64 {
    sub.next_reminder_at
        .or(sub.end_at)
        .map(|at| at.timestamp_millis())
        .unwrap_or(i64::MAX)
}

/// Snooze target timestamp. Not a scheduler: the queue simply re-evaluates
/// eligibility on the next read.
pub fn snooze_until(now: DateTime<Utc>, days: u32) -> AppResult<DateTime<Utc>> {
    if days == 0 {
        return Err(AppError::InvalidInput(
            "Snooze requires at least one day".into(),
        ));
    }
    Ok(now + Duration::days(i64::from(days)))
}
