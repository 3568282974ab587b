use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::money::{self, MonthlySpend};
use crate::application::status;
use crate::application::use_cases::{AuditRepo, user::UserRepo};
use crate::domain::entities::audit::{AuditAction, AuditEntry};
use crate::domain::entities::settings::UserSettings;
use crate::domain::entities::subscription::{Currency, Subscription, SubscriptionStatus};

const MAX_NAME_LEN: usize = 255;
const MAX_LABEL_LEN: usize = 120;
const MAX_NOTES_LEN: usize = 5000;

pub const DEFAULT_SNOOZE_DAYS: u32 = 7;

#[async_trait]
pub trait SubscriptionRepo: Send + Sync {
    /// All records of the user, optionally narrowed by a case-insensitive
    /// text match over name, vendor and category.
    async fn list_for_user(&self, user_id: Uuid, q: Option<&str>) -> AppResult<Vec<Subscription>>;
    async fn get(&self, user_id: Uuid, id: Uuid) -> AppResult<Option<Subscription>>;
    async fn insert(&self, sub: &Subscription) -> AppResult<Subscription>;
    async fn update(&self, sub: &Subscription) -> AppResult<Subscription>;
    async fn upsert(&self, sub: &Subscription) -> AppResult<Subscription>;
    async fn delete(&self, user_id: Uuid, id: Uuid) -> AppResult<bool>;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDraft {
    pub name: String,
    pub price: Decimal,
    pub currency: Currency,
    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<SubscriptionStatus>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPatch {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub currency: Option<Currency>,
    pub end_at: Option<DateTime<Utc>>,
    pub status: Option<SubscriptionStatus>,
    pub category: Option<String>,
    pub vendor: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SubscriptionFilter {
    /// Matches the *effective* status, not the stored one.
    pub status: Option<SubscriptionStatus>,
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendSummary {
    pub totals: BTreeMap<Currency, Decimal>,
    pub normalized_total_usd: Decimal,
    pub monthly: Vec<MonthlySpend>,
}

/// Import/export payload; the same shape the web client persists locally.
#[derive(Debug, Serialize, Deserialize)]
pub struct PortableData {
    pub subscriptions: Vec<Subscription>,
    pub settings: UserSettings,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    pub imported: usize,
}

#[derive(Clone)]
pub struct SubscriptionUseCases {
    repo: Arc<dyn SubscriptionRepo>,
    users: Arc<dyn UserRepo>,
    audit: Arc<dyn AuditRepo>,
}

impl SubscriptionUseCases {
    pub fn new(
        repo: Arc<dyn SubscriptionRepo>,
        users: Arc<dyn UserRepo>,
        audit: Arc<dyn AuditRepo>,
    ) -> Self {
        Self { repo, users, audit }
    }

    async fn settings_for(&self, user_id: Uuid) -> AppResult<UserSettings> {
        self.users
            .get_settings(user_id)
            .await?
            .ok_or(AppError::InvalidCredentials)
    }

    async fn get_owned(&self, user_id: Uuid, id: Uuid) -> AppResult<Subscription> {
        self.repo.get(user_id, id).await?.ok_or(AppError::NotFound)
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        filter: SubscriptionFilter,
    ) -> AppResult<Vec<Subscription>> {
        let tz = self.settings_for(user_id).await?.tz();
        let now = Utc::now();

        let mut subs = self.repo.list_for_user(user_id, filter.q.as_deref()).await?;
        for sub in &mut subs {
            sub.status = status::resolve_status(sub, now, tz);
        }
        if let Some(wanted) = filter.status {
            subs.retain(|sub| sub.status == wanted);
        }
        subs.sort_by_key(|sub| sub.end_at.map(|at| at.timestamp()).unwrap_or(i64::MAX));
        Ok(subs)
    }

    pub async fn get(&self, user_id: Uuid, id: Uuid) -> AppResult<Subscription> {
        let tz = self.settings_for(user_id).await?.tz();
        let mut sub = self.get_owned(user_id, id).await?;
        sub.status = status::resolve_status(&sub, Utc::now(), tz);
        Ok(sub)
    }

    #[instrument(skip(self, draft))]
    pub async fn create(&self, user_id: Uuid, draft: SubscriptionDraft) -> AppResult<Subscription> {
        validate_text_fields(&draft.name, &draft.category, &draft.vendor, &draft.notes)?;
        let tz = self.settings_for(user_id).await?.tz();
        let now = Utc::now();

        let sub = Subscription {
            id: Uuid::new_v4(),
            user_id,
            name: draft.name.trim().to_string(),
            price: normalize_price(draft.price)?,
            currency: draft.currency,
            end_at: draft.end_at,
            status: resolve_for_write(draft.end_at, draft.status, None, now, tz),
            category: draft.category,
            vendor: draft.vendor,
            notes: draft.notes,
            next_reminder_at: None,
            last_notified_at: None,
            created_at: now,
            updated_at: now,
        };

        let created = self.repo.insert(&sub).await?;
        self.audit
            .record(
                &AuditEntry::new(user_id, AuditAction::SubscriptionCreated)
                    .entity("subscription", created.id)
                    .meta(serde_json::json!({ "status": created.status.as_str() })),
            )
            .await?;
        Ok(created)
    }

    #[instrument(skip(self, draft))]
    pub async fn replace(
        &self,
        user_id: Uuid,
        id: Uuid,
        draft: SubscriptionDraft,
    ) -> AppResult<Subscription> {
        validate_text_fields(&draft.name, &draft.category, &draft.vendor, &draft.notes)?;
        let tz = self.settings_for(user_id).await?.tz();
        let now = Utc::now();
        let existing = self.get_owned(user_id, id).await?;

        let sub = Subscription {
            name: draft.name.trim().to_string(),
            price: normalize_price(draft.price)?,
            currency: draft.currency,
            end_at: draft.end_at,
            status: resolve_for_write(draft.end_at, draft.status, Some(existing.status), now, tz),
            category: draft.category,
            vendor: draft.vendor,
            notes: draft.notes,
            updated_at: now,
            ..existing
        };

        self.finish_update(user_id, sub).await
    }

    #[instrument(skip(self, patch))]
    pub async fn patch(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: SubscriptionPatch,
    ) -> AppResult<Subscription> {
        let tz = self.settings_for(user_id).await?.tz();
        let now = Utc::now();
        let mut sub = self.get_owned(user_id, id).await?;
        let existing_status = sub.status;

        if let Some(name) = patch.name {
            sub.name = name.trim().to_string();
        }
        if let Some(price) = patch.price {
            sub.price = normalize_price(price)?;
        }
        if let Some(currency) = patch.currency {
            sub.currency = currency;
        }
        if let Some(end_at) = patch.end_at {
            sub.end_at = Some(end_at);
        }
        if let Some(category) = patch.category {
            sub.category = Some(category);
        }
        if let Some(vendor) = patch.vendor {
            sub.vendor = Some(vendor);
        }
        if let Some(notes) = patch.notes {
            sub.notes = Some(notes);
        }
        validate_text_fields(&sub.name, &sub.category, &sub.vendor, &sub.notes)?;

        sub.status = resolve_for_write(sub.end_at, patch.status, Some(existing_status), now, tz);
        sub.updated_at = now;

        self.finish_update(user_id, sub).await
    }

    async fn finish_update(&self, user_id: Uuid, sub: Subscription) -> AppResult<Subscription> {
        let updated = self.repo.update(&sub).await?;
        self.audit
            .record(
                &AuditEntry::new(user_id, AuditAction::SubscriptionUpdated)
                    .entity("subscription", updated.id)
                    .meta(serde_json::json!({ "status": updated.status.as_str() })),
            )
            .await?;
        Ok(updated)
    }

    /// Explicit status transition: cancel, archive, or restore.
    #[instrument(skip(self))]
    pub async fn set_status(
        &self,
        user_id: Uuid,
        id: Uuid,
        wanted: SubscriptionStatus,
    ) -> AppResult<Subscription> {
        let tz = self.settings_for(user_id).await?.tz();
        let now = Utc::now();
        let mut sub = self.get_owned(user_id, id).await?;
        let previous = sub.status;

        sub.status = resolve_for_write(sub.end_at, Some(wanted), Some(previous), now, tz);
        sub.updated_at = now;

        let updated = self.repo.update(&sub).await?;
        self.audit
            .record(
                &AuditEntry::new(user_id, AuditAction::SubscriptionStatusChanged)
                    .entity("subscription", updated.id)
                    .meta(serde_json::json!({
                        "from": previous.as_str(),
                        "to": updated.status.as_str(),
                    })),
            )
            .await?;
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> AppResult<()> {
        if !self.repo.delete(user_id, id).await? {
            return Err(AppError::NotFound);
        }
        self.audit
            .record(
                &AuditEntry::new(user_id, AuditAction::SubscriptionDeleted)
                    .entity("subscription", id),
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn snooze(&self, user_id: Uuid, id: Uuid, days: u32) -> AppResult<Subscription> {
        let now = Utc::now();
        let mut sub = self.get_owned(user_id, id).await?;
        sub.next_reminder_at = Some(status::snooze_until(now, days)?);
        sub.updated_at = now;

        let updated = self.repo.update(&sub).await?;
        self.audit
            .record(
                &AuditEntry::new(user_id, AuditAction::SubscriptionSnoozed)
                    .entity("subscription", updated.id)
                    .meta(serde_json::json!({ "days": days })),
            )
            .await?;
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn clear_snooze(&self, user_id: Uuid, id: Uuid) -> AppResult<Subscription> {
        let now = Utc::now();
        let mut sub = self.get_owned(user_id, id).await?;
        sub.next_reminder_at = None;
        sub.updated_at = now;

        let updated = self.repo.update(&sub).await?;
        self.audit
            .record(
                &AuditEntry::new(user_id, AuditAction::SubscriptionSnoozed)
                    .entity("subscription", updated.id)
                    .meta(serde_json::json!({ "cleared": true })),
            )
            .await?;
        Ok(updated)
    }

    /// The reminder queue: eligible records, most urgent first.
    pub async fn reminders(&self, user_id: Uuid) -> AppResult<Vec<Subscription>> {
        let settings = self.settings_for(user_id).await?;
        let now = Utc::now();
        let tz = settings.tz();

        let mut subs = self.repo.list_for_user(user_id, None).await?;
        subs.retain(|sub| status::should_show_in_reminders(sub, &settings, now));
        subs.sort_by_key(status::reminder_sort_key);
        for sub in &mut subs {
            sub.status = status::resolve_status(sub, now, tz);
        }
        Ok(subs)
    }

    pub async fn summary(&self, user_id: Uuid) -> AppResult<SpendSummary> {
        let tz = self.settings_for(user_id).await?.tz();
        let now = Utc::now();
        let subs = self.repo.list_for_user(user_id, None).await?;

        Ok(SpendSummary {
            totals: money::totals_by_currency(&subs, now, tz),
            normalized_total_usd: money::normalized_total_usd(&subs, now, tz),
            monthly: money::monthly_spend_history(&subs, now, tz),
        })
    }

    pub async fn export(&self, user_id: Uuid) -> AppResult<PortableData> {
        let settings = self.settings_for(user_id).await?;
        let subscriptions = self.repo.list_for_user(user_id, None).await?;
        Ok(PortableData {
            subscriptions,
            settings,
        })
    }

    /// Imported records are treated exactly like freshly loaded ones: the
    /// stored status goes back through write-path resolution (sticky
    /// statuses survive, everything else is recomputed from `end_at`).
    #[instrument(skip(self, data))]
    pub async fn import(&self, user_id: Uuid, data: PortableData) -> AppResult<ImportOutcome> {
        let tz = data.settings.tz();
        let now = Utc::now();

        let mut imported = 0usize;
        for mut sub in data.subscriptions {
            validate_text_fields(&sub.name, &sub.category, &sub.vendor, &sub.notes)?;
            sub.user_id = user_id;
            sub.price = normalize_price(sub.price)?;
            sub.status = resolve_for_write(sub.end_at, Some(sub.status), None, now, tz);
            sub.updated_at = now;
            self.repo.upsert(&sub).await?;
            imported += 1;
        }

        self.users.update_settings(user_id, &data.settings).await?;
        self.audit
            .record(
                &AuditEntry::new(user_id, AuditAction::SubscriptionsImported)
                    .meta(serde_json::json!({ "count": imported })),
            )
            .await?;
        Ok(ImportOutcome { imported })
    }
}

/// Status stored on a write: an explicit (or pre-existing) sticky status is
/// kept as-is, anything else is derived from `end_at`.
fn resolve_for_write(
    end_at: Option<DateTime<Utc>>,
    provided: Option<SubscriptionStatus>,
    existing: Option<SubscriptionStatus>,
    now: DateTime<Utc>,
    tz: Tz,
) -> SubscriptionStatus {
    let stated = provided
        .or(existing)
        .unwrap_or(SubscriptionStatus::Active);
    if stated.is_sticky() {
        return stated;
    }
    match end_at {
        Some(end) if status::is_before_today(end, now, tz) => SubscriptionStatus::Expired,
        _ => SubscriptionStatus::Active,
    }
}

fn normalize_price(price: Decimal) -> AppResult<Decimal> {
    if price.is_sign_negative() {
        return Err(AppError::InvalidInput("Price must not be negative".into()));
    }
    Ok(price.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

fn validate_text_fields(
    name: &str,
    category: &Option<String>,
    vendor: &Option<String>,
    notes: &Option<String>,
) -> AppResult<()> {
    let name = name.trim();
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(AppError::InvalidInput(format!(
            "Name must be 1-{MAX_NAME_LEN} characters"
        )));
    }
    for (label, value) in [("category", category), ("vendor", vendor)] {
        if let Some(value) = value {
            if value.len() > MAX_LABEL_LEN {
                return Err(AppError::InvalidInput(format!(
                    "{label} must be at most {MAX_LABEL_LEN} characters"
                )));
            }
        }
    }
    if let Some(notes) = notes {
        if notes.len() > MAX_NOTES_LEN {
            return Err(AppError::InvalidInput(format!(
                "Notes must be at most {MAX_NOTES_LEN} characters"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    use crate::test_utils::{InMemoryAuditRepo, InMemorySubscriptionRepo, InMemoryUserRepo};

    struct Fixture {
        use_cases: SubscriptionUseCases,
        repo: Arc<InMemorySubscriptionRepo>,
        user_id: Uuid,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(InMemorySubscriptionRepo::default());
        let users = Arc::new(InMemoryUserRepo::default());
        let user_id = users.seed_user("test@example.com");
        let use_cases = SubscriptionUseCases::new(
            repo.clone(),
            users,
            Arc::new(InMemoryAuditRepo::default()),
        );
        Fixture {
            use_cases,
            repo,
            user_id,
        }
    }

    fn draft(name: &str, end_at: Option<DateTime<Utc>>) -> SubscriptionDraft {
        SubscriptionDraft {
            name: name.to_string(),
            price: dec!(9.99),
            currency: Currency::Usd,
            end_at,
            status: None,
            category: None,
            vendor: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn create_stores_expired_for_past_end_at() {
        let f = fixture();
        let past = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();

        let created = f
            .use_cases
            .create(f.user_id, draft("Old", Some(past)))
            .await
            .unwrap();
        assert_eq!(created.status, SubscriptionStatus::Expired);

        let fresh = f
            .use_cases
            .create(f.user_id, draft("New", Some(Utc::now() + Duration::days(30))))
            .await
            .unwrap();
        assert_eq!(fresh.status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn create_rejects_bad_input() {
        let f = fixture();

        assert!(f.use_cases.create(f.user_id, draft("", None)).await.is_err());

        let mut negative = draft("x", None);
        negative.price = dec!(-1);
        assert!(f.use_cases.create(f.user_id, negative).await.is_err());
    }

    #[tokio::test]
    async fn price_is_rounded_to_cents() {
        let f = fixture();
        let mut d = draft("Rounded", None);
        d.price = dec!(9.995);
        let created = f.use_cases.create(f.user_id, d).await.unwrap();
        assert_eq!(created.price, dec!(10.00));
    }

    #[tokio::test]
    async fn cancel_is_sticky_and_restore_recomputes() {
        let f = fixture();
        let future = Utc::now() + Duration::days(10);
        let created = f
            .use_cases
            .create(f.user_id, draft("Spotify", Some(future)))
            .await
            .unwrap();

        let canceled = f
            .use_cases
            .set_status(f.user_id, created.id, SubscriptionStatus::Canceled)
            .await
            .unwrap();
        assert_eq!(canceled.status, SubscriptionStatus::Canceled);

        // Restoring goes back to the computed status.
        let restored = f
            .use_cases
            .set_status(f.user_id, created.id, SubscriptionStatus::Active)
            .await
            .unwrap();
        assert_eq!(restored.status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn snooze_hides_from_reminder_queue() {
        let f = fixture();
        let soon = Utc::now() + Duration::days(3);
        let created = f
            .use_cases
            .create(f.user_id, draft("Due soon", Some(soon)))
            .await
            .unwrap();

        assert_eq!(f.use_cases.reminders(f.user_id).await.unwrap().len(), 1);

        let snoozed = f
            .use_cases
            .snooze(f.user_id, created.id, DEFAULT_SNOOZE_DAYS)
            .await
            .unwrap();
        assert!(snoozed.next_reminder_at.unwrap() > Utc::now());
        assert!(f.use_cases.reminders(f.user_id).await.unwrap().is_empty());

        f.use_cases.clear_snooze(f.user_id, created.id).await.unwrap();
        assert_eq!(f.use_cases.reminders(f.user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn snooze_of_zero_days_is_rejected() {
        let f = fixture();
        let created = f
            .use_cases
            .create(f.user_id, draft("x", Some(Utc::now() + Duration::days(2))))
            .await
            .unwrap();
        assert!(f.use_cases.snooze(f.user_id, created.id, 0).await.is_err());
    }

    #[tokio::test]
    async fn overdue_shows_despite_snooze() {
        let f = fixture();
        let yesterday = Utc::now() - Duration::days(1);
        let created = f
            .use_cases
            .create(f.user_id, draft("Overdue", Some(yesterday)))
            .await
            .unwrap();
        f.use_cases
            .snooze(f.user_id, created.id, DEFAULT_SNOOZE_DAYS)
            .await
            .unwrap();

        let queue = f.use_cases.reminders(f.user_id).await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].status, SubscriptionStatus::Expired);
    }

    #[tokio::test]
    async fn list_filters_on_effective_status() {
        let f = fixture();
        f.use_cases
            .create(f.user_id, draft("Lapsed", Some(Utc::now() - Duration::days(30))))
            .await
            .unwrap();
        f.use_cases
            .create(f.user_id, draft("Live", Some(Utc::now() + Duration::days(30))))
            .await
            .unwrap();

        let expired = f
            .use_cases
            .list(
                f.user_id,
                SubscriptionFilter {
                    status: Some(SubscriptionStatus::Expired),
                    q: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].name, "Lapsed");
    }

    #[tokio::test]
    async fn foreign_records_are_not_found() {
        let f = fixture();
        let created = f
            .use_cases
            .create(f.user_id, draft("Mine", None))
            .await
            .unwrap();

        let stranger = Uuid::new_v4();
        assert!(matches!(
            f.use_cases.get(stranger, created.id).await,
            Err(AppError::InvalidCredentials) | Err(AppError::NotFound)
        ));
    }

    #[tokio::test]
    async fn import_recomputes_status_but_keeps_sticky() {
        let f = fixture();
        let now = Utc::now();

        let mut stale = f
            .use_cases
            .create(f.user_id, draft("Stale", Some(now + Duration::days(30))))
            .await
            .unwrap();
        // Tamper: stored says expired although the date is in the future.
        stale.status = SubscriptionStatus::Expired;

        let mut archived = f
            .use_cases
            .create(f.user_id, draft("Kept", Some(now - Duration::days(30))))
            .await
            .unwrap();
        archived.status = SubscriptionStatus::Archived;

        let outcome = f
            .use_cases
            .import(
                f.user_id,
                PortableData {
                    subscriptions: vec![stale.clone(), archived.clone()],
                    settings: UserSettings::default(),
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.imported, 2);

        let reloaded = f.repo.get(f.user_id, stale.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, SubscriptionStatus::Active);

        let reloaded = f.repo.get(f.user_id, archived.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, SubscriptionStatus::Archived);
    }

    #[tokio::test]
    async fn export_roundtrips_through_import() {
        let f = fixture();
        f.use_cases
            .create(f.user_id, draft("One", Some(Utc::now() + Duration::days(5))))
            .await
            .unwrap();

        let exported = f.use_cases.export(f.user_id).await.unwrap();
        assert_eq!(exported.subscriptions.len(), 1);

        let outcome = f.use_cases.import(f.user_id, exported).await.unwrap();
        assert_eq!(outcome.imported, 1);
        // Upsert by id: still exactly one record.
        assert_eq!(
            f.use_cases
                .list(f.user_id, SubscriptionFilter::default())
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn summary_excludes_sticky_records() {
        let f = fixture();
        let future = Some(Utc::now() + Duration::days(30));

        f.use_cases
            .create(f.user_id, draft("Counted", future))
            .await
            .unwrap();
        let archived = f
            .use_cases
            .create(f.user_id, draft("Ignored", future))
            .await
            .unwrap();
        f.use_cases
            .set_status(f.user_id, archived.id, SubscriptionStatus::Archived)
            .await
            .unwrap();

        let summary = f.use_cases.summary(f.user_id).await.unwrap();
        assert_eq!(summary.totals.get(&Currency::Usd), Some(&dec!(9.99)));
        assert_eq!(summary.normalized_total_usd, dec!(9.99));
        assert_eq!(summary.monthly.len(), 12);
    }
}
