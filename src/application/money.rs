//! Spend aggregates over a user's subscription list.
//!
//! The FX table is a deliberately static budgeting aid, not a live-rate
//! integration. All sums skip subscriptions whose effective status is
//! archived or canceled.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::application::status::resolve_status;
use crate::domain::entities::subscription::{Currency, Subscription};

/// Approximate USD value of one unit of `currency`.
pub fn fx_rate_usd(currency: Currency) -> Decimal {
    match currency {
        Currency::Usd => dec!(1),
        Currency::Eur => dec!(1.08),
        Currency::Gbp => dec!(1.27),
        Currency::Rub => dec!(0.011),
        Currency::Uah => dec!(0.026),
        Currency::Kzt => dec!(0.0022),
        Currency::Byn => dec!(0.3),
    }
}

pub fn to_usd(price: Decimal, currency: Currency) -> Decimal {
    price * fx_rate_usd(currency)
}

fn counts_toward_spend(sub: &Subscription, now: DateTime<Utc>, tz: Tz) -> bool {
    !resolve_status(sub, now, tz).is_sticky()
}

/// Sum of `price` per currency over non-archived, non-canceled records.
pub fn totals_by_currency(
    subs: &[Subscription],
    now: DateTime<Utc>,
    tz: Tz,
) -> BTreeMap<Currency, Decimal> {
    let mut totals = BTreeMap::new();
    for sub in subs {
        if !counts_toward_spend(sub, now, tz) {
            continue;
        }
        *totals.entry(sub.currency).or_insert(Decimal::ZERO) += sub.price;
    }
    totals
}

/// Rough total monthly spend converted to USD through the fixed table.
pub fn normalized_total_usd(subs: &[Subscription], now: DateTime<Utc>, tz: Tz) -> Decimal {
    subs.iter()
        .filter(|sub| counts_toward_spend(sub, now, tz))
        .map(|sub| to_usd(sub.price, sub.currency))
        .sum::<Decimal>()
        .round_dp(2)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySpend {
    /// First day of the bucketed month in the user's timezone.
    pub month: NaiveDate,
    pub total_usd: Decimal,
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn shift_months(start: NaiveDate, offset: i32) -> NaiveDate {
    let months = start.year() * 12 + start.month0() as i32 + offset;
    NaiveDate::from_ymd_opt(months.div_euclid(12), months.rem_euclid(12) as u32 + 1, 1)
        .unwrap_or(start)
}

/// Normalized spend per month over the trailing 12 calendar months.
///
/// A subscription contributes to a month when its `[created_at, end_at]`
/// interval overlaps it (local dates). This is a single stored period, not a
/// recurring-charge simulation; records without `end_at` are skipped.
pub fn monthly_spend_history(
    subs: &[Subscription],
    now: DateTime<Utc>,
    tz: Tz,
) -> Vec<MonthlySpend> {
    let current = month_start(now.with_timezone(&tz).date_naive());

    (0..12)
        .map(|i| {
            let start = shift_months(current, i - 11);
            let next = shift_months(start, 1);
            let total = subs
                .iter()
                .filter(|sub| counts_toward_spend(sub, now, tz))
                .filter_map(|sub| {
                    let end = sub.end_at?.with_timezone(&tz).date_naive();
                    let created = sub.created_at.with_timezone(&tz).date_naive();
                    (created < next && end >= start).then(|| to_usd(sub.price, sub.currency))
                })
                .sum::<Decimal>()
                .round_dp(2);
            MonthlySpend {
                month: start,
                total_usd: total,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use crate::domain::entities::subscription::SubscriptionStatus;

    fn noon_utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn now() -> DateTime<Utc> {
        noon_utc(2026, 6, 15)
    }

    fn sub(
        price: Decimal,
        currency: Currency,
        status: SubscriptionStatus,
        created_at: DateTime<Utc>,
        end_at: Option<DateTime<Utc>>,
    ) -> Subscription {
        Subscription {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "svc".to_string(),
            price,
            currency,
            end_at,
            status,
            category: None,
            vendor: None,
            notes: None,
            next_reminder_at: None,
            last_notified_at: None,
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn totals_group_by_currency_and_skip_sticky() {
        let future = Some(noon_utc(2030, 1, 1));
        let subs = vec![
            sub(dec!(10), Currency::Usd, SubscriptionStatus::Active, now(), future),
            sub(dec!(5.50), Currency::Usd, SubscriptionStatus::Active, now(), future),
            sub(dec!(8), Currency::Eur, SubscriptionStatus::Active, now(), future),
            sub(dec!(99), Currency::Usd, SubscriptionStatus::Archived, now(), future),
            sub(dec!(42), Currency::Gbp, SubscriptionStatus::Canceled, now(), future),
        ];

        let totals = totals_by_currency(&subs, now(), chrono_tz::UTC);
        assert_eq!(totals.get(&Currency::Usd), Some(&dec!(15.50)));
        assert_eq!(totals.get(&Currency::Eur), Some(&dec!(8)));
        assert_eq!(totals.get(&Currency::Gbp), None);
    }

    #[test]
    fn totals_are_order_independent() {
        let future = Some(noon_utc(2030, 1, 1));
        let mut subs = vec![
            sub(dec!(1.10), Currency::Usd, SubscriptionStatus::Active, now(), future),
            sub(dec!(2.20), Currency::Eur, SubscriptionStatus::Active, now(), future),
            sub(dec!(3.30), Currency::Usd, SubscriptionStatus::Active, now(), future),
        ];

        let forward = totals_by_currency(&subs, now(), chrono_tz::UTC);
        let forward_usd = normalized_total_usd(&subs, now(), chrono_tz::UTC);
        subs.reverse();
        assert_eq!(totals_by_currency(&subs, now(), chrono_tz::UTC), forward);
        assert_eq!(normalized_total_usd(&subs, now(), chrono_tz::UTC), forward_usd);
    }

    #[test]
    fn normalized_total_uses_fixed_rates() {
        let future = Some(noon_utc(2030, 1, 1));
        let subs = vec![
            sub(dec!(10), Currency::Usd, SubscriptionStatus::Active, now(), future),
            sub(dec!(10), Currency::Eur, SubscriptionStatus::Active, now(), future),
            sub(dec!(100), Currency::Rub, SubscriptionStatus::Expired, now(), future),
        ];

        // 10 + 10 * 1.08 + 100 * 0.011; a stored (non-sticky) expired still counts.
        assert_eq!(
            normalized_total_usd(&subs, now(), chrono_tz::UTC),
            dec!(21.90)
        );
    }

    #[test]
    fn history_covers_trailing_twelve_months() {
        let history = monthly_spend_history(&[], now(), chrono_tz::UTC);
        assert_eq!(history.len(), 12);
        assert_eq!(
            history.first().map(|m| m.month),
            NaiveDate::from_ymd_opt(2025, 7, 1)
        );
        assert_eq!(
            history.last().map(|m| m.month),
            NaiveDate::from_ymd_opt(2026, 6, 1)
        );
        assert!(history.iter().all(|m| m.total_usd == Decimal::ZERO));
    }

    #[test]
    fn history_buckets_by_interval_overlap() {
        // Lives Jan 15 .. Mar 10: overlaps January, February and March only.
        let subs = vec![sub(
            dec!(12),
            Currency::Usd,
            SubscriptionStatus::Active,
            noon_utc(2026, 1, 15),
            Some(noon_utc(2026, 3, 10)),
        )];

        let history = monthly_spend_history(&subs, now(), chrono_tz::UTC);
        let by_month: BTreeMap<NaiveDate, Decimal> =
            history.into_iter().map(|m| (m.month, m.total_usd)).collect();

        let jan = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let feb = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let mar = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let dec_ = NaiveDate::from_ymd_opt(2025, 12, 1).unwrap();
        let apr = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();

        assert_eq!(by_month[&jan], dec!(12));
        assert_eq!(by_month[&feb], dec!(12));
        assert_eq!(by_month[&mar], dec!(12));
        assert_eq!(by_month[&dec_], Decimal::ZERO);
        assert_eq!(by_month[&apr], Decimal::ZERO);
    }

    #[test]
    fn history_skips_sticky_and_dateless_records() {
        let subs = vec![
            sub(
                dec!(50),
                Currency::Usd,
                SubscriptionStatus::Archived,
                noon_utc(2026, 1, 1),
                Some(noon_utc(2026, 12, 31)),
            ),
            sub(
                dec!(30),
                Currency::Usd,
                SubscriptionStatus::Active,
                noon_utc(2026, 1, 1),
                None,
            ),
        ];

        let history = monthly_spend_history(&subs, now(), chrono_tz::UTC);
        assert!(history.iter().all(|m| m.total_usd == Decimal::ZERO));
    }
}
