//! Dashboard statistics derived from the event store.
//!
//! Period boundaries ("today", "this month", "this year") are calendar
//! periods in the display zone, computed as half-open UTC intervals before
//! they reach the store. That keeps a reboot at 00:30 local time on the
//! first of the month inside the new month even when UTC still says the
//! previous one.

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use chrono_tz::Tz;
use serde::Serialize;

use crate::db::{MonitoringSample, RemediationEvent, Store, StoreError};

/// Trailing window for the sample trend, matching the dashboard chart.
pub const TREND_WINDOW_HOURS: i64 = 24;
/// Upper bound on trend points returned in one response.
pub const TREND_MAX_POINTS: i64 = 50;

/// Everything the dashboard needs in one read pass.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub total_reboots: i64,
    pub reboots_today: i64,
    pub reboots_this_week: i64,
    pub reboots_this_month: i64,
    pub reboots_this_year: i64,
    pub latest_sample: Option<MonitoringSample>,
    pub latest_event: Option<RemediationEvent>,
}

/// Compute the dashboard statistics as of `now`.
///
/// "Today", "this month", and "this year" are the calendar periods containing
/// `now` in `zone`; "this week" is a rolling seven days. An empty store
/// yields zeros and `None`s, never an error.
pub fn collect(store: &Store, zone: Tz, now: DateTime<Utc>) -> Result<DashboardStats, StoreError> {
    let local_date = now.with_timezone(&zone).date_naive();
    let (today_start, today_end) = day_bounds(zone, local_date);
    let (month_start, month_end) = month_bounds(zone, local_date);
    let (year_start, year_end) = year_bounds(zone, local_date);

    Ok(DashboardStats {
        total_reboots: store.count_events()?,
        reboots_today: store.count_events_between(today_start, today_end)?,
        reboots_this_week: store.count_events_since(now - Duration::days(7))?,
        reboots_this_month: store.count_events_between(month_start, month_end)?,
        reboots_this_year: store.count_events_between(year_start, year_end)?,
        latest_sample: store.latest_sample()?,
        latest_event: store.latest_event()?,
    })
}

/// Samples within the trailing window ending at `now`, most recent first.
pub fn trend(
    store: &Store,
    now: DateTime<Utc>,
    window_hours: i64,
) -> Result<Vec<MonitoringSample>, StoreError> {
    let hours = window_hours.clamp(1, 24 * 7);
    store.samples_since(now - Duration::hours(hours), TREND_MAX_POINTS)
}

/// Recent remediation events, most recent first, clamped to `cap`.
pub fn recent_events(
    store: &Store,
    requested: i64,
    cap: i64,
) -> Result<Vec<RemediationEvent>, StoreError> {
    store.recent_events(requested.clamp(1, cap.max(1)))
}

fn day_bounds(zone: Tz, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = local_period_start(zone, date.and_time(NaiveTime::MIN));
    let end = match date.succ_opt() {
        Some(next) => local_period_start(zone, next.and_time(NaiveTime::MIN)),
        None => start,
    };
    (start, end)
}

fn month_bounds(zone: Tz, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let first = NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date);
    let next_first = if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
    .unwrap_or(first);
    (
        local_period_start(zone, first.and_time(NaiveTime::MIN)),
        local_period_start(zone, next_first.and_time(NaiveTime::MIN)),
    )
}

fn year_bounds(zone: Tz, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let first = NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date);
    let next_first = NaiveDate::from_ymd_opt(date.year() + 1, 1, 1).unwrap_or(first);
    (
        local_period_start(zone, first.and_time(NaiveTime::MIN)),
        local_period_start(zone, next_first.and_time(NaiveTime::MIN)),
    )
}

/// UTC instant where a local period boundary falls.
///
/// Midnight can land inside a DST gap in a handful of zones; the period then
/// starts when the clocks land again, found by probing in quarter-hour steps.
fn local_period_start(zone: Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earlier, _) => earlier.with_timezone(&Utc),
        LocalResult::None => {
            for minutes in (15..=180).step_by(15) {
                if let Some(dt) = zone
                    .from_local_datetime(&(naive + Duration::minutes(minutes)))
                    .earliest()
                {
                    return dt.with_timezone(&Utc);
                }
            }
            Utc.from_utc_datetime(&naive)
        }
    }
}
