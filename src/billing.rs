//! Billing period resolution
//!
//! Turns a per-account billing-cycle configuration and a reference date into
//! concrete period boundaries, and derives the month labels the dashboard
//! shows for each period.
//!
//! EVN names a custom cycle after the month in which it closes: a cycle
//! running 10 June → 9 July is the "July" period. Calendar cycles are named
//! after the month they cover.

use crate::error::{EvnError, Result};
use crate::readings::{DailyReading, MonthLabel, MonthlyBilledRecord, day_format};
use chrono::{DateTime, Datelike, Months, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Smallest configurable cycle start day
pub const MIN_START_DAY: u32 = 1;

/// Largest configurable cycle start day; later days do not exist in every month
pub const MAX_START_DAY: u32 = 28;

/// Default number of months walked back by [`enumerate_recent_periods`]
pub const DEFAULT_MAX_PERIODS: usize = 24;

/// Caption shown for the live period of a day-1 custom cycle
pub const CURRENT_PERIOD_CAPTION: &str = "Kỳ này";

/// How the account's billing cycle was configured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CycleKind {
    /// Calendar month, first to last day
    #[default]
    #[serde(rename = "calendar")]
    Calendar,

    /// Cycle starting on a configured day of the month
    #[serde(rename = "cycle", alias = "custom")]
    Custom,
}

/// Resolved cycle semantics used for every dispatch in this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleMode {
    /// Calendar month
    Calendar,

    /// Custom cycle configured to start on day 1. Dates behave like the
    /// calendar month; only the live-period caption differs.
    CustomFromFirst,

    /// Custom cycle starting on `start_day` (2..=28), named after its closing month
    Custom { start_day: u32 },
}

impl CycleMode {
    /// Day of month on which periods start
    pub fn start_day(&self) -> u32 {
        match self {
            Self::Calendar | Self::CustomFromFirst => 1,
            Self::Custom { start_day } => *start_day,
        }
    }
}

/// Per-account billing cycle configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingCycleConfig {
    #[serde(rename = "startDay")]
    pub start_day: u32,

    #[serde(rename = "type", default)]
    pub kind: CycleKind,
}

impl Default for BillingCycleConfig {
    fn default() -> Self {
        Self::calendar()
    }
}

impl BillingCycleConfig {
    /// Calendar-month cycle
    pub fn calendar() -> Self {
        Self {
            start_day: MIN_START_DAY,
            kind: CycleKind::Calendar,
        }
    }

    /// Validated configuration
    pub fn new(start_day: u32, kind: CycleKind) -> Result<Self> {
        let config = Self { start_day, kind };
        config.validate()?;
        Ok(config)
    }

    /// Validated custom cycle starting on `start_day`
    pub fn custom(start_day: u32) -> Result<Self> {
        Self::new(start_day, CycleKind::Custom)
    }

    pub fn validate(&self) -> Result<()> {
        validate_start_day(self.start_day)
    }

    /// Explicit cycle semantics
    pub fn mode(&self) -> CycleMode {
        match (self.kind, self.start_day) {
            (CycleKind::Calendar, _) => CycleMode::Calendar,
            (CycleKind::Custom, 1) => CycleMode::CustomFromFirst,
            (CycleKind::Custom, start_day) => CycleMode::Custom { start_day },
        }
    }

    /// Human-readable description shown next to the cycle picker
    pub fn description(&self) -> String {
        match self.mode() {
            CycleMode::Calendar => "Calendar month (first to last day)".to_string(),
            CycleMode::CustomFromFirst => {
                "Billing cycle from day 1 of each month (same as calendar month)".to_string()
            }
            CycleMode::Custom { start_day } => {
                format!("Billing cycle from day {} of each month", start_day)
            }
        }
    }
}

/// Reject start days outside 1..=28
pub fn validate_start_day(start_day: u32) -> Result<()> {
    if (MIN_START_DAY..=MAX_START_DAY).contains(&start_day) {
        Ok(())
    } else {
        Err(EvnError::config(format!(
            "Billing cycle start day must be within {}..={}, got {}",
            MIN_START_DAY, MAX_START_DAY, start_day
        )))
    }
}

/// Concrete boundaries of one billing period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPeriod {
    /// First day of the period
    #[serde(with = "day_format")]
    pub start: NaiveDate,

    /// Last day with data available: the reference date or the boundary, whichever is earlier
    #[serde(with = "day_format")]
    pub end: NaiveDate,

    /// Last calendar day nominally in the period
    #[serde(with = "day_format")]
    pub period_end_boundary: NaiveDate,

    /// Last day of the preceding period
    #[serde(with = "day_format")]
    pub previous_period_end_boundary: NaiveDate,
}

impl BillingPeriod {
    /// Inclusive check against `start ..= period_end_boundary`
    pub fn contains(&self, date: NaiveDate) -> bool {
        is_date_in_period(date, self)
    }

    /// Number of calendar days in the period
    pub fn length_days(&self) -> i64 {
        (self.period_end_boundary - self.start).num_days() + 1
    }

    /// Intersect the nominal period with "today" for a live view
    pub fn clamp_end(mut self, today: NaiveDate) -> Self {
        self.end = today.min(self.period_end_boundary);
        self
    }
}

fn ymd(year: i32, month: u32, day: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| EvnError::generic(format!("Date out of range: {}-{}-{}", year, month, day)))
}

fn shift_month(year: i32, month: u32, forward: bool) -> (i32, u32) {
    match (forward, month) {
        (true, 12) => (year + 1, 1),
        (true, m) => (year, m + 1),
        (false, 1) => (year - 1, 12),
        (false, m) => (year, m - 1),
    }
}

/// Number of days in a calendar month
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = shift_month(year, month, true);
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map_or(31, |d| d.day())
}

/// The requested day of a month, or the month's last day when it does not exist
pub fn day_in_month_clamped(year: i32, month: u32, day: u32) -> Result<NaiveDate> {
    ymd(year, month, day.clamp(1, days_in_month(year, month)))
}

/// Resolve the billing period containing `reference`
///
/// Fails with a configuration error for start days outside 1..=28.
pub fn resolve_period(start_day: u32, reference: NaiveDate) -> Result<BillingPeriod> {
    validate_start_day(start_day)?;

    let start = if start_day == 1 {
        ymd(reference.year(), reference.month(), 1)?
    } else if reference.day() < start_day {
        let (year, month) = shift_month(reference.year(), reference.month(), false);
        day_in_month_clamped(year, month, start_day)?
    } else {
        day_in_month_clamped(reference.year(), reference.month(), start_day)?
    };

    let (next_year, next_month) = shift_month(start.year(), start.month(), true);
    let next_start = day_in_month_clamped(next_year, next_month, start_day)?;
    let period_end_boundary = next_start
        .pred_opt()
        .ok_or_else(|| EvnError::generic("Period end out of range"))?;
    let previous_period_end_boundary = start
        .pred_opt()
        .ok_or_else(|| EvnError::generic("Previous period end out of range"))?;

    Ok(BillingPeriod {
        start,
        end: reference.min(period_end_boundary),
        period_end_boundary,
        previous_period_end_boundary,
    })
}

/// Inclusive calendar-date bounds check
pub fn is_date_in_period(date: NaiveDate, period: &BillingPeriod) -> bool {
    date >= period.start && date <= period.period_end_boundary
}

/// Bounds check for a timestamp, using its calendar date in its own timezone
pub fn is_datetime_in_period<Tz: TimeZone>(at: &DateTime<Tz>, period: &BillingPeriod) -> bool {
    is_date_in_period(at.date_naive(), period)
}

fn label_of(mode: CycleMode, period: &BillingPeriod, is_current: bool, today: NaiveDate) -> MonthLabel {
    match mode {
        CycleMode::Calendar | CycleMode::CustomFromFirst if is_current => MonthLabel::of(today),
        CycleMode::Calendar | CycleMode::CustomFromFirst => MonthLabel::of(period.start),
        CycleMode::Custom { .. } => MonthLabel::of(period.period_end_boundary),
    }
}

/// Display month/year of the period containing `reference`
pub fn label_for_period(
    config: &BillingCycleConfig,
    reference: NaiveDate,
    is_current: bool,
    today: NaiveDate,
) -> Result<MonthLabel> {
    let mode = config.mode();
    let period = resolve_period(mode.start_day(), reference)?;
    Ok(label_of(mode, &period, is_current, today))
}

/// The period a label refers to, with `end` at the nominal boundary
pub fn period_for_label(config: &BillingCycleConfig, label: &MonthLabel) -> Result<BillingPeriod> {
    let reference = match config.mode() {
        CycleMode::Calendar | CycleMode::CustomFromFirst => ymd(label.year, label.month, 1)?,
        CycleMode::Custom { start_day } => ymd(label.year, label.month, start_day - 1)?,
    };
    let period = resolve_period(config.mode().start_day(), reference)?;
    Ok(BillingPeriod {
        end: period.period_end_boundary,
        ..period
    })
}

/// One entry of the period picker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodLabel {
    pub label: MonthLabel,
    pub is_current: bool,
}

impl PeriodLabel {
    /// Text shown in the picker
    pub fn caption(&self, mode: CycleMode) -> String {
        match mode {
            CycleMode::CustomFromFirst if self.is_current => CURRENT_PERIOD_CAPTION.to_string(),
            _ => self.label.to_string(),
        }
    }
}

/// Labels of the most recent periods, newest first
///
/// Walks back one month at a time from `today` for at most `max_periods`
/// steps, keeping periods that hold readings plus the live period. Stops once
/// a period ends before the earliest reading. When no period can be built
/// (no daily readings) the calendar months of the invoices are returned.
pub fn enumerate_recent_periods(
    config: &BillingCycleConfig,
    daily: &[DailyReading],
    monthly: &[MonthlyBilledRecord],
    today: NaiveDate,
    max_periods: usize,
) -> Result<Vec<PeriodLabel>> {
    let mode = config.mode();
    let start_day = mode.start_day();
    let mut labels: Vec<PeriodLabel> = Vec::new();

    if let Some(first_date) = daily.iter().map(|r| r.date).min() {
        let mut cursor = today;
        for _ in 0..max_periods {
            let period = resolve_period(start_day, cursor)?;
            if period.period_end_boundary < first_date {
                break;
            }

            let is_current = period.contains(today);
            let has_data = daily.iter().any(|r| period.contains(r.date));
            if has_data || is_current {
                let label = label_of(mode, &period, is_current, today);
                if !labels.iter().any(|p| p.label == label) {
                    labels.push(PeriodLabel { label, is_current });
                }
            }

            match cursor.checked_sub_months(Months::new(1)) {
                Some(prev) => cursor = prev,
                None => break,
            }
        }
    }

    if labels.is_empty() && !monthly.is_empty() {
        let current = label_for_period(config, today, true, today)?;
        let months: BTreeSet<MonthLabel> = monthly
            .iter()
            .filter_map(MonthlyBilledRecord::label)
            .chain(daily.iter().map(|r| MonthLabel::of(r.date)))
            .collect();
        labels = months
            .into_iter()
            .rev()
            .take(max_periods)
            .map(|label| PeriodLabel {
                label,
                is_current: label == current,
            })
            .collect();
    }

    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_calendar_period() {
        let p = resolve_period(1, d(2024, 3, 15)).unwrap();
        assert_eq!(p.start, d(2024, 3, 1));
        assert_eq!(p.period_end_boundary, d(2024, 3, 31));
        assert_eq!(p.previous_period_end_boundary, d(2024, 2, 29));
        assert_eq!(p.end, d(2024, 3, 15));
    }

    #[test]
    fn test_custom_period_before_start_day() {
        let p = resolve_period(15, d(2024, 3, 10)).unwrap();
        assert_eq!(p.start, d(2024, 2, 15));
        assert_eq!(p.period_end_boundary, d(2024, 3, 14));
        assert_eq!(p.previous_period_end_boundary, d(2024, 2, 14));
    }

    #[test]
    fn test_custom_period_on_start_day() {
        let p = resolve_period(15, d(2024, 3, 15)).unwrap();
        assert_eq!(p.start, d(2024, 3, 15));
        assert_eq!(p.period_end_boundary, d(2024, 4, 14));
    }

    #[test]
    fn test_january_wraps_to_december() {
        let p = resolve_period(20, d(2024, 1, 5)).unwrap();
        assert_eq!(p.start, d(2023, 12, 20));
        assert_eq!(p.period_end_boundary, d(2024, 1, 19));
    }

    #[test]
    fn test_december_start_rolls_into_next_year() {
        let p = resolve_period(10, d(2023, 12, 25)).unwrap();
        assert_eq!(p.start, d(2023, 12, 10));
        assert_eq!(p.period_end_boundary, d(2024, 1, 9));
    }

    #[test]
    fn test_start_day_out_of_range_is_config_error() {
        assert!(matches!(
            resolve_period(0, d(2024, 3, 1)),
            Err(EvnError::Config { .. })
        ));
        assert!(matches!(
            resolve_period(29, d(2024, 3, 1)),
            Err(EvnError::Config { .. })
        ));
    }

    #[test]
    fn test_day_clamping() {
        assert_eq!(day_in_month_clamped(2024, 4, 31).unwrap(), d(2024, 4, 30));
        assert_eq!(day_in_month_clamped(2024, 2, 31).unwrap(), d(2024, 2, 29));
        assert_eq!(day_in_month_clamped(2023, 2, 30).unwrap(), d(2023, 2, 28));
        assert_eq!(day_in_month_clamped(2024, 5, 12).unwrap(), d(2024, 5, 12));
    }

    #[test]
    fn test_mode_dispatch() {
        assert_eq!(BillingCycleConfig::calendar().mode(), CycleMode::Calendar);
        assert_eq!(
            BillingCycleConfig::custom(1).unwrap().mode(),
            CycleMode::CustomFromFirst
        );
        assert_eq!(
            BillingCycleConfig::custom(15).unwrap().mode(),
            CycleMode::Custom { start_day: 15 }
        );
        assert!(BillingCycleConfig::custom(31).is_err());
    }

    #[test]
    fn test_labels() {
        let today = d(2024, 3, 10);
        let custom = BillingCycleConfig::custom(15).unwrap();
        let label = label_for_period(&custom, today, true, today).unwrap();
        assert_eq!(label.to_string(), "03-2024");

        let calendar = BillingCycleConfig::calendar();
        let past = label_for_period(&calendar, d(2024, 1, 20), false, today).unwrap();
        assert_eq!(past.to_string(), "01-2024");
        let live = label_for_period(&calendar, today, true, today).unwrap();
        assert_eq!(live.to_string(), "03-2024");
    }

    #[test]
    fn test_period_for_label_inverts_custom_label() {
        let custom = BillingCycleConfig::custom(10).unwrap();
        let label: MonthLabel = "07-2024".parse().unwrap();
        let p = period_for_label(&custom, &label).unwrap();
        assert_eq!(p.start, d(2024, 6, 10));
        assert_eq!(p.period_end_boundary, d(2024, 7, 9));
        assert_eq!(p.end, p.period_end_boundary);

        let january: MonthLabel = "01-2024".parse().unwrap();
        let p = period_for_label(&custom, &january).unwrap();
        assert_eq!(p.start, d(2023, 12, 10));
    }

    #[test]
    fn test_caption_only_differs_for_custom_from_first() {
        let entry = PeriodLabel {
            label: "03-2024".parse().unwrap(),
            is_current: true,
        };
        assert_eq!(entry.caption(CycleMode::CustomFromFirst), CURRENT_PERIOD_CAPTION);
        assert_eq!(entry.caption(CycleMode::Calendar), "03-2024");
        assert_eq!(entry.caption(CycleMode::Custom { start_day: 5 }), "03-2024");
    }

    #[test]
    fn test_config_wire_format() {
        let json = serde_json::to_string(&BillingCycleConfig::custom(15).unwrap()).unwrap();
        assert_eq!(json, r#"{"startDay":15,"type":"cycle"}"#);
        let parsed: BillingCycleConfig = serde_json::from_str(r#"{"startDay":1}"#).unwrap();
        assert_eq!(parsed, BillingCycleConfig::calendar());
    }
}
