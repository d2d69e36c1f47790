//! Aggregates for the dashboard cards, trend strip and detail table
//!
//! Everything here is a pure function of the account data, the billing-cycle
//! configuration and an injected "today". Missing data yields empty or zeroed
//! results, never an error.

use crate::billing::{BillingCycleConfig, BillingPeriod, label_for_period, period_for_label, resolve_period};
use crate::error::Result;
use crate::readings::{DailyReading, MonthLabel, MonthlyBilledRecord, day_format};
use crate::tariff::{CostBreakdown, DailyCost, compute_cost, compute_daily_costs_with_cumulative_tiers};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Average-consumption change (kWh/day) below which a trend counts as flat
pub const TREND_FLAT_THRESHOLD_KWH: f64 = 0.01;

/// Percent change beyond which a trend is flagged as strong
pub const STRONG_TREND_PERCENT: f64 = 20.0;

/// Readings falling in `period`
pub fn readings_in_period(daily: &[DailyReading], period: &BillingPeriod) -> Vec<DailyReading> {
    daily
        .iter()
        .filter(|r| period.contains(r.date))
        .copied()
        .collect()
}

/// Readings of the period shown under `label`
pub fn readings_for_label(
    daily: &[DailyReading],
    config: &BillingCycleConfig,
    label: &MonthLabel,
) -> Result<Vec<DailyReading>> {
    let period = period_for_label(config, label)?;
    Ok(readings_in_period(daily, &period))
}

fn with_consumption(readings: Vec<DailyReading>) -> Vec<DailyReading> {
    readings
        .into_iter()
        .filter(|r| r.consumption_kwh > 0.0)
        .collect()
}

fn round_2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// The in-progress, not yet invoiced period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentPeriodSnapshot {
    pub label: MonthLabel,
    /// Rounded to 2 decimals for display
    pub total_consumption_kwh: f64,
    pub estimated_cost_vnd: i64,
    /// Days with consumption
    pub day_count: usize,
    pub period: BillingPeriod,
    pub cost_breakdown: CostBreakdown,
}

/// Snapshot of the live period, or `None` when it has no consumption yet
pub fn current_period_snapshot(
    config: &BillingCycleConfig,
    daily: &[DailyReading],
    today: NaiveDate,
) -> Result<Option<CurrentPeriodSnapshot>> {
    let period = resolve_period(config.mode().start_day(), today)?;
    let readings = with_consumption(readings_in_period(daily, &period));
    if readings.is_empty() {
        return Ok(None);
    }

    let total: f64 = readings.iter().map(|r| r.consumption_kwh).sum();
    let cost_breakdown = compute_cost(total);

    Ok(Some(CurrentPeriodSnapshot {
        label: label_for_period(config, today, true, today)?,
        total_consumption_kwh: round_2(total),
        estimated_cost_vnd: cost_breakdown.total_vnd,
        day_count: readings.len(),
        period,
        cost_breakdown,
    }))
}

/// Account summary cards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Billed cost plus the live estimate, when there is one
    pub total_cost_vnd: i64,
    /// Whether `total_cost_vnd` includes a not yet invoiced estimate
    pub estimated: bool,
    pub billed_cost_vnd: i64,
    /// Over invoiced months only
    pub avg_monthly_cost_vnd: f64,
    pub total_monthly_consumption_kwh: i64,
    pub avg_monthly_consumption_kwh: f64,
    /// Over days with consumption
    pub avg_daily_consumption_kwh: f64,
    pub current_period: Option<CurrentPeriodSnapshot>,
}

/// Combine invoices with the live period estimate
pub fn summarize(
    monthly: &[MonthlyBilledRecord],
    daily: &[DailyReading],
    config: &BillingCycleConfig,
    today: NaiveDate,
) -> Result<Summary> {
    let current_period = current_period_snapshot(config, daily, today)?;

    let billed_cost_vnd = monthly
        .iter()
        .map(|m| m.billed_cost_vnd)
        .fold(0i64, i64::saturating_add);
    let total_monthly_consumption_kwh = monthly
        .iter()
        .map(|m| m.billed_consumption_kwh)
        .fold(0i64, i64::saturating_add);
    let months = monthly.len() as f64;
    let (avg_monthly_cost_vnd, avg_monthly_consumption_kwh) = if monthly.is_empty() {
        (0.0, 0.0)
    } else {
        (
            billed_cost_vnd as f64 / months,
            total_monthly_consumption_kwh as f64 / months,
        )
    };

    let consuming_days: Vec<f64> = daily
        .iter()
        .map(|r| r.consumption_kwh)
        .filter(|kwh| *kwh > 0.0)
        .collect();
    let avg_daily_consumption_kwh = if consuming_days.is_empty() {
        0.0
    } else {
        consuming_days.iter().sum::<f64>() / consuming_days.len() as f64
    };

    let estimate = current_period.as_ref().map(|c| c.estimated_cost_vnd);

    Ok(Summary {
        total_cost_vnd: billed_cost_vnd.saturating_add(estimate.unwrap_or(0)),
        estimated: estimate.is_some(),
        billed_cost_vnd,
        avg_monthly_cost_vnd,
        total_monthly_consumption_kwh,
        avg_monthly_consumption_kwh,
        avg_daily_consumption_kwh,
        current_period,
    })
}

/// Direction of the average daily consumption vs the previous period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

/// Marker for large swings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendBadge {
    StrongIncrease,
    StrongDecrease,
}

/// Where a period's cost figure comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostSource {
    /// Computed from readings with the tariff
    Estimated,
    /// Taken from the EVN invoice
    Billed,
}

/// Trend card for one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodTrend {
    pub label: MonthLabel,
    pub is_current: bool,
    pub day_count: usize,
    pub min_kwh: f64,
    pub max_kwh: f64,
    pub avg_kwh: f64,
    #[serde(with = "day_format::option", default)]
    pub min_day: Option<NaiveDate>,
    #[serde(with = "day_format::option", default)]
    pub max_day: Option<NaiveDate>,
    pub total_kwh: f64,
    pub cost_vnd: i64,
    pub cost_source: CostSource,
    pub trend: TrendDirection,
    /// Change of the daily average vs the next older period, in kWh
    pub delta_kwh: f64,
    pub percent_change: f64,
    pub badge: Option<TrendBadge>,
}

#[derive(Default)]
struct PeriodStats {
    readings: Vec<DailyReading>,
    min: f64,
    max: f64,
    avg: f64,
    total: f64,
}

impl PeriodStats {
    fn from_readings(readings: Vec<DailyReading>) -> Self {
        if readings.is_empty() {
            return Self::default();
        }
        let values = readings.iter().map(|r| r.consumption_kwh);
        let total: f64 = values.clone().sum();
        Self {
            min: values.clone().fold(f64::INFINITY, f64::min),
            max: values.fold(f64::NEG_INFINITY, f64::max),
            avg: total / readings.len() as f64,
            total,
            readings,
        }
    }

    fn day_with(&self, kwh: f64) -> Option<NaiveDate> {
        self.readings
            .iter()
            .find(|r| r.consumption_kwh == kwh)
            .map(|r| r.date)
    }
}

fn classify(delta: f64, percent: f64) -> (TrendDirection, Option<TrendBadge>) {
    let direction = if delta > TREND_FLAT_THRESHOLD_KWH {
        TrendDirection::Up
    } else if delta < -TREND_FLAT_THRESHOLD_KWH {
        TrendDirection::Down
    } else {
        TrendDirection::Flat
    };
    let badge = if percent > STRONG_TREND_PERCENT {
        Some(TrendBadge::StrongIncrease)
    } else if percent < -STRONG_TREND_PERCENT {
        Some(TrendBadge::StrongDecrease)
    } else {
        None
    };
    (direction, badge)
}

/// Trend cards for `labels`, ordered newest first
///
/// The first label is the live period and is always estimated; older
/// periods use the matching invoice when one exists.
pub fn trend_for_periods(
    labels: &[MonthLabel],
    daily: &[DailyReading],
    monthly: &[MonthlyBilledRecord],
    config: &BillingCycleConfig,
) -> Result<Vec<PeriodTrend>> {
    let stats = labels
        .iter()
        .map(|label| {
            readings_for_label(daily, config, label)
                .map(|readings| PeriodStats::from_readings(with_consumption(readings)))
        })
        .collect::<Result<Vec<_>>>()?;

    let trends = labels
        .iter()
        .zip(&stats)
        .enumerate()
        .map(|(index, (label, current))| {
            let invoice = monthly.iter().find(|m| m.matches(label));
            let (cost_vnd, cost_source) = match invoice {
                Some(record) if index > 0 => (record.billed_cost_vnd, CostSource::Billed),
                _ => (compute_cost(current.total).total_vnd, CostSource::Estimated),
            };

            let (delta_kwh, percent_change) = match stats.get(index + 1) {
                Some(older) if !current.readings.is_empty() => {
                    let delta = current.avg - older.avg;
                    let percent = if older.avg > 0.0 {
                        delta / older.avg * 100.0
                    } else {
                        0.0
                    };
                    (delta, percent)
                }
                _ => (0.0, 0.0),
            };
            let (trend, badge) = classify(delta_kwh, percent_change);

            PeriodTrend {
                label: *label,
                is_current: index == 0,
                day_count: current.readings.len(),
                min_kwh: current.min,
                max_kwh: current.max,
                avg_kwh: current.avg,
                min_day: current.day_with(current.min),
                max_day: current.day_with(current.max),
                total_kwh: current.total,
                cost_vnd,
                cost_source,
                trend,
                delta_kwh,
                percent_change,
                badge,
            }
        })
        .collect();

    Ok(trends)
}

/// Detail table for a set of days
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailTable {
    pub rows: Vec<DailyCost>,
    pub total_kwh: f64,
    pub avg_kwh_per_day: f64,
    pub total_cost_vnd: i64,
    pub avg_cost_per_day_vnd: f64,
    pub day_count: usize,
    pub max_day: Option<DailyCost>,
    pub min_day: Option<DailyCost>,
}

/// Cumulative-tier cost table over the days with consumption
pub fn detail_table(readings: &[DailyReading]) -> DetailTable {
    let mut days = with_consumption(readings.to_vec());
    if days.is_empty() {
        return DetailTable::default();
    }
    days.sort_by_key(|r| r.date);

    let rows = compute_daily_costs_with_cumulative_tiers(&days);
    let day_count = rows.len();
    let total_kwh: f64 = rows.iter().map(|r| r.kwh).sum();
    let total_cost_vnd: i64 = rows.iter().map(|r| r.cost_vnd).sum();

    DetailTable {
        max_day: rows.iter().find(|r| r.is_max).cloned(),
        min_day: rows.iter().find(|r| r.is_min).cloned(),
        total_kwh,
        avg_kwh_per_day: total_kwh / day_count as f64,
        total_cost_vnd,
        avg_cost_per_day_vnd: total_cost_vnd as f64 / day_count as f64,
        day_count,
        rows,
    }
}
