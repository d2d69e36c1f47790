//! EVN residential tariff engine
//!
//! Progressive pricing: each block of monthly consumption is charged at its
//! own unit price, then VAT is added on the pre-tax subtotal. Per-tier costs
//! keep full precision; rounding to whole VND happens once, on the subtotal,
//! the tax and the total.

use crate::readings::{DailyReading, day_format};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One price block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TariffTier {
    /// Block size in kWh; `None` for the open-ended last block
    pub capacity_kwh: Option<f64>,
    pub unit_price_vnd: u32,
}

/// Residential blocks: 0-50, 51-100, 101-200, 201-300, 301-400, 401+ kWh
pub const RESIDENTIAL_TIERS: [TariffTier; 6] = [
    TariffTier {
        capacity_kwh: Some(50.0),
        unit_price_vnd: 1984,
    },
    TariffTier {
        capacity_kwh: Some(50.0),
        unit_price_vnd: 2050,
    },
    TariffTier {
        capacity_kwh: Some(100.0),
        unit_price_vnd: 2380,
    },
    TariffTier {
        capacity_kwh: Some(100.0),
        unit_price_vnd: 2998,
    },
    TariffTier {
        capacity_kwh: Some(100.0),
        unit_price_vnd: 3350,
    },
    TariffTier {
        capacity_kwh: None,
        unit_price_vnd: 3460,
    },
];

/// VAT applied to the pre-tax subtotal
pub const VAT_RATE: f64 = 0.08;

/// Consumption and cost attributed to one tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierUsage {
    /// 1-based tier number
    pub tier_index: usize,
    pub unit_price_vnd: u32,
    pub kwh: f64,
    /// Unrounded
    pub cost_vnd: f64,
}

/// Result of a tariff calculation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub subtotal_vnd: i64,
    pub tax_vnd: i64,
    pub total_vnd: i64,
    pub tiers: Vec<TierUsage>,
}

impl CostBreakdown {
    pub fn is_zero(&self) -> bool {
        self.total_vnd == 0 && self.tiers.is_empty()
    }
}

/// Cost attributed to one day under cumulative tiering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCost {
    #[serde(with = "day_format")]
    pub date: NaiveDate,
    pub kwh: f64,
    /// Consumption in the period up to and including this day
    pub cumulative_kwh: f64,
    /// Marginal cost of this day, tax included
    pub cost_vnd: i64,
    /// `cost_vnd / kwh`, 0 for days without consumption
    pub avg_unit_price_vnd: f64,
    pub is_max: bool,
    pub is_min: bool,
}

/// A tier schedule plus tax rate
#[derive(Debug, Clone, Copy)]
pub struct TariffSchedule {
    tiers: &'static [TariffTier],
    tax_rate: f64,
}

impl Default for TariffSchedule {
    fn default() -> Self {
        Self::residential()
    }
}

/// Whole-VND rounding, half up (inputs are never negative)
fn round_vnd(amount: f64) -> i64 {
    amount.round() as i64
}

impl TariffSchedule {
    /// The EVN residential schedule
    pub const fn residential() -> Self {
        Self {
            tiers: &RESIDENTIAL_TIERS,
            tax_rate: VAT_RATE,
        }
    }

    pub fn tiers(&self) -> &'static [TariffTier] {
        self.tiers
    }

    pub fn tax_rate(&self) -> f64 {
        self.tax_rate
    }

    /// Cost of `total_kwh` consumed within one period
    pub fn compute_cost(&self, total_kwh: f64) -> CostBreakdown {
        if !total_kwh.is_finite() || total_kwh <= 0.0 {
            return CostBreakdown::default();
        }

        let mut remaining = total_kwh;
        let mut subtotal = 0.0;
        let mut tiers = Vec::with_capacity(self.tiers.len());

        for (index, tier) in self.tiers.iter().enumerate() {
            if remaining <= 0.0 {
                break;
            }
            let kwh = tier.capacity_kwh.map_or(remaining, |cap| remaining.min(cap));
            let cost = kwh * f64::from(tier.unit_price_vnd);
            subtotal += cost;
            tiers.push(TierUsage {
                tier_index: index + 1,
                unit_price_vnd: tier.unit_price_vnd,
                kwh,
                cost_vnd: cost,
            });
            remaining -= kwh;
        }

        let tax = subtotal * self.tax_rate;
        CostBreakdown {
            subtotal_vnd: round_vnd(subtotal),
            tax_vnd: round_vnd(tax),
            total_vnd: round_vnd(subtotal + tax),
            tiers,
        }
    }

    /// Attribute cost to each day of a period, in date order
    ///
    /// A day's cost is the increase of the period total caused by that day,
    /// so days later in a heavy period land in pricier tiers. The daily
    /// costs add up exactly to the cost of the period total.
    pub fn daily_costs_with_cumulative_tiers(&self, sorted_readings: &[DailyReading]) -> Vec<DailyCost> {
        let max = sorted_readings
            .iter()
            .map(|r| r.consumption_kwh)
            .fold(f64::NEG_INFINITY, f64::max);
        let min = sorted_readings
            .iter()
            .map(|r| r.consumption_kwh)
            .fold(f64::INFINITY, f64::min);

        let mut cumulative_kwh = 0.0;
        let mut previous_total = 0;

        sorted_readings
            .iter()
            .map(|reading| {
                let kwh = reading.consumption_kwh;
                cumulative_kwh += kwh;
                let total = self.compute_cost(cumulative_kwh).total_vnd;
                let cost_vnd = total - previous_total;
                previous_total = total;

                DailyCost {
                    date: reading.date,
                    kwh,
                    cumulative_kwh,
                    cost_vnd,
                    avg_unit_price_vnd: if kwh > 0.0 {
                        cost_vnd as f64 / kwh
                    } else {
                        0.0
                    },
                    is_max: kwh == max,
                    is_min: kwh == min,
                }
            })
            .collect()
    }
}

/// Cost of `total_kwh` under the residential schedule
pub fn compute_cost(total_kwh: f64) -> CostBreakdown {
    TariffSchedule::residential().compute_cost(total_kwh)
}

/// Per-day cost under the residential schedule with cumulative tiering
pub fn compute_daily_costs_with_cumulative_tiers(sorted_readings: &[DailyReading]) -> Vec<DailyCost> {
    TariffSchedule::residential().daily_costs_with_cumulative_tiers(sorted_readings)
}
