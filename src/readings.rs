//! Reading and invoice data model
//!
//! Converts the loosely typed JSON produced by the EVN integration into
//! calendar-dated values. Days travel as `dd-mm-yyyy` and months as `mm-yyyy`
//! only at the boundary; everything past this module works on
//! [`chrono::NaiveDate`].
//!
//! Field devices and older backends send dirty data (comma decimals, the
//! "no data" sentinel, nulls). Such values normalize to zero here and are
//! never reported as failures.

use crate::error::{EvnError, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Day format used by the integration storage and the dashboard API
pub const DATE_FORMAT: &str = "%d-%m-%Y";

/// Marker written by the integration for days without a meter reading
pub const NO_DATA_SENTINEL: &str = "Không có dữ liệu";

const FIELD_DAY: &str = "Ngày";
const FIELD_DAILY_KWH: &str = "Điện tiêu thụ (kWh)";
const FIELD_MONTH: &str = "Tháng";
const FIELD_YEAR: &str = "Năm";
const FIELD_MONTHLY_KWH: &str = "Điện tiêu thụ (KWh)";
const FIELD_MONTHLY_COST: &str = "Tiền Điện";
const FIELD_MONTHLY_COST_ALT: &str = "Tiền điện (VND)";
const FIELD_SPLIT_CONSUMPTION: &str = "SanLuong";
const FIELD_SPLIT_COST: &str = "TienDien";

/// Parse a `dd-mm-yyyy` day
pub fn parse_day(s: &str) -> Result<NaiveDate> {
    Ok(NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)?)
}

/// Format a day as `dd-mm-yyyy`
pub fn format_day(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Serde adapter for days in `dd-mm-yyyy` form
pub mod day_format {
    use super::{DATE_FORMAT, format_day};
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_day(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map_err(D::Error::custom)
    }

    /// Same format for optional days; `None` is `null`
    pub mod option {
        use super::super::{DATE_FORMAT, format_day};
        use chrono::NaiveDate;
        use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

        pub fn serialize<S: Serializer>(
            date: &Option<NaiveDate>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match date {
                Some(d) => serializer.serialize_some(&format_day(*d)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveDate>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|s| NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map_err(D::Error::custom))
                .transpose()
        }
    }
}

/// Calendar month label (`mm-yyyy`)
///
/// Ordering is chronological: year first, then month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthLabel {
    pub year: i32,
    pub month: u32,
}

impl MonthLabel {
    /// Create a label, rejecting months outside 1..=12
    pub fn new(month: u32, year: i32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(EvnError::validation(
                "month",
                format!("Month must be within 1..=12, got {}", month),
            ));
        }
        Ok(Self { year, month })
    }

    /// Label of the month containing `date`
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for MonthLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{}", self.month, self.year)
    }
}

impl FromStr for MonthLabel {
    type Err = EvnError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || {
            EvnError::validation(
                "month",
                format!("Expected mm-yyyy, got '{}'", s),
            )
        };
        let (month, year) = s.trim().split_once('-').ok_or_else(invalid)?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        Self::new(month, year)
    }
}

impl Serialize for MonthLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MonthLabel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One day of metered consumption
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyReading {
    #[serde(with = "day_format")]
    pub date: NaiveDate,
    pub consumption_kwh: f64,
}

impl DailyReading {
    /// Create a reading; negative or non-finite consumption becomes 0
    pub fn new(date: NaiveDate, consumption_kwh: f64) -> Self {
        Self {
            date,
            consumption_kwh: sanitize_kwh(consumption_kwh),
        }
    }
}

/// A finalized EVN invoice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyBilledRecord {
    pub month: u32,
    /// Absent in some older payloads
    pub year: Option<i32>,
    pub billed_consumption_kwh: i64,
    pub billed_cost_vnd: i64,
}

impl MonthlyBilledRecord {
    /// Label of the invoice month, when the year is known
    pub fn label(&self) -> Option<MonthLabel> {
        self.year.map(|year| MonthLabel {
            year,
            month: self.month,
        })
    }

    /// Whether this invoice belongs to `label`; a missing year matches any year
    pub fn matches(&self, label: &MonthLabel) -> bool {
        self.month == label.month && self.year.is_none_or(|y| y == label.year)
    }
}

/// Everything known about one account
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountData {
    pub monthly: Vec<MonthlyBilledRecord>,
    /// Sorted ascending by date, one entry per day
    pub daily: Vec<DailyReading>,
}

impl AccountData {
    /// Build from the two dashboard API payloads
    pub fn from_payloads(monthly_json: &str, daily_json: &str) -> Result<Self> {
        let monthly: Value = serde_json::from_str(monthly_json)?;
        let daily: Value = serde_json::from_str(daily_json)?;
        Ok(Self {
            monthly: parse_monthly_value(&monthly),
            daily: parse_daily_value(&daily),
        })
    }

    /// Build from the integration storage file (`{"daily": [...], "monthly": [...]}`)
    pub fn from_storage_json(json: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(json)?;
        Ok(Self {
            monthly: root
                .get("monthly")
                .map(parse_monthly_value)
                .unwrap_or_default(),
            daily: root.get("daily").map(parse_daily_value).unwrap_or_default(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.monthly.is_empty() && self.daily.is_empty()
    }
}

fn sanitize_kwh(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Normalize a raw consumption value to kWh
///
/// Accepts numbers, comma- or dot-decimal strings; the no-data sentinel,
/// nulls and anything unparseable become 0.
pub fn normalize_consumption(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().map_or(0.0, sanitize_kwh),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() || s == NO_DATA_SENTINEL {
                return 0.0;
            }
            s.replace(',', ".").parse::<f64>().map_or(0.0, sanitize_kwh)
        }
        _ => 0.0,
    }
}

/// Parse a money amount; strings may carry `.`/`,` thousand separators
fn parse_amount(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64))
            .unwrap_or(0),
        Value::String(s) => {
            let digits: String = s
                .trim()
                .chars()
                .filter(|c| !matches!(c, '.' | ',' | ' '))
                .collect();
            digits.parse().unwrap_or(0)
        }
        _ => 0,
    }
}

fn parse_integer(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_daily_row(row: &Value) -> Option<DailyReading> {
    let date = parse_day(row.get(FIELD_DAY)?.as_str()?).ok()?;
    let kwh = row
        .get(FIELD_DAILY_KWH)
        .map_or(0.0, normalize_consumption);
    Some(DailyReading::new(date, kwh))
}

/// Normalize a JSON array of daily rows
///
/// Rows without a parseable `Ngày` are dropped. The result is sorted by date
/// and keeps the first row seen for each day.
pub fn parse_daily_value(value: &Value) -> Vec<DailyReading> {
    let Some(rows) = value.as_array() else {
        return Vec::new();
    };
    let mut readings: Vec<DailyReading> = rows.iter().filter_map(parse_daily_row).collect();
    readings.sort_by_key(|r| r.date);
    readings.dedup_by_key(|r| r.date);
    readings
}

#[derive(Default)]
struct MonthlyAccumulator {
    kwh: i64,
    cost: i64,
}

impl MonthlyAccumulator {
    fn add_kwh(&mut self, kwh: i64) {
        self.kwh = self.kwh.saturating_add(kwh);
    }

    fn add_cost(&mut self, cost: i64) {
        self.cost = self.cost.saturating_add(cost);
    }
}

fn month_key(row: &Value) -> Option<(Option<i32>, u32)> {
    let month = parse_integer(row.get(FIELD_MONTH))?;
    if !(1..=12).contains(&month) {
        return None;
    }
    let year = parse_integer(row.get(FIELD_YEAR)).and_then(|y| i32::try_from(y).ok());
    Some((year, month as u32))
}

fn monthly_kwh(row: &Value) -> i64 {
    row.get(FIELD_MONTHLY_KWH)
        .or_else(|| row.get(FIELD_DAILY_KWH))
        .map_or(0.0, normalize_consumption)
        .round() as i64
}

fn monthly_cost(row: &Value) -> i64 {
    row.get(FIELD_MONTHLY_COST)
        .or_else(|| row.get(FIELD_MONTHLY_COST_ALT))
        .map_or(0, parse_amount)
        .max(0)
}

/// Normalize monthly invoices
///
/// Accepts a flat list of records carrying both consumption and cost, or the
/// dashboard's split form `{"SanLuong": [...], "TienDien": [...]}`. Rows of
/// the same month and year are summed, so a regular bill and an adjustment
/// for that month both count. Output is sorted by (year, month).
pub fn parse_monthly_value(value: &Value) -> Vec<MonthlyBilledRecord> {
    let mut merged: BTreeMap<(Option<i32>, u32), MonthlyAccumulator> = BTreeMap::new();

    match value {
        Value::Array(rows) => {
            for row in rows {
                if let Some(key) = month_key(row) {
                    let acc = merged.entry(key).or_default();
                    acc.add_kwh(monthly_kwh(row));
                    acc.add_cost(monthly_cost(row));
                }
            }
        }
        Value::Object(map) => {
            let section = |name: &str| {
                map.get(name)
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default()
            };
            for row in section(FIELD_SPLIT_CONSUMPTION) {
                if let Some(key) = month_key(&row) {
                    merged.entry(key).or_default().add_kwh(monthly_kwh(&row));
                }
            }
            for row in section(FIELD_SPLIT_COST) {
                if let Some(key) = month_key(&row) {
                    merged.entry(key).or_default().add_cost(monthly_cost(&row));
                }
            }
        }
        _ => {}
    }

    merged
        .into_iter()
        .map(|((year, month), acc)| MonthlyBilledRecord {
            month,
            year,
            billed_consumption_kwh: acc.kwh,
            billed_cost_vnd: acc.cost,
        })
        .collect()
}
