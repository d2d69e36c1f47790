use chrono::NaiveDate;
use evn_monitor::readings::DailyReading;
use evn_monitor::tariff::{
    RESIDENTIAL_TIERS, TariffSchedule, compute_cost, compute_daily_costs_with_cumulative_tiers,
};

fn month_of(kwh_per_day: &[f64]) -> Vec<DailyReading> {
    kwh_per_day
        .iter()
        .enumerate()
        .map(|(i, kwh)| {
            DailyReading::new(
                NaiveDate::from_ymd_opt(2024, 3, i as u32 + 1).unwrap(),
                *kwh,
            )
        })
        .collect()
}

#[test]
fn zero_consumption_costs_nothing() {
    let cost = compute_cost(0.0);
    assert_eq!(cost.subtotal_vnd, 0);
    assert_eq!(cost.tax_vnd, 0);
    assert_eq!(cost.total_vnd, 0);
    assert!(cost.tiers.is_empty());
}

#[test]
fn cost_is_monotonic_in_consumption() {
    let mut previous = 0;
    for step in 0..=1200 {
        let total = compute_cost(f64::from(step) * 0.5).total_vnd;
        assert!(total >= previous, "cost dropped at {} kWh", f64::from(step) * 0.5);
        previous = total;
    }
}

#[test]
fn tier_boundary_is_exact() {
    assert_eq!(compute_cost(50.0).subtotal_vnd, 99_200);
    assert_eq!(compute_cost(51.0).subtotal_vnd, 99_200 + 2050);
    assert_eq!(compute_cost(100.0).subtotal_vnd, 99_200 + 102_500);
    assert_eq!(compute_cost(101.0).subtotal_vnd, 99_200 + 102_500 + 2380);
}

#[test]
fn five_days_of_ten_kwh() {
    let readings = month_of(&[10.0; 5]);
    let total_kwh: f64 = readings.iter().map(|r| r.consumption_kwh).sum();
    let cost = compute_cost(total_kwh);
    assert_eq!(cost.subtotal_vnd, 99_200);
    assert_eq!(cost.tax_vnd, 7_936);
    assert_eq!(cost.total_vnd, 107_136);
}

#[test]
fn cumulative_daily_costs_sum_to_period_total() {
    let usage = [12.3, 0.0, 25.75, 8.1, 40.0, 33.33, 19.9, 60.2, 5.5, 70.0, 44.4, 18.0];
    let readings = month_of(&usage);
    let rows = compute_daily_costs_with_cumulative_tiers(&readings);
    let total_kwh: f64 = usage.iter().sum();

    assert_eq!(rows.len(), usage.len());
    assert_eq!(
        rows.iter().map(|r| r.cost_vnd).sum::<i64>(),
        compute_cost(total_kwh).total_vnd
    );
    assert!((rows.last().unwrap().cumulative_kwh - total_kwh).abs() < 1e-9);
}

#[test]
fn later_days_pay_higher_tiers() {
    let rows = compute_daily_costs_with_cumulative_tiers(&month_of(&[50.0, 50.0, 50.0]));
    assert!(rows[0].cost_vnd < rows[1].cost_vnd);
    assert!(rows[1].cost_vnd < rows[2].cost_vnd);
    assert!(rows.iter().all(|r| r.is_max && r.is_min));
}

#[test]
fn residential_schedule_shape() {
    let schedule = TariffSchedule::residential();
    assert_eq!(schedule.tiers().len(), RESIDENTIAL_TIERS.len());
    assert!(schedule.tiers().last().unwrap().capacity_kwh.is_none());
    assert!((schedule.tax_rate() - 0.08).abs() < f64::EPSILON);
}
