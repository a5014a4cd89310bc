//! Derived KPI calculations for seminar events.
//!
//! Everything here is a pure function over borrowed records. A zero divisor
//! always yields `0`; no divisor is ever substituted.

use std::collections::{BTreeSet, HashMap};

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::error::MetricsError;
use crate::models::{AggregateMetrics, DerivedMetrics, EventRecord};

/// Share of assets under management booked as advisory-fee income.
pub const AUM_ADVISORY_FEE_RATE: f64 = 0.01;

/// Caller-selected income policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeOptions {
    /// Add planning-fee revenue to `total_income` (and therefore ROI).
    pub include_planning_fees: bool,
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

fn percent(numerator: u32, denominator: u32) -> f64 {
    ratio(f64::from(numerator), f64::from(denominator)) * 100.0
}

fn mean(values: impl ExactSizeIterator<Item = f64>) -> f64 {
    let count = values.len();
    if count == 0 {
        return 0.0;
    }
    values.sum::<f64>() / count as f64
}

fn check_amount(field: &'static str, value: f64) -> Result<(), MetricsError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(MetricsError::invalid(field, format!("{value} is not a non-negative amount")))
    }
}

fn validate(event: &EventRecord) -> Result<(), MetricsError> {
    check_amount("advertisingCost", event.advertising_cost)?;
    check_amount("foodVenueCost", event.food_venue_cost)?;
    check_amount("fixedAnnuityProduction", event.fixed_annuity_production)?;
    check_amount("lifeProduction", event.life_production)?;
    check_amount("aumTotal", event.aum_total)?;

    let optional = [
        ("planningFeeRate", event.planning_fee_rate),
        ("annuityPremium", event.annuity_premium),
        ("lifeInsurancePremium", event.life_insurance_premium),
    ];
    for (field, value) in optional {
        if let Some(value) = value {
            check_amount(field, value)?;
        }
    }
    Ok(())
}

pub fn total_expenses(event: &EventRecord) -> f64 {
    event.advertising_cost + event.food_venue_cost
}

/// Income figure used for ROI.
pub fn total_income(event: &EventRecord, options: IncomeOptions) -> f64 {
    let gross = accumulated_income_gross_production(event);
    if options.include_planning_fees {
        gross + event.planning_fee_revenue()
    } else {
        gross
    }
}

/// Variant A: gross production at face value.
pub fn accumulated_income_gross_production(event: &EventRecord) -> f64 {
    event.fixed_annuity_production + event.life_production + event.aum_total
}

/// Variant B: direct premiums, 1% of AUM as advisory fee, planning fees at face value.
pub fn accumulated_income_with_advisory_fee(event: &EventRecord) -> f64 {
    event.annuity_premium.unwrap_or(0.0)
        + event.life_insurance_premium.unwrap_or(0.0)
        + event.aum_total * AUM_ADVISORY_FEE_RATE
        + event.planning_fee_revenue()
}

pub fn compute_event_metrics(
    event: &EventRecord,
    options: IncomeOptions,
) -> Result<DerivedMetrics, MetricsError> {
    validate(event)?;

    let total_expenses = total_expenses(event);
    let total_income = total_income(event, options);

    Ok(DerivedMetrics {
        response_rate: percent(event.registrant_responses, event.audience_total),
        confirmation_rate: percent(event.confirmations, event.registrant_responses),
        attendance_rate: percent(event.attendees, event.confirmations),
        conversion_rate: percent(event.clients_from_event, event.attendees),
        total_expenses,
        total_income,
        roi: ratio(total_income - total_expenses, total_expenses) * 100.0,
        expense_per_attendee: ratio(total_expenses, f64::from(event.attendees)),
        expense_per_appointment: ratio(total_expenses, f64::from(event.appointments)),
        expense_per_client: ratio(total_expenses, f64::from(event.clients_from_event)),
        accumulated_income: accumulated_income_with_advisory_fee(event),
    })
}

/// Roll up a pre-filtered set of events.
///
/// Averages are simple means of per-event percentages, so a large event
/// carries the same weight as a small one.
pub fn aggregate(
    events: &[EventRecord],
    options: IncomeOptions,
) -> Result<AggregateMetrics, MetricsError> {
    let derived = events
        .iter()
        .map(|event| compute_event_metrics(event, options))
        .collect::<Result<Vec<_>, _>>()?;

    let total_attendees: u64 = events.iter().map(|e| u64::from(e.attendees)).sum();
    let total_clients: u64 = events.iter().map(|e| u64::from(e.clients_from_event)).sum();
    let total_expenses: f64 = derived.iter().map(|m| m.total_expenses).sum();

    Ok(AggregateMetrics {
        total_events: events.len(),
        total_attendees,
        total_clients,
        total_revenue: derived.iter().map(|m| m.total_income).sum(),
        total_expenses,
        avg_roi: mean(derived.iter().map(|m| m.roi)),
        avg_conversion_rate: mean(derived.iter().map(|m| m.conversion_rate)),
        client_acquisition_cost: ratio(total_expenses, total_clients as f64),
    })
}

/// Dimension used to bucket events in a grouped roll-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GroupField {
    Topic,
    Location,
    /// `YYYY-MM` of the event date.
    Month,
    Weekday,
    Status,
}

impl GroupField {
    /// Sort rank plus display label. Rank keeps weekdays in calendar order.
    fn key(&self, event: &EventRecord) -> (u32, String) {
        match self {
            Self::Topic => (0, event.topic.clone()),
            Self::Location => (0, event.location.clone()),
            Self::Month => (0, event.date.format("%Y-%m").to_string()),
            Self::Weekday => {
                let weekday = event.date.weekday();
                (weekday.num_days_from_monday(), weekday.to_string())
            }
            Self::Status => (0, event.status.as_str().to_string()),
        }
    }
}

/// Value averaged into each roll-up cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricField {
    ResponseRate,
    ConfirmationRate,
    AttendanceRate,
    ConversionRate,
    Roi,
    TotalIncome,
    TotalExpenses,
    Attendees,
    Clients,
    ExpensePerClient,
}

impl MetricField {
    fn value(&self, event: &EventRecord, metrics: &DerivedMetrics) -> f64 {
        match self {
            Self::ResponseRate => metrics.response_rate,
            Self::ConfirmationRate => metrics.confirmation_rate,
            Self::AttendanceRate => metrics.attendance_rate,
            Self::ConversionRate => metrics.conversion_rate,
            Self::Roi => metrics.roi,
            Self::TotalIncome => metrics.total_income,
            Self::TotalExpenses => metrics.total_expenses,
            Self::Attendees => f64::from(event.attendees),
            Self::Clients => f64::from(event.clients_from_event),
            Self::ExpensePerClient => metrics.expense_per_client,
        }
    }
}

/// Row × column matrix of per-cell means. `None` marks a cell with no events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedRollup {
    pub row_field: GroupField,
    pub col_field: GroupField,
    pub metric: MetricField,
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    pub cells: Vec<Vec<Option<f64>>>,
}

impl GroupedRollup {
    /// Cell lookup by label. Unknown labels read as "no data".
    pub fn get(&self, row: &str, col: &str) -> Option<f64> {
        let r = self.rows.iter().position(|k| k == row)?;
        let c = self.columns.iter().position(|k| k == col)?;
        self.cells[r][c]
    }
}

pub fn grouped_rollup(
    events: &[EventRecord],
    row_field: GroupField,
    col_field: GroupField,
    metric: MetricField,
    options: IncomeOptions,
) -> Result<GroupedRollup, MetricsError> {
    let mut row_keys = BTreeSet::new();
    let mut col_keys = BTreeSet::new();
    let mut buckets: HashMap<(String, String), Vec<f64>> = HashMap::new();

    for event in events {
        let metrics = compute_event_metrics(event, options)?;
        let row = row_field.key(event);
        let col = col_field.key(event);
        buckets
            .entry((row.1.clone(), col.1.clone()))
            .or_default()
            .push(metric.value(event, &metrics));
        row_keys.insert(row);
        col_keys.insert(col);
    }

    let rows: Vec<String> = row_keys.into_iter().map(|(_, label)| label).collect();
    let columns: Vec<String> = col_keys.into_iter().map(|(_, label)| label).collect();

    let cells = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|col| {
                    buckets
                        .get(&(row.clone(), col.clone()))
                        .map(|values| mean(values.iter().copied()))
                })
                .collect()
        })
        .collect();

    Ok(GroupedRollup {
        row_field,
        col_field,
        metric,
        rows,
        columns,
        cells,
    })
}
