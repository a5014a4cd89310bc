//! Presentation helpers
//!
//! Rounding and clamping happen here and nowhere else; the metrics engine
//! hands over full-precision values.

use serde::Serialize;

use crate::models::DerivedMetrics;

/// Round a percentage to one decimal place for display.
#[inline]
pub fn round_percent(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Format currency with thousands separators and two decimals, e.g. `$7,872.02`.
pub fn format_currency(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let fraction = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}${grouped}.{fraction:02}")
}

/// Fill level (0..=100) for the circular ROI gauge. Display only.
#[inline]
pub fn roi_gauge_fill(roi: f64) -> f64 {
    (roi / 3.0).clamp(0.0, 100.0)
}

/// Rounded view of [`DerivedMetrics`] for dashboards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayMetrics {
    pub response_rate: f64,
    pub confirmation_rate: f64,
    pub attendance_rate: f64,
    pub conversion_rate: f64,
    pub roi: f64,
    pub roi_gauge_fill: f64,
    pub total_expenses: String,
    pub total_income: String,
    pub expense_per_attendee: String,
    pub expense_per_appointment: String,
    pub expense_per_client: String,
    pub accumulated_income: String,
}

impl From<&DerivedMetrics> for DisplayMetrics {
    fn from(m: &DerivedMetrics) -> Self {
        Self {
            response_rate: round_percent(m.response_rate),
            confirmation_rate: round_percent(m.confirmation_rate),
            attendance_rate: round_percent(m.attendance_rate),
            conversion_rate: round_percent(m.conversion_rate),
            roi: round_percent(m.roi),
            roi_gauge_fill: roi_gauge_fill(m.roi),
            total_expenses: format_currency(m.total_expenses),
            total_income: format_currency(m.total_income),
            expense_per_attendee: format_currency(m.expense_per_attendee),
            expense_per_appointment: format_currency(m.expense_per_appointment),
            expense_per_client: format_currency(m.expense_per_client),
            accumulated_income: format_currency(m.accumulated_income),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_percent() {
        assert_eq!(round_percent(7.142857), 7.1);
        assert_eq!(round_percent(7291.22868), 7291.2);
        assert_eq!(round_percent(66.66), 66.7);
        assert_eq!(round_percent(0.0), 0.0);
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(0.0), "$0.00");
        assert_eq!(format_currency(7872.02), "$7,872.02");
        assert_eq!(format_currency(581839.0), "$581,839.00");
        assert_eq!(format_currency(1234567.891), "$1,234,567.89");
        assert_eq!(format_currency(999.999), "$1,000.00");
        assert_eq!(format_currency(-50.5), "-$50.50");
    }

    #[test]
    fn test_gauge_clamp_leaves_roi_untouched() {
        assert_eq!(roi_gauge_fill(7291.2), 100.0);
        assert_eq!(roi_gauge_fill(150.0), 50.0);
        assert_eq!(roi_gauge_fill(-40.0), 0.0);

        let metrics = DerivedMetrics {
            response_rate: 0.6,
            confirmation_rate: 66.666,
            attendance_rate: 70.0,
            conversion_rate: 7.142857,
            total_expenses: 7872.02,
            total_income: 581839.0,
            roi: 7291.22868,
            expense_per_attendee: 281.1435,
            expense_per_appointment: 656.0016,
            expense_per_client: 3936.01,
            accumulated_income: 4908.39,
        };
        let display = DisplayMetrics::from(&metrics);
        assert_eq!(display.roi, 7291.2);
        assert_eq!(display.roi_gauge_fill, 100.0);
        assert_eq!(display.conversion_rate, 7.1);
        assert_eq!(display.expense_per_attendee, "$281.14");
        assert_eq!(metrics.roi, 7291.22868);
    }
}
