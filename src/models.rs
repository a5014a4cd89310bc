use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MetricsError;

/// Whether any financial production has been reported for an event yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Incomplete,
    Complete,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incomplete => "incomplete",
            Self::Complete => "complete",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "incomplete" => Some(Self::Incomplete),
            "complete" => Some(Self::Complete),
            _ => None,
        }
    }
}

/// One seminar occurrence with its marketing funnel and production figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub id: Uuid,
    pub date: NaiveDate,
    pub location: String,
    pub topic: String,
    pub advertising_cost: f64,
    pub food_venue_cost: f64,
    pub audience_total: u32,
    pub registrant_responses: u32,
    pub confirmations: u32,
    pub attendees: u32,
    pub appointments: u32,
    pub clients_from_event: u32,
    pub fixed_annuity_production: f64,
    pub life_production: f64,
    pub aum_total: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planning_fee_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planning_fee_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annuity_premium: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub life_insurance_premium: Option<f64>,
    pub status: EventStatus,
}

impl EventRecord {
    /// Fee revenue from financial plans sold; zero unless both count and rate are known.
    pub fn planning_fee_revenue(&self) -> f64 {
        match (self.planning_fee_count, self.planning_fee_rate) {
            (Some(count), Some(rate)) => f64::from(count) * rate,
            _ => 0.0,
        }
    }
}

/// Event payload as submitted by the data-entry and edit forms.
///
/// Every numeric field arrives as text. Currency may carry `$` and thousands
/// separators. Blank optional fields are treated as absent.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventInput {
    pub date: String,
    pub location: String,
    pub topic: String,
    pub advertising_cost: String,
    pub food_venue_cost: String,
    pub audience_total: String,
    pub registrant_responses: String,
    pub confirmations: String,
    pub attendees: String,
    pub appointments: Option<String>,
    pub clients_from_event: Option<String>,
    pub fixed_annuity_production: Option<String>,
    pub life_production: Option<String>,
    pub aum_total: Option<String>,
    pub planning_fee_count: Option<String>,
    pub planning_fee_rate: Option<String>,
    pub annuity_premium: Option<String>,
    pub life_insurance_premium: Option<String>,
}

impl EventInput {
    /// Parse the form into a typed record, deriving `status` from which
    /// production fields were filled in.
    pub fn into_record(self, id: Uuid) -> Result<EventRecord, MetricsError> {
        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d")
            .map_err(|_| {
                MetricsError::invalid("date", format!("{:?} is not YYYY-MM-DD", self.date))
            })?;

        let fixed_annuity_production =
            parse_optional_currency("fixedAnnuityProduction", &self.fixed_annuity_production)?;
        let life_production = parse_optional_currency("lifeProduction", &self.life_production)?;
        let aum_total = parse_optional_currency("aumTotal", &self.aum_total)?;
        let planning_fee_count =
            parse_optional_count("planningFeeCount", &self.planning_fee_count)?;

        let status = if fixed_annuity_production.is_some()
            || life_production.is_some()
            || aum_total.is_some()
            || planning_fee_count.is_some()
        {
            EventStatus::Complete
        } else {
            EventStatus::Incomplete
        };

        let audience_total = parse_count("audienceTotal", &self.audience_total)?;
        let registrant_responses = parse_count("registrantResponses", &self.registrant_responses)?;
        let confirmations = parse_count("confirmations", &self.confirmations)?;
        if registrant_responses > audience_total {
            return Err(MetricsError::invalid(
                "registrantResponses",
                format!("{registrant_responses} exceeds audienceTotal {audience_total}"),
            ));
        }
        if confirmations > registrant_responses {
            return Err(MetricsError::invalid(
                "confirmations",
                format!("{confirmations} exceeds registrantResponses {registrant_responses}"),
            ));
        }

        Ok(EventRecord {
            id,
            date,
            location: self.location.trim().to_string(),
            topic: self.topic.trim().to_string(),
            advertising_cost: parse_currency("advertisingCost", &self.advertising_cost)?,
            food_venue_cost: parse_currency("foodVenueCost", &self.food_venue_cost)?,
            audience_total,
            registrant_responses,
            confirmations,
            attendees: parse_count("attendees", &self.attendees)?,
            appointments: parse_optional_count("appointments", &self.appointments)?.unwrap_or(0),
            clients_from_event: parse_optional_count("clientsFromEvent", &self.clients_from_event)?
                .unwrap_or(0),
            fixed_annuity_production: fixed_annuity_production.unwrap_or(0.0),
            life_production: life_production.unwrap_or(0.0),
            aum_total: aum_total.unwrap_or(0.0),
            planning_fee_count,
            planning_fee_rate: parse_optional_currency("planningFeeRate", &self.planning_fee_rate)?,
            annuity_premium: parse_optional_currency("annuityPremium", &self.annuity_premium)?,
            life_insurance_premium: parse_optional_currency(
                "lifeInsurancePremium",
                &self.life_insurance_premium,
            )?,
            status,
        })
    }
}

fn parse_currency(field: &'static str, raw: &str) -> Result<f64, MetricsError> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();

    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
        _ => Err(MetricsError::invalid(
            field,
            format!("{raw:?} is not a non-negative amount"),
        )),
    }
}

fn parse_count(field: &'static str, raw: &str) -> Result<u32, MetricsError> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    cleaned
        .parse::<u32>()
        .map_err(|_| MetricsError::invalid(field, format!("{raw:?} is not a whole number")))
}

fn parse_optional_currency(
    field: &'static str,
    raw: &Option<String>,
) -> Result<Option<f64>, MetricsError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_currency(field, value).map(Some),
    }
}

fn parse_optional_count(
    field: &'static str,
    raw: &Option<String>,
) -> Result<Option<u32>, MetricsError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_count(field, value).map(Some),
    }
}

/// Per-event KPIs, recomputed on every read.
///
/// Rates and ROI are percentages at full precision. Currency is unrounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedMetrics {
    pub response_rate: f64,
    pub confirmation_rate: f64,
    pub attendance_rate: f64,
    pub conversion_rate: f64,
    pub total_expenses: f64,
    pub total_income: f64,
    pub roi: f64,
    pub expense_per_attendee: f64,
    pub expense_per_appointment: f64,
    pub expense_per_client: f64,
    pub accumulated_income: f64,
}

/// Portfolio-level roll-up over whatever events the caller passed in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateMetrics {
    pub total_events: usize,
    pub total_attendees: u64,
    pub total_clients: u64,
    pub total_revenue: f64,
    pub total_expenses: f64,
    pub avg_roi: f64,
    pub avg_conversion_rate: f64,
    pub client_acquisition_cost: f64,
}

/// API Response
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

/// Query result
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub query: String,
    pub result_type: String,
    pub data: serde_json::Value,
}
