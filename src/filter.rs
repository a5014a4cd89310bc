//! Pre-processing applied to stored events before they reach the metrics
//! engine. The engine aggregates whatever it is given.

use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::metrics::total_expenses;
use crate::models::{EventRecord, EventStatus};

/// Minimum Jaro-Winkler similarity for a search term to match a word.
const FUZZY_THRESHOLD: f64 = 0.9;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Date,
    Topic,
    Location,
    Status,
    Attendees,
    Expenses,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Query-string filter shared by the listing and analytics endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EventFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub topic: Option<String>,
    pub location: Option<String>,
    pub status: Option<EventStatus>,
    /// Free-text search over topic, location, status and date.
    pub q: Option<String>,
    pub sort: Option<SortKey>,
    pub order: Option<SortOrder>,
}

impl EventFilter {
    pub fn matches(&self, event: &EventRecord) -> bool {
        if self.from.is_some_and(|from| event.date < from) {
            return false;
        }
        if self.to.is_some_and(|to| event.date > to) {
            return false;
        }
        if let Some(topic) = non_blank(&self.topic) {
            if !event.topic.eq_ignore_ascii_case(topic) {
                return false;
            }
        }
        if let Some(location) = non_blank(&self.location) {
            if !event.location.eq_ignore_ascii_case(location) {
                return false;
            }
        }
        if self.status.is_some_and(|status| event.status != status) {
            return false;
        }
        match non_blank(&self.q) {
            Some(q) => search_matches(event, q),
            None => true,
        }
    }

    /// Keep matching events and sort them. Sorting is stable, so ties keep
    /// their store order.
    pub fn apply(&self, events: Vec<EventRecord>) -> Vec<EventRecord> {
        let mut kept: Vec<EventRecord> = events.into_iter().filter(|e| self.matches(e)).collect();

        let key = self.sort.unwrap_or_default();
        let order = self.order.unwrap_or_default();
        kept.sort_by(|a, b| {
            let ord = compare(key, a, b);
            match order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
        kept
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn compare(key: SortKey, a: &EventRecord, b: &EventRecord) -> Ordering {
    match key {
        SortKey::Date => a.date.cmp(&b.date),
        SortKey::Topic => a.topic.to_lowercase().cmp(&b.topic.to_lowercase()),
        SortKey::Location => a.location.to_lowercase().cmp(&b.location.to_lowercase()),
        SortKey::Status => a.status.cmp(&b.status),
        SortKey::Attendees => a.attendees.cmp(&b.attendees),
        SortKey::Expenses => total_expenses(a).total_cmp(&total_expenses(b)),
    }
}

/// Every search term must hit some field as a substring. Terms without
/// digits may also match a near-spelling of an alphabetic word; dates and
/// numbers only match exactly.
fn search_matches(event: &EventRecord, query: &str) -> bool {
    let haystack = format!(
        "{} {} {} {}",
        event.topic,
        event.location,
        event.status.as_str(),
        event.date.format("%Y-%m-%d")
    )
    .to_lowercase();

    query.to_lowercase().split_whitespace().all(|term| {
        haystack.contains(term)
            || (!term.chars().any(|c| c.is_ascii_digit())
                && haystack
                    .split_whitespace()
                    .filter(|word| word.chars().all(char::is_alphabetic))
                    .any(|word| strsim::jaro_winkler(word, term) >= FUZZY_THRESHOLD))
    })
}
