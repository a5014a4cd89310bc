//! Seminar marketing analytics: event storage, derived KPIs and roll-ups.

pub mod api;
pub mod config;
pub mod error;
pub mod filter;
pub mod formatting;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod store;

#[cfg(test)]
mod tests;
