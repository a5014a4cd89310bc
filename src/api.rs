//! HTTP surface over the event store and the metrics engine.

use std::sync::{Arc, Mutex};

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{MetricsError, StoreError};
use crate::filter::EventFilter;
use crate::formatting::DisplayMetrics;
use crate::metrics::{self, GroupField, IncomeOptions, MetricField};
use crate::models::{ApiResponse, EventInput, EventRecord, QueryResult};
use crate::store::EventStore;

pub type SharedStore = Arc<Mutex<dyn EventStore + Send>>;

/// Handler state. The store is injected so tests can run against memory.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new<S>(store: S, config: AppConfig) -> Self
    where
        S: EventStore + Send + 'static,
    {
        Self {
            store: Arc::new(Mutex::new(store)),
            config: Arc::new(config),
        }
    }

    fn with_store<T>(
        &self,
        f: impl FnOnce(&mut dyn EventStore) -> Result<T, StoreError>,
    ) -> Result<T, ApiError> {
        let mut guard = self
            .store
            .lock()
            .map_err(|_| ApiError::Internal("event store lock poisoned".to_string()))?;
        Ok(f(&mut *guard)?)
    }

    fn filtered_events(&self, filter: &EventFilter) -> Result<Vec<EventRecord>, ApiError> {
        let events = self.with_store(|store| store.list())?;
        Ok(filter.apply(events))
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Invalid(#[from] MetricsError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid query string: {0}")]
    BadQuery(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Invalid(err) => {
                warn!(error = %err, "rejected event input");
                StatusCode::BAD_REQUEST
            }
            ApiError::BadQuery(msg) => {
                warn!(error = %msg, "rejected query string");
                StatusCode::BAD_REQUEST
            }
            ApiError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Store(err) => {
                error!(error = %err, "event store failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Internal(msg) => {
                error!(error = %msg, "internal failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ApiResponse {
            status: "error".to_string(),
            message: self.to_string(),
            data: None,
        };
        (status, Json(body)).into_response()
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(value)
        .map_err(|err| ApiError::Internal(format!("response serialization failed: {err}")))
}

/// `Query` whose rejection renders as an [`ApiResponse`] error body.
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::try_from_uri(&parts.uri)
            .map_err(|rejection| ApiError::BadQuery(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Per-request override of the configured income policy.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct IncomeQuery {
    pub include_planning_fees: Option<bool>,
}

impl IncomeQuery {
    fn resolve(&self, config: &AppConfig) -> IncomeOptions {
        IncomeOptions {
            include_planning_fees: self
                .include_planning_fees
                .unwrap_or(config.income.include_planning_fees),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IncomeVariant {
    GrossProduction,
    #[default]
    AdvisoryFee,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct IncomeVariantQuery {
    pub variant: IncomeVariant,
}

#[derive(Debug, Deserialize)]
pub struct HeatmapQuery {
    pub row: GroupField,
    pub col: GroupField,
    pub metric: MetricField,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/events", get(list_events).post(create_event))
        .route(
            "/events/:id",
            get(get_event).put(update_event).delete(delete_event),
        )
        .route("/events/:id/metrics", get(event_metrics))
        .route("/events/:id/income", get(event_income))
        .route("/analytics/summary", get(summary))
        .route("/analytics/heatmap", get(heatmap))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root() -> &'static str {
    "Seminar Metrics API v0.1.0"
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn list_events(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<EventFilter>,
) -> Result<Json<Vec<EventRecord>>, ApiError> {
    Ok(Json(state.filtered_events(&filter)?))
}

async fn create_event(
    State(state): State<AppState>,
    Json(input): Json<EventInput>,
) -> Result<(StatusCode, Json<ApiResponse>), ApiError> {
    let record = input.into_record(Uuid::new_v4())?;
    state.with_store(|store| store.insert(&record))?;
    info!(id = %record.id, topic = %record.topic, status = record.status.as_str(), "event created");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            status: "success".to_string(),
            message: format!("Event created: {}", record.id),
            data: Some(to_json(&record)?),
        }),
    ))
}

async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EventRecord>, ApiError> {
    Ok(Json(state.with_store(|store| store.get(id))?))
}

async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<EventInput>,
) -> Result<Json<ApiResponse>, ApiError> {
    let record = input.into_record(id)?;
    state.with_store(|store| store.update(&record))?;
    info!(%id, status = record.status.as_str(), "event updated");

    Ok(Json(ApiResponse {
        status: "success".to_string(),
        message: format!("Event updated: {id}"),
        data: Some(to_json(&record)?),
    }))
}

async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse>, ApiError> {
    state.with_store(|store| store.delete(id))?;
    info!(%id, "event deleted");

    Ok(Json(ApiResponse {
        status: "success".to_string(),
        message: format!("Event deleted: {id}"),
        data: None,
    }))
}

async fn event_metrics(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ApiQuery(income): ApiQuery<IncomeQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let event = state.with_store(|store| store.get(id))?;
    let derived = metrics::compute_event_metrics(&event, income.resolve(&state.config))?;

    Ok(Json(serde_json::json!({
        "event": event,
        "metrics": derived,
        "display": DisplayMetrics::from(&derived),
    })))
}

async fn event_income(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ApiQuery(query): ApiQuery<IncomeVariantQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let event = state.with_store(|store| store.get(id))?;
    let (variant, income) = match query.variant {
        IncomeVariant::GrossProduction => (
            "gross-production",
            metrics::accumulated_income_gross_production(&event),
        ),
        IncomeVariant::AdvisoryFee => (
            "advisory-fee",
            metrics::accumulated_income_with_advisory_fee(&event),
        ),
    };

    Ok(Json(serde_json::json!({
        "id": id,
        "variant": variant,
        "income": income,
    })))
}

async fn summary(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<EventFilter>,
    ApiQuery(income): ApiQuery<IncomeQuery>,
) -> Result<Json<QueryResult>, ApiError> {
    let events = state.filtered_events(&filter)?;
    let aggregate = metrics::aggregate(&events, income.resolve(&state.config))?;

    Ok(Json(QueryResult {
        query: "summary".to_string(),
        result_type: "aggregate".to_string(),
        data: to_json(&aggregate)?,
    }))
}

async fn heatmap(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<EventFilter>,
    ApiQuery(income): ApiQuery<IncomeQuery>,
    ApiQuery(grid): ApiQuery<HeatmapQuery>,
) -> Result<Json<QueryResult>, ApiError> {
    let events = state.filtered_events(&filter)?;
    let rollup = metrics::grouped_rollup(
        &events,
        grid.row,
        grid.col,
        grid.metric,
        income.resolve(&state.config),
    )?;

    Ok(Json(QueryResult {
        query: "heatmap".to_string(),
        result_type: "grouped".to_string(),
        data: to_json(&rollup)?,
    }))
}
