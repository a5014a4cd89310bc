use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::api::{router, AppState};
use crate::config::AppConfig;
use crate::store::SqliteEventStore;

fn app() -> Router {
    let store = SqliteEventStore::in_memory().unwrap();
    router(AppState::new(store, AppConfig::default()))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn seminar_form(topic: &str, location: &str, date: &str) -> Value {
    json!({
        "date": date,
        "location": location,
        "topic": topic,
        "advertisingCost": "$5,320.52",
        "foodVenueCost": "2551.50",
        "audienceTotal": "10,000",
        "registrantResponses": "60",
        "confirmations": "40",
        "attendees": "28",
        "appointments": "12",
        "clientsFromEvent": "2",
        "fixedAnnuityProduction": "80000",
        "lifeProduction": "11000",
        "aumTotal": "490839",
        "planningFeeCount": "2",
        "planningFeeRate": "1500",
    })
}

async fn create(app: &Router, form: Value) -> String {
    let (status, body) = send(app, Method::POST, "/events", Some(form)).await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_create_and_fetch_event() {
    let app = app();
    let id = create(&app, seminar_form("Retirement Income", "Scottsdale", "2024-03-14")).await;

    let (status, body) = send(&app, Method::GET, &format!("/events/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "complete");
    assert_eq!(body["advertisingCost"], json!(5320.52));
    assert_eq!(body["audienceTotal"], json!(10000));
}

#[tokio::test]
async fn test_blank_production_is_incomplete() {
    let app = app();
    let mut form = seminar_form("Tax Planning", "Mesa", "2024-02-20");
    for field in ["fixedAnnuityProduction", "lifeProduction", "aumTotal", "planningFeeCount"] {
        form[field] = json!("");
    }
    let id = create(&app, form).await;

    let (_, body) = send(&app, Method::GET, &format!("/events/{id}"), None).await;
    assert_eq!(body["status"], "incomplete");
}

#[tokio::test]
async fn test_non_numeric_input_rejected() {
    let app = app();
    let mut form = seminar_form("Retirement Income", "Scottsdale", "2024-03-14");
    form["attendees"] = json!("28a");

    let (status, body) = send(&app, Method::POST, "/events", Some(form)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("attendees"));

    let (_, listed) = send(&app, Method::GET, "/events", None).await;
    assert_eq!(listed, json!([]));
}

#[tokio::test]
async fn test_event_metrics_endpoint() {
    let app = app();
    let id = create(&app, seminar_form("Retirement Income", "Scottsdale", "2024-03-14")).await;

    let (status, body) = send(&app, Method::GET, &format!("/events/{id}/metrics"), None).await;
    assert_eq!(status, StatusCode::OK);
    let roi = body["metrics"]["roi"].as_f64().unwrap();
    assert!((roi - (581839.0 - 7872.02) / 7872.02 * 100.0).abs() < 1e-6);
    assert_eq!(body["display"]["roi"], json!(7291.2));
    assert_eq!(body["display"]["conversionRate"], json!(7.1));
    assert_eq!(body["display"]["roiGaugeFill"], json!(100.0));
    assert_eq!(body["display"]["totalExpenses"], "$7,872.02");

    let (_, with_fees) = send(
        &app,
        Method::GET,
        &format!("/events/{id}/metrics?include_planning_fees=true"),
        None,
    )
    .await;
    let income = with_fees["metrics"]["totalIncome"].as_f64().unwrap();
    assert!((income - 584839.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_income_variants_endpoint() {
    let app = app();
    let id = create(&app, seminar_form("Retirement Income", "Scottsdale", "2024-03-14")).await;

    let (_, gross) = send(
        &app,
        Method::GET,
        &format!("/events/{id}/income?variant=gross-production"),
        None,
    )
    .await;
    assert_eq!(gross["income"].as_f64().unwrap(), 581839.0);

    let (_, advisory) = send(&app, Method::GET, &format!("/events/{id}/income"), None).await;
    assert_eq!(advisory["variant"], "advisory-fee");
    assert!((advisory["income"].as_f64().unwrap() - (4908.39 + 3000.0)).abs() < 1e-6);
}

#[tokio::test]
async fn test_update_and_delete_event() {
    let app = app();
    let id = create(&app, seminar_form("Retirement Income", "Scottsdale", "2024-03-14")).await;

    let mut form = seminar_form("Retirement Income", "Scottsdale", "2024-03-14");
    form["attendees"] = json!("30");
    let (status, _) = send(&app, Method::PUT, &format!("/events/{id}"), Some(form)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, Method::GET, &format!("/events/{id}"), None).await;
    assert_eq!(body["attendees"], json!(30));

    let (status, _) = send(&app, Method::DELETE, &format!("/events/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::GET, &format!("/events/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_summary_respects_filters() {
    let app = app();
    create(&app, seminar_form("Retirement Income", "Scottsdale", "2024-03-14")).await;
    let mut small = seminar_form("Tax Planning", "Mesa", "2024-04-02");
    small["attendees"] = json!("10");
    small["clientsFromEvent"] = json!("1");
    create(&app, small).await;

    let (status, body) = send(&app, Method::GET, "/analytics/summary", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resultType"], "aggregate");
    assert!(body.get("result_type").is_none());
    assert_eq!(body["data"]["totalEvents"], json!(2));
    assert_eq!(body["data"]["totalAttendees"], json!(38));
    assert_eq!(body["data"]["totalClients"], json!(3));

    let (_, body) = send(&app, Method::GET, "/analytics/summary?location=mesa", None).await;
    assert_eq!(body["data"]["totalEvents"], json!(1));
    assert!((body["data"]["avgConversionRate"].as_f64().unwrap() - 10.0).abs() < 1e-9);

    let (_, body) = send(&app, Method::GET, "/analytics/summary?from=2025-01-01", None).await;
    assert_eq!(body["data"]["totalEvents"], json!(0));
    assert_eq!(body["data"]["avgRoi"], json!(0.0));
    assert_eq!(body["data"]["clientAcquisitionCost"], json!(0.0));
}

#[tokio::test]
async fn test_heatmap_marks_empty_cells_null() {
    let app = app();
    create(&app, seminar_form("Retirement Income", "Scottsdale", "2024-03-14")).await;
    create(&app, seminar_form("Tax Planning", "Mesa", "2024-04-02")).await;

    let (status, body) = send(
        &app,
        Method::GET,
        "/analytics/heatmap?row=topic&col=location&metric=attendees",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["rows"], json!(["Retirement Income", "Tax Planning"]));
    assert_eq!(body["data"]["columns"], json!(["Mesa", "Scottsdale"]));
    assert_eq!(body["data"]["cells"], json!([[null, 28.0], [28.0, null]]));

    let (status, _) = send(&app, Method::GET, "/analytics/heatmap?row=topic", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bad_query_string_returns_json_error() {
    let app = app();
    for uri in [
        "/events?status=foo",
        "/events?from=",
        "/analytics/summary?include_planning_fees=maybe",
        "/analytics/heatmap?row=topic",
    ] {
        let (status, body) = send(&app, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["status"], "error", "{uri}");
        assert!(body["message"].as_str().unwrap().starts_with("invalid query string"));
    }
}

#[tokio::test]
async fn test_broken_funnel_rejected() {
    let app = app();
    let mut form = seminar_form("Retirement Income", "Scottsdale", "2024-03-14");
    form["audienceTotal"] = json!("10");
    form["registrantResponses"] = json!("500");
    form["confirmations"] = json!("900");

    let (status, body) = send(&app, Method::POST, "/events", Some(form)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("registrantResponses"));
}
