//! Weight tracking integration tests.

mod common;

use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;

use nutricoach_store::Store;

use common::TestHarness;

#[tokio::test]
async fn recorded_weight_appears_in_history() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/weight")
        .add_header(AUTHORIZATION, harness.user_auth())
        .json(&json!({ "weight": 81.3 }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["weight"], 81.3);

    let response = harness
        .server
        .get("/v1/weight")
        .add_header(AUTHORIZATION, harness.user_auth())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["entries"].as_array().unwrap().len(), 1);
    assert_eq!(body["current_weight"], 81.3);
    assert_eq!(body["start_weight"], 81.3);
    assert_eq!(body["change"], 0.0);
}

#[tokio::test]
async fn history_window_and_change() {
    let harness = TestHarness::new();
    let now = Utc::now();
    for (weight, days_ago) in [(90.0, 60), (85.0, 20), (83.75, 2)] {
        harness
            .store
            .add_weight(harness.user_id, weight, now - Duration::days(days_ago))
            .await
            .unwrap();
    }

    let body: serde_json::Value = harness
        .server
        .get("/v1/weight")
        .add_query_param("days", 30)
        .add_header(AUTHORIZATION, harness.user_auth())
        .await
        .json();
    assert_eq!(body["entries"].as_array().unwrap().len(), 2);
    assert_eq!(body["entries"][0]["weight"], 83.75);
    assert_eq!(body["current_weight"], 83.75);
    assert_eq!(body["start_weight"], 85.0);
    assert_eq!(body["change"], -1.3);

    let body: serde_json::Value = harness
        .server
        .get("/v1/weight")
        .add_query_param("days", 90)
        .add_header(AUTHORIZATION, harness.user_auth())
        .await
        .json();
    assert_eq!(body["start_weight"], 90.0);
    assert_eq!(body["change"], -6.3);
}

#[tokio::test]
async fn empty_history_has_null_summary() {
    let harness = TestHarness::new();

    let body: serde_json::Value = harness
        .server
        .get("/v1/weight")
        .add_header(AUTHORIZATION, harness.user_auth())
        .await
        .json();
    assert_eq!(body["entries"], json!([]));
    assert!(body["current_weight"].is_null());
    assert!(body["change"].is_null());
}

#[tokio::test]
async fn implausible_weight_is_400() {
    let harness = TestHarness::new();

    for weight in [5.0, 301.0] {
        harness
            .server
            .post("/v1/weight")
            .add_header(AUTHORIZATION, harness.user_auth())
            .json(&json!({ "weight": weight }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn history_days_out_of_range_is_400() {
    let harness = TestHarness::new();

    for days in [0, 366] {
        harness
            .server
            .get("/v1/weight")
            .add_query_param("days", days)
            .add_header(AUTHORIZATION, harness.user_auth())
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn weight_requires_init_data() {
    let harness = TestHarness::new();

    harness
        .server
        .get("/v1/weight")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}
