//! Profile, referral and credits integration tests.

mod common;

use axum::http::header::AUTHORIZATION;
use serde_json::json;

use common::{x_api_key, TestHarness};
use nutricoach_core::UserId;
use nutricoach_store::Store;

#[tokio::test]
async fn first_visit_registers_user() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get("/v1/profile")
        .add_header(AUTHORIZATION, harness.user_auth())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "expired");
    assert_eq!(body["has_access"], false);
    assert_eq!(body["is_admin"], false);
    assert_eq!(body["free_lab_available"], true);
    assert_eq!(body["labs_credits"], 0);
    assert_eq!(body["invited_count"], 0);
    assert_eq!(body["ref_code"].as_str().map(str::len), Some(8));
    assert_eq!(body["first_name"], "Test");

    assert!(harness.store.subscription(harness.user_id).await.unwrap().is_some());
}

#[tokio::test]
async fn profile_reflects_trial_from_bot_start() {
    let harness = TestHarness::new();

    harness
        .server
        .post("/v1/bot/start")
        .add_header(x_api_key(), TestHarness::service_key())
        .json(&json!({ "user_id": harness.user_id, "username": "tester" }))
        .await
        .assert_status_ok();

    let body: serde_json::Value = harness
        .server
        .get("/v1/profile")
        .add_header(AUTHORIZATION, harness.user_auth())
        .await
        .json();

    assert_eq!(body["status"], "trial");
    assert_eq!(body["has_access"], true);
    assert!(body["free_until"].is_string());
    assert!(body["expires_at"].is_null());
}

#[tokio::test]
async fn admin_profile_has_access_without_subscription() {
    let harness = TestHarness::new();

    let body: serde_json::Value = harness
        .server
        .get("/v1/profile")
        .add_header(AUTHORIZATION, TestHarness::admin_auth())
        .await
        .json();

    assert_eq!(body["is_admin"], true);
    assert_eq!(body["has_access"], true);
    assert_eq!(body["status"], "expired");
}

#[tokio::test]
async fn referral_endpoint_is_stable() {
    let harness = TestHarness::new();

    let first: serde_json::Value = harness
        .server
        .get("/v1/referral")
        .add_header(AUTHORIZATION, harness.user_auth())
        .await
        .json();
    let second: serde_json::Value = harness
        .server
        .get("/v1/referral")
        .add_header(AUTHORIZATION, harness.user_auth())
        .await
        .json();

    assert_eq!(first["ref_code"], second["ref_code"]);
    assert_eq!(first["invited_count"], 0);
    assert_eq!(first["bonus_days"], 7);
}

#[tokio::test]
async fn credits_endpoint_reports_balance() {
    let harness = TestHarness::new();
    harness.store.grant_credits(harness.user_id, 3).await.unwrap();

    let response = harness
        .server
        .get("/v1/labs/credits")
        .add_header(AUTHORIZATION, harness.user_auth())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["labs_credits"], 3);
    assert_eq!(body["free_lab_available"], true);
}

#[tokio::test]
async fn users_do_not_see_each_other() {
    let harness = TestHarness::new();
    harness.store.grant_credits(UserId::new(2002), 5).await.unwrap();

    let body: serde_json::Value = harness
        .server
        .get("/v1/labs/credits")
        .add_header(AUTHORIZATION, harness.user_auth())
        .await
        .json();

    assert_eq!(body["labs_credits"], 0);
}
