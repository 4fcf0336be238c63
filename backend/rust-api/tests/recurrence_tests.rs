use axum::http::StatusCode;
use serde_json::{json, Value};

mod common;

use common::{admin_token, create_test_app, student_token, TestApp};

async fn create_session(app: &TestApp, topic: &str, date: &str, recurs: bool) -> Value {
    let (status, body) = app
        .send(
            "POST",
            "/admin/live-sessions",
            Some(&admin_token()),
            Some(json!({
                "topic": topic,
                "batch": "b1",
                "date": date,
                "time": "18:00",
                "recurs_weekly": recurs,
                "meeting_link": "https://meet.example.com/room"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body
}

#[tokio::test]
async fn test_materialize_recurrences_endpoint() {
    let app = create_test_app();
    let base = create_session(&app, "Async Rust", "2026-03-02", true).await;
    let uri = format!("/admin/live-sessions/{}/recurrences", base["id"].as_str().unwrap());

    let (status, body) = app
        .send("POST", &uri, Some(&admin_token()), Some(json!({ "weeks_ahead": 2 })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let dates: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["date"].as_str().unwrap())
        .collect();
    assert_eq!(dates, vec!["2026-03-09", "2026-03-16"]);
    assert!(body.as_array().unwrap().iter().all(|s| s["status"] == "scheduled"));

    // Re-running creates nothing new
    let (_, body) = app
        .send("POST", &uri, Some(&admin_token()), Some(json!({ "weeks_ahead": 2 })))
        .await;
    assert_eq!(body, json!([]));

    let (_, listed) = app
        .send("GET", "/api/v1/live-sessions?batch=b1", Some(&student_token("u1")), None)
        .await;
    assert_eq!(listed.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_materialize_rejects_bad_requests() {
    let app = create_test_app();
    let once = create_session(&app, "Kickoff", "2026-03-02", false).await;
    let uri = format!("/admin/live-sessions/{}/recurrences", once["id"].as_str().unwrap());

    let (status, _) = app
        .send("POST", &uri, Some(&admin_token()), Some(json!({ "weeks_ahead": 1 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            "POST",
            "/admin/live-sessions/missing/recurrences",
            Some(&admin_token()),
            Some(json!({ "weeks_ahead": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sweep_endpoint_is_idempotent() {
    let app = create_test_app();
    create_session(&app, "Async Rust", "2026-03-02", true).await;
    create_session(&app, "Traits", "2026-03-04", true).await;
    create_session(&app, "Later", "2026-05-01", true).await;

    let uri = "/admin/live-sessions/sweep?now=2026-03-05T09:00:00Z";
    let (status, report) = app.send("POST", uri, Some(&admin_token()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["scanned"], 2);
    assert_eq!(report["series"], 2);
    assert_eq!(report["created"].as_array().unwrap().len(), 2);

    let (_, report) = app.send("POST", uri, Some(&admin_token()), None).await;
    assert_eq!(report["created"], json!([]));

    let (_, listed) = app
        .send(
            "GET",
            "/api/v1/live-sessions?batch=b1&from=2026-03-05",
            Some(&student_token("u1")),
            None,
        )
        .await;
    let dates: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["date"].as_str().unwrap())
        .collect();
    assert_eq!(dates, vec!["2026-03-09", "2026-03-11", "2026-05-01"]);
}

#[tokio::test]
async fn test_duplicate_session_and_status_flow() {
    let app = create_test_app();
    let session = create_session(&app, "Async Rust", "2026-03-02", true).await;

    let (status, body) = app
        .send(
            "POST",
            "/admin/live-sessions",
            Some(&admin_token()),
            Some(json!({
                "topic": "Async Rust",
                "batch": "b1",
                "date": "2026-03-02",
                "time": "09:00",
                "meeting_link": "https://meet.example.com/other"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], 409);

    let uri = format!("/admin/live-sessions/{}/status", session["id"].as_str().unwrap());
    let (status, body) = app
        .send("PUT", &uri, Some(&admin_token()), Some(json!({ "status": "cancelled" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");
    assert_eq!(body["date"], "2026-03-02");

    let (status, _) = app
        .send("PUT", &uri, Some(&admin_token()), Some(json!({ "status": "active" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_sweep_keeps_both_weekly_slots_of_a_topic() {
    let app = create_test_app();
    create_session(&app, "Rust", "2026-03-02", true).await;
    create_session(&app, "Rust", "2026-03-05", true).await;

    let mut created = Vec::new();
    for now in ["2026-03-06", "2026-03-10", "2026-03-13", "2026-03-17"] {
        let uri = format!("/admin/live-sessions/sweep?now={}T12:00:00Z", now);
        let (status, report) = app.send("POST", &uri, Some(&admin_token()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["series"], 2);
        created.extend(
            report["created"]
                .as_array()
                .unwrap()
                .iter()
                .map(|s| s["date"].as_str().unwrap().to_string()),
        );
    }
    created.sort();

    assert_eq!(
        created,
        vec!["2026-03-09", "2026-03-12", "2026-03-16", "2026-03-19", "2026-03-23"]
    );
}
