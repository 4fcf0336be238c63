#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use learnhub_api::{
    config::{Config, LeaderboardSettings, RecurrenceSettings, StoreBackend, StoreConfig},
    create_router,
    middlewares::auth::{JwtClaims, JwtService},
    models::course::{Course, Item, Section},
    services::AppState,
    store::{MemoryStore, Store},
};

pub const JWT_SECRET: &str = "integration-test-secret";
pub const METRICS_AUTH: &str = "scraper:s3cret";

pub struct TestApp {
    pub router: Router,
    pub store: Store,
    pub backend: MemoryStore,
}

pub fn test_config() -> Config {
    Config {
        bind_addr: "127.0.0.1:0".to_string(),
        store: StoreConfig {
            backend: StoreBackend::Memory,
            mongo_uri: String::new(),
            mongo_database: String::new(),
        },
        jwt_secret: JWT_SECRET.to_string(),
        metrics_auth: METRICS_AUTH.to_string(),
        recurrence: RecurrenceSettings::default(),
        leaderboard: LeaderboardSettings::default(),
    }
}

/// Router over a fresh in-memory store, wired exactly like the server.
pub fn create_test_app() -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let backend = MemoryStore::new();
    let store = Store::from_backend(backend.clone());
    let state = Arc::new(AppState::new(test_config(), store.clone()));

    TestApp {
        router: create_router(state),
        store,
        backend,
    }
}

pub fn token(user_id: &str, role: &str, batch: Option<&str>) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = JwtClaims {
        sub: user_id.to_string(),
        role: role.to_string(),
        batch: batch.map(str::to_string),
        exp: (now + 3600) as usize,
        iat: now as usize,
    };
    JwtService::new(JWT_SECRET).generate_token(&claims).unwrap()
}

pub fn student_token(user_id: &str) -> String {
    token(user_id, "student", Some("b1"))
}

pub fn admin_token() -> String {
    token("admin-1", "admin", None)
}

impl TestApp {
    /// Sends a request and returns the status with the body parsed as JSON
    /// (`Value::Null` for an empty or non-JSON body).
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    /// Inserts a course with one section holding `item_ids`.
    pub async fn seed_course(&self, course_id: &str, item_ids: &[&str]) {
        let mut course = Course::new(
            course_id.to_string(),
            format!("Course {}", course_id),
            chrono::Utc::now(),
        );
        course.sections.push(Section {
            id: "s1".to_string(),
            title: "Week 1".to_string(),
            items: item_ids
                .iter()
                .map(|id| Item {
                    id: id.to_string(),
                    title: format!("Lecture {}", id),
                    media_url: format!("https://cdn.example.com/{}.mp4", id),
                    duration_seconds: 600,
                })
                .collect(),
        });
        self.store.courses.insert_course(&course).await.unwrap();
    }
}
