#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use kinfeed::config::Config;
use kinfeed::db;
use kinfeed::routes;
use kinfeed::state::AppState;

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

/// A seeded user and the cookie header that authenticates as them
pub struct Session {
    pub id: i64,
    pub cookie: String,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_page_size(20)
    }

    pub fn with_page_size(per_page: u32) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let db_pool = db::create_pool(&temp_dir.path().join("test.db"))
            .expect("Failed to create test database");
        db::run_migrations(&db_pool).expect("Failed to run migrations");

        let mut config = Config::default();
        config.retry.delay_ms = 1;
        config.notifications.per_page = per_page;

        let state = AppState::new(db_pool, config);
        let router = routes::build_router(state.clone(), true);

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }

    pub async fn seed(&self, username: &str) -> Session {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/test/seed")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                serde_json::json!({ "username": username }).to_string(),
            ))
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .expect("seed should set a session cookie")
            .to_string();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let user: Value = serde_json::from_slice(&bytes).unwrap();

        Session {
            id: user["id"].as_i64().unwrap(),
            cookie,
        }
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        session: Option<&Session>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(session) = session {
            builder = builder.header(header::COOKIE, &session.cookie);
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
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        // Error bodies are plain text
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn get(&self, uri: &str, session: &Session) -> (StatusCode, Value) {
        self.call(Method::GET, uri, Some(session), None).await
    }

    pub async fn post(&self, uri: &str, session: &Session) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(session), None).await
    }

    pub async fn post_json(&self, uri: &str, session: &Session, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(session), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, session: &Session) -> (StatusCode, Value) {
        self.call(Method::DELETE, uri, Some(session), None).await
    }

    /// Create a post and return its id plus image ids
    pub async fn create_post(&self, author: &Session, content: &str, images: u32) -> (i64, Vec<i64>) {
        let (status, body) = self
            .post_json(
                "/posts",
                author,
                serde_json::json!({ "content": content, "imageCount": images }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create_post failed: {body}");

        let image_ids = body["imageIds"]
            .as_array()
            .unwrap()
            .iter()
            .map(|id| id.as_i64().unwrap())
            .collect();
        (body["id"].as_i64().unwrap(), image_ids)
    }
}
