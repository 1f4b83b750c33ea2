use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use db::DBService;
use serde_json::Value;
use ::test_support::TempDatabase;
use tower::ServiceExt;

use crate::{
    AppState,
    config::{AccessControlConfig, AccessControlMode, ApiToken, ServerConfig},
    http,
};

pub const TEST_TOKEN: &str = "sekrit";
pub const TEST_USER_ID: i64 = 7;

pub fn token_config() -> ServerConfig {
    ServerConfig {
        public_base_url: "http://localhost".to_string(),
        access_control: AccessControlConfig {
            mode: AccessControlMode::Token,
            tokens: vec![ApiToken {
                token: TEST_TOKEN.to_string(),
                user_id: TEST_USER_ID,
            }],
            anonymous_user_id: 0,
        },
        ..ServerConfig::default()
    }
}

/// A router backed by a fresh SQLite file; the file lives as long as the app.
pub struct TestApp {
    _database: TempDatabase,
    pub state: AppState,
    router: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(token_config()).await
    }

    pub async fn with_config(config: ServerConfig) -> Self {
        let database = TempDatabase::new().unwrap();
        let db = DBService::new(database.url()).await.unwrap();
        let state = AppState::new(db, config);
        let router = http::router(state.clone());
        Self {
            _database: database,
            state,
            router,
        }
    }

    /// Sends an authenticated request and returns the status with the decoded JSON body
    /// (`Value::Null` for empty bodies).
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {TEST_TOKEN}"));
        self.send(request, body).await
    }

    pub async fn send(
        &self,
        request: axum::http::request::Builder,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, None).await
    }
}
