#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use sea_orm::{ActiveModelTrait, Set};
use serde_json::{json, Value};
use stockroom_api::{
    app_router,
    auth::{AuthConfig, AuthService, Role},
    config::AppConfig,
    db,
    entities::user,
    events::{self, EventSender},
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";

/// Full router over a fresh in-memory SQLite database, with one admin and
/// one regular user already seeded.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub auth_service: Arc<AuthService>,
    pub admin_id: i32,
    pub user_id: i32,
    admin_token: String,
    user_token: String,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        // one connection: a single shared in-memory database
        Self::with_database("sqlite::memory:", 1).await
    }

    /// Same harness over an arbitrary database URL and requested pool size.
    pub async fn with_database(database_url: &str, max_connections: u32) -> Self {
        let mut cfg = AppConfig::new(
            database_url.to_string(),
            TEST_SECRET.to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = max_connections;
        cfg.db_min_connections = 1;
        cfg.db_acquire_timeout_secs = 30;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let admin_id = insert_user(&pool, "Alice Admin", "alice@stockroom.test", Role::Admin).await;
        let user_id = insert_user(&pool, "Uma User", "uma@stockroom.test", Role::User).await;

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let auth_service = Arc::new(AuthService::new(AuthConfig::new(
            cfg.jwt_secret.clone(),
            Duration::from_secs(cfg.jwt_expiration as u64),
        )));
        let admin_token = auth_service
            .issue_token(admin_id, Some("Alice Admin".into()), Role::Admin)
            .expect("admin token");
        let user_token = auth_service
            .issue_token(user_id, Some("Uma User".into()), Role::User)
            .expect("user token");

        let state = AppState::new(db_arc, cfg, event_sender);
        let router = app_router(state.clone(), auth_service.clone());

        Self {
            router,
            state,
            auth_service,
            admin_id,
            user_id,
            admin_token,
            user_token,
            _event_task: event_task,
        }
    }

    pub fn admin_token(&self) -> &str {
        &self.admin_token
    }

    pub fn user_token(&self) -> &str {
        &self.user_token
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn as_admin(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request(method, uri, body, Some(self.admin_token())).await
    }

    pub async fn as_user(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request(method, uri, body, Some(self.user_token())).await
    }

    /// Creates a product over HTTP and returns its id.
    pub async fn create_product(&self, name: &str) -> i32 {
        let response = self
            .as_user(
                Method::POST,
                "/api/v1/products",
                Some(json!({ "name": name, "model": "M-1" })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        data(response).await["id"].as_i64().expect("product id") as i32
    }

    /// Creates a sector and a person in it; returns the person id.
    pub async fn create_requester(&self, name: &str, sector: &str) -> i32 {
        let response = self
            .as_user(
                Method::POST,
                "/api/v1/sectors",
                Some(json!({ "name": sector })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let sector_id = data(response).await["id"].as_i64().expect("sector id");

        let response = self
            .as_user(
                Method::POST,
                "/api/v1/people",
                Some(json!({ "name": name, "sector_id": sector_id })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        data(response).await["id"].as_i64().expect("person id") as i32
    }

    pub async fn receive(&self, product_id: i32, quantity: i32) {
        let response = self
            .as_user(
                Method::POST,
                "/api/v1/stock/entries",
                Some(json!({
                    "product_id": product_id,
                    "quantity": quantity,
                    "unit_value": "10.00"
                })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    pub async fn stock_of(&self, product_id: i32) -> i64 {
        let response = self
            .as_user(
                Method::GET,
                &format!("/api/v1/stock/inventory/{}", product_id),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        data(response).await["current_stock"]
            .as_i64()
            .expect("current_stock")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

async fn insert_user(pool: &db::DbPool, name: &str, email: &str, role: Role) -> i32 {
    user::ActiveModel {
        name: Set(name.to_string()),
        email: Set(email.to_string()),
        role: Set(role.to_string()),
        ..Default::default()
    }
    .insert(pool)
    .await
    .expect("seed user")
    .id
}

pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

/// The `data` member of an `ApiResponse` envelope
pub async fn data(response: Response) -> Value {
    let mut body = body_json(response).await;
    body["data"].take()
}

pub fn exit_order(requester: i32, items: Value) -> Value {
    json!({
        "requester_person_id": requester,
        "ticket_number": "INC-2041",
        "ticket_link": "https://helpdesk.example/INC-2041",
        "reason": "onboarding",
        "delivery_date": "2024-06-03",
        "items": items
    })
}
