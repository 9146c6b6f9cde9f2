// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared fixtures for the HTTP API tests.
//!
//! Requests go straight into the router with `tower::ServiceExt::oneshot`;
//! mail and SMS use in-memory doubles so tests can inspect what was sent.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

use mint_crm_core::db;
use mint_crm_core::messaging::{MockMailer, MockSmsGateway};
use mint_crm_core::models::{NewUser, User, UserRole};
use mint_crm_server::auth::TokenType;
use mint_crm_server::{AppState, Config, create_router};

/// Skip the test when no database is configured.
macro_rules! skip_if_no_db {
    () => {
        if std::env::var("TEST_DATABASE_URL").is_err() {
            eprintln!("Skipping test: TEST_DATABASE_URL not set");
            return;
        }
    };
}

pub fn test_config(database_url: &str) -> Config {
    Config {
        database_url: database_url.to_string(),
        http_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        jwt_secret: "test-secret".to_string(),
        access_token_ttl: Duration::from_secs(3600),
        refresh_token_ttl: Duration::from_secs(7 * 24 * 3600),
        db_max_connections: 5,
        cors_origins: Vec::new(),
        media_dir: std::env::temp_dir().join(format!("mint-crm-test-{}", Uuid::new_v4().simple())),
        smtp: None,
        default_from_email: "noreply@test.mintcrm.local".to_string(),
        sms_base_url: None,
        sms_from_number: "SYSTEM".to_string(),
        sms_timeout: Duration::from_secs(5),
    }
}

/// Router over a real database with recording transports.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub mailer: Arc<MockMailer>,
    pub gateway: Arc<MockSmsGateway>,
}

impl TestApp {
    pub async fn new() -> Self {
        let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL not set");
        let pool = PgPool::connect(&url)
            .await
            .expect("Failed to connect to test database");
        mint_crm_core::migrations::run(&pool)
            .await
            .expect("Failed to run migrations");
        Self::with_pool(pool, &url)
    }

    /// A router whose pool never connects, for requests rejected before any
    /// query runs.
    pub fn offline() -> Self {
        let url = "postgres://nobody@127.0.0.1:1/none";
        let pool = sqlx::postgres::PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy(url)
            .expect("lazy pool");
        Self::with_pool(pool, url)
    }

    fn with_pool(pool: PgPool, url: &str) -> Self {
        let mailer = Arc::new(MockMailer::new());
        let gateway = Arc::new(MockSmsGateway::new());
        let state =
            AppState::with_transports(pool, test_config(url), mailer.clone(), gateway.clone());
        Self {
            router: create_router(state.clone()),
            state,
            mailer,
            gateway,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.state.pool
    }

    pub fn token(&self, user: &User) -> String {
        self.state
            .tokens
            .issue(user, TokenType::Access)
            .expect("Failed to issue token")
    }

    pub async fn user(&self, role: UserRole, phone: &str) -> User {
        db::users::create_user(
            self.pool(),
            &NewUser {
                email: unique_email(role.as_str()),
                password_hash: "not-a-real-hash".into(),
                first_name: "Test".into(),
                last_name: role.label().into(),
                role,
                phone: phone.into(),
                is_active: true,
                ..Default::default()
            },
        )
        .await
        .expect("Failed to create user")
    }

    /// Send a request and return the status with the parsed JSON body
    /// (`Value::Null` when the body is empty or not JSON).
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let (status, bytes) = self.send_raw(request).await;
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    pub async fn send_raw(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        (status, bytes.to_vec())
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub fn media_dir(&self) -> PathBuf {
        self.state.media_dir.clone()
    }
}

pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@test.mintcrm.local", Uuid::new_v4().simple())
}
