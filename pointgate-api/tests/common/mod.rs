//! Common test utilities for integration tests
//!
//! These tests need a real PostgreSQL instance: set `TEST_DATABASE_URL` to
//! point at one. When the variable is unset, every test skips itself so
//! the suite stays green on machines without a database.
//!
//! Provided infrastructure:
//! - Test database setup (migrations run on connect)
//! - Test user creation with unique identities per test
//! - Bearer token generation
//! - Request helpers driving the full router

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use pointgate_api::app::{build_router, AppState};
use pointgate_api::config::{ApiConfig, Config, DatabaseConfig, JwtConfig, NotifyConfig, NotifyMode};
use pointgate_shared::auth::jwt::{create_token, Claims};
use pointgate_shared::auth::password::hash_password;
use pointgate_shared::models::user::{CreateUser, User};
use sqlx::PgPool;
use tower::Service as _;
use uuid::Uuid;

/// JWT secret used by every test
pub const TEST_JWT_SECRET: &str = "integration-test-secret-0123456789abcdef";

/// Test context containing all necessary resources
pub struct TestContext {
    pub db: PgPool,
    pub app: axum::Router,
    pub config: Config,
}

impl TestContext {
    /// Creates a test context, or None when no test database is configured
    pub async fn try_new() -> Option<Self> {
        let Ok(database_url) = std::env::var("TEST_DATABASE_URL") else {
            eprintln!("TEST_DATABASE_URL not set; skipping integration test");
            return None;
        };

        let db = PgPool::connect(&database_url)
            .await
            .expect("connect to test database");

        // Run migrations (path relative to Cargo.toml, not this file)
        sqlx::migrate!("../pointgate-shared/migrations")
            .run(&db)
            .await
            .expect("run migrations");

        let config = Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_origins: vec!["*".to_string()],
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: 5,
            },
            jwt: JwtConfig {
                secret: TEST_JWT_SECRET.to_string(),
            },
            notify: NotifyConfig {
                mode: NotifyMode::Log,
                endpoint: None,
                api_key: None,
                sender: None,
            },
        };

        let state = AppState::new(db.clone(), config.clone());
        let app = build_router(state);

        Some(TestContext { db, app, config })
    }

    /// Creates an email account with the given password, unique per call
    pub async fn create_email_user(&self, password: &str) -> User {
        let email = unique_email();
        User::create(
            &self.db,
            CreateUser {
                email: Some(email),
                phone: None,
                password_hash: hash_password(password).expect("hash password"),
            },
        )
        .await
        .expect("create test user")
    }

    /// Returns a bearer token for an account
    pub fn token_for(&self, user: &User) -> String {
        create_token(&Claims::new(user.id), &self.config.jwt.secret).expect("create token")
    }

    /// Returns an Authorization header value for an account
    pub fn auth_header(&self, user: &User) -> String {
        format!("Bearer {}", self.token_for(user))
    }

    /// Sends a POST with a JSON body, returns status and parsed body
    pub async fn post_json(
        &self,
        uri: &str,
        body: serde_json::Value,
        auth: Option<&str>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(auth) = auth {
            builder = builder.header("authorization", auth);
        }
        let request = builder.body(Body::from(body.to_string())).unwrap();

        self.send(request).await
    }

    /// Sends a GET, returns status and parsed body
    pub async fn get(&self, uri: &str, auth: Option<&str>) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(auth) = auth {
            builder = builder.header("authorization", auth);
        }
        let request = builder.body(Body::empty()).unwrap();

        self.send(request).await
    }

    /// Drives a request through the router
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.app.clone().call(request).await.unwrap();
        let status = response.status();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };

        (status, body)
    }
}

/// A unique email address for this test run
pub fn unique_email() -> String {
    format!("test-{}@example.com", Uuid::new_v4())
}

/// A unique phone number for this test run
pub fn unique_phone() -> String {
    // 15 digits, unique enough across concurrent tests
    let n: u128 = Uuid::new_v4().as_u128() % 1_000_000_000_000_000;
    format!("+{:015}", n)
}

/// A unique rule action for this test run
///
/// Cost rules have a unique index per enabled triple; unique actions keep
/// parallel tests from tripping over each other.
pub fn unique_action(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}
