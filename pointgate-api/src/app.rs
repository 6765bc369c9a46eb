/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use pointgate_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config);
/// let app = pointgate_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::{Config, NotifyMode},
    error::ApiError,
};
use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, patch, post},
    Router,
};
use pointgate_shared::{
    auth::jwt,
    codes::CodeIssuer,
    ledger::PointsLedger,
    models::user::User,
    notify::{HttpNotifier, LogNotifier, Notifier},
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Verification code issuer (persists codes, dispatches notifications)
    pub codes: Arc<CodeIssuer>,

    /// Points ledger (balance mutations, transaction history, recharge)
    pub ledger: Arc<PointsLedger>,
}

impl AppState {
    /// Creates new application state
    ///
    /// Selects the notifier implementation from configuration: the log
    /// sink for development, the HTTP gateway for production.
    pub fn new(db: PgPool, config: Config) -> Self {
        let notifier: Arc<dyn Notifier> = match config.notify.mode {
            NotifyMode::Log => Arc::new(LogNotifier),
            NotifyMode::Http => Arc::new(HttpNotifier::new(
                config.notify.endpoint.clone().unwrap_or_default(),
                config.notify.api_key.clone().unwrap_or_default(),
                config.notify.sender.clone().unwrap_or_default(),
            )),
        };

        Self {
            db: db.clone(),
            codes: Arc::new(CodeIssuer::new(db.clone(), notifier)),
            ledger: Arc::new(PointsLedger::new(db)),
            config: Arc::new(config),
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                          # Health check (public)
/// └── /v1/                             # API v1 (versioned)
///     ├── /auth/                       # Authentication endpoints
///     │   ├── POST /register_with_code # Register with email code
///     │   ├── POST /register/email/code# Send registration code
///     │   ├── POST /password/forgot    # Request reset code
///     │   ├── POST /password/reset     # Confirm reset with code
///     │   ├── POST /phone/code         # Send phone login code
///     │   ├── POST /phone/login        # Passwordless phone login
///     │   ├── POST /login              # Password login
///     │   └── GET  /me                 # Current account (authenticated)
///     ├── /points/                     # Points endpoints
///     │   ├── GET  /balance            # (authenticated)
///     │   ├── POST /consume            # (authenticated)
///     │   ├── GET  /transactions       # (authenticated)
///     │   ├── GET  /recharge-plans     # Public catalog
///     │   └── POST /recharge           # (authenticated)
///     └── /admin/                      # Superuser-only management
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Logging (tower-http TraceLayer)
/// 2. CORS (tower-http CorsLayer)
/// 3. Authentication (per-route-group basis)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    // Health check (public, no auth)
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Auth routes (public, no auth required)
    let auth_public = Router::new()
        .route("/register_with_code", post(routes::auth::register_with_code))
        .route("/register/email/code", post(routes::auth::send_register_code))
        .route("/password/forgot", post(routes::auth::forgot_password))
        .route("/password/reset", post(routes::auth::reset_password))
        .route("/phone/code", post(routes::auth::send_phone_code))
        .route("/phone/login", post(routes::auth::phone_login))
        .route("/login", post(routes::auth::login));

    // Current-account route (requires bearer token)
    let auth_private = Router::new()
        .route("/me", get(routes::auth::me))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            bearer_auth_layer,
        ));

    // Points routes; the recharge-plan catalog is public, the rest
    // requires a bearer token
    let points_private = Router::new()
        .route("/balance", get(routes::points::balance))
        .route("/consume", post(routes::points::consume))
        .route("/transactions", get(routes::points::transactions))
        .route("/recharge", post(routes::points::recharge))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            bearer_auth_layer,
        ));

    let points_public =
        Router::new().route("/recharge-plans", get(routes::points::recharge_plans));

    // Admin routes (bearer token + superuser flag)
    let admin_routes = Router::new()
        .route("/users", get(routes::admin::list_users))
        .route("/points/rules", get(routes::admin::list_rules))
        .route("/points/rules", post(routes::admin::create_rule))
        .route("/points/rules/:id", patch(routes::admin::update_rule))
        .route("/recharge-plans", get(routes::admin::list_plans))
        .route("/recharge-plans", post(routes::admin::create_plan))
        .route("/orders", get(routes::admin::list_orders))
        .layer(axum::middleware::from_fn(superuser_layer))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            bearer_auth_layer,
        ));

    // Build complete v1 API
    let v1_routes = Router::new()
        .nest("/auth", auth_public.merge(auth_private))
        .nest("/points", points_private.merge(points_public))
        .nest("/admin", admin_routes);

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.contains(&"*".to_string()) {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        // Production mode: configure allowed origins
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    // Combine all routes with middleware stack
    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}

/// Bearer token authentication middleware layer
///
/// Validates the token, loads the account, and rejects inactive accounts.
/// Token validity is checked first and independently: an expired or
/// tampered token is a 401 regardless of any account flags. The loaded
/// [`User`] is injected into request extensions for handlers.
async fn bearer_auth_layer(
    state: axum::extract::State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // Extract Authorization header
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".to_string()))?;

    // Parse Bearer token
    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::BadRequest("Expected Bearer token".to_string()))?;

    // Validate token (401 on failure, before any account checks)
    let claims = jwt::validate_token(token, state.jwt_secret())?;

    // Load the account; a token for a deleted account is invalid
    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Unknown account".to_string()))?;

    // Authorization gate, separate from token validity
    if !user.is_active {
        return Err(ApiError::Forbidden("account disabled".to_string()));
    }

    // Insert into request extensions
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

/// Superuser authorization middleware layer
///
/// Must run after [`bearer_auth_layer`]; reads the injected account and
/// rejects non-superusers.
async fn superuser_layer(req: Request, next: Next) -> Result<Response, ApiError> {
    let user = req
        .extensions()
        .get::<User>()
        .ok_or_else(|| ApiError::Unauthorized("Missing authentication context".to_string()))?;

    if !user.is_superuser {
        return Err(ApiError::Forbidden("superuser required".to_string()));
    }

    Ok(next.run(req).await)
}
