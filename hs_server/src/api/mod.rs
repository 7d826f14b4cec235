//! HTTP API for the Hydraulisc server.
//!
//! # Modules
//!
//! - [`auth`]: Registration, login, logout and the current session
//! - [`admin`]: Invite minting, account list, forced post takedown
//! - [`posts`]: Post creation, lookup and owner-only deletion
//! - [`profile`]: Public profiles and profile updates
//! - [`middleware`]: Cookie session middleware and the client key extractor
//! - [`errors`]: Error to status code mapping
//!
//! # Endpoints Overview
//!
//! ```text
//! GET    /health                          - Health check (public)
//! POST   /api/v1/auth/register            - Register (public)
//! POST   /api/v1/auth/login               - Login (public)
//! POST   /api/v1/auth/logout              - Logout (session cookie)
//! GET    /api/v1/auth/session             - Current session (session required)
//! POST   /api/v1/admin/invites            - Mint invites (administrator)
//! GET    /api/v1/admin/users              - List accounts (administrator)
//! DELETE /api/v1/admin/posts/{id}         - Take down a post (administrator)
//! POST   /api/v1/posts                    - Create post (session required)
//! GET    /api/v1/posts/{id}               - Get post (public)
//! DELETE /api/v1/posts/{id}               - Delete own post (session required)
//! GET    /api/v1/users/{id}               - Public profile (public)
//! PATCH  /api/v1/users/{id}/profile       - Update profile (owner or administrator)
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively for development. In production, configure
//! appropriate origins, methods, and headers.

pub mod admin;
pub mod auth;
pub mod errors;
pub mod middleware;
pub mod posts;
pub mod profile;
pub mod request_id;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{delete, get, patch, post},
};
use hydraulisc::{
    AdminAuthority, AdmissionConfig, AuthManager, PostManager, ProfileManager,
    db::{Database, Stores},
};
use serde_json::json;
use std::{net::IpAddr, sync::Arc};
use tower_http::cors::CorsLayer;

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request; every field is a cheap handle.
#[derive(Clone)]
pub struct AppState {
    pub auth_manager: Arc<AuthManager>,
    pub admin: Arc<AdminAuthority>,
    pub posts: Arc<PostManager>,
    pub profiles: Arc<ProfileManager>,
    /// Reloadable admission mode, read once per registration
    pub admission: AdmissionConfig,
    /// Base URL for invite links
    pub public_url: Arc<str>,
    /// Present when backed by PostgreSQL
    pub database: Option<Database>,
    /// Peers whose `X-Forwarded-For` header is believed
    pub trusted_proxies: Arc<[IpAddr]>,
}

impl AppState {
    /// Build the handler state over one set of stores
    pub fn new(
        stores: &Stores,
        auth_manager: AuthManager,
        admission: AdmissionConfig,
        public_url: &str,
    ) -> Self {
        Self {
            auth_manager: Arc::new(auth_manager),
            admin: Arc::new(AdminAuthority::new(stores)),
            posts: Arc::new(PostManager::new(Arc::clone(&stores.posts))),
            profiles: Arc::new(ProfileManager::new(Arc::clone(&stores.accounts))),
            admission,
            public_url: Arc::from(public_url.trim_end_matches('/')),
            database: None,
            trusted_proxies: Arc::from(Vec::new()),
        }
    }

    /// Key rate limits on forwarded addresses for requests from these peers
    pub fn with_trusted_proxies(mut self, proxies: Vec<IpAddr>) -> Self {
        self.trusted_proxies = Arc::from(proxies);
        self
    }

    /// Report database health on `/health`
    pub fn with_database(mut self, database: Database) -> Self {
        self.database = Some(database);
        self
    }
}

/// Create the complete API router with all endpoints and middleware.
///
/// # Example
///
/// ```rust,no_run
/// # use hs_server::api::{create_router, AppState};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let state: AppState = unimplemented!();
/// let app = create_router(state);
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```
pub fn create_router(state: AppState) -> Router {
    let v1_routes = create_v1_router(state.clone());

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", v1_routes)
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Create API v1 router with all versioned endpoints.
fn create_v1_router(state: AppState) -> Router<AppState> {
    // Public routes (no session middleware)
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/posts/{post_id}", get(posts::get_post))
        .route("/users/{account_id}", get(profile::get_profile));

    // Protected routes (require a live session)
    let protected_routes = Router::new()
        .route("/auth/session", get(auth::current_session))
        .route("/admin/invites", post(admin::mint_invites))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/posts/{post_id}", delete(admin::takedown_post))
        .route("/posts", post(posts::create_post))
        .route("/posts/{post_id}", delete(posts::delete_post))
        .route("/users/{account_id}/profile", patch(profile::update_profile))
        .layer(axum::middleware::from_fn_with_state(
            state,
            middleware::session_middleware,
        ));

    Router::new().merge(public_routes).merge(protected_routes)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` when storage answers, `503 Service Unavailable` otherwise.
///
/// ```bash
/// curl http://localhost:3000/health
/// # {"status":"healthy","storage":"postgres","database":true,"admission_mode":"inviteOnly",...}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (storage, db_healthy) = match &state.database {
        Some(database) => ("postgres", database.health_check().await.is_ok()),
        None => ("memory", true),
    };

    let status_code = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if db_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "storage": storage,
        "database": db_healthy,
        "admission_mode": state.admission.mode().to_string(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
