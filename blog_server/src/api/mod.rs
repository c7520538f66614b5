//! HTTP API for the blog backend.
//!
//! # Modules
//!
//! - [`auth`]: accounts (register, login, logout, password, profiles)
//! - [`content`]: posts and their tag and file associations
//! - [`comments`], [`tags`], [`files`]: the remaining resources
//! - [`email`]: verification codes
//! - [`middleware`]: the authentication gate as axum layers and extractors
//! - [`error`]: domain errors to status codes
//!
//! # Endpoints Overview
//!
//! ```text
//! GET    /health                          public
//! POST   /user/register, /user/login      public
//! POST   /user/logout                     required
//! PUT    /user/password                   required
//! GET    /user/list                       required (admin)
//! GET    /user/{id}                       required
//! PUT    /user/{id}, DELETE /user/{id}    required (self or admin)
//! GET    /content, /content/{id}          optional
//! POST   /content                         required
//! PUT    /content/{id}                    required (author)
//! DELETE /content/{id}                    required (author or admin)
//! POST   /content/{id}/tags               required
//! DELETE /content/{id}/tags/{tag_id}      required
//! POST   /content/{id}/files              required
//! DELETE /content/{id}/files/{file_id}    required
//! POST   /comment                         required
//! GET    /comment/content/{content_id}    required
//! PUT    /comment/{id}, DELETE ...        required
//! GET    /tag, /tag/{id}                  public
//! POST   /tag, PUT|DELETE /tag/{id}       required
//! GET    /file/list, /file/content/{id}   public
//! POST   /file/upload                     required (multipart)
//! GET    /img/{storage_name}              public (static)
//! POST   /email/verify                    public
//! POST   /email/verify/check              public
//! ```
//!
//! # CORS
//!
//! CORS is permissive. In production, configure appropriate origins,
//! methods, and headers.

pub mod auth;
pub mod comments;
pub mod content;
pub mod email;
pub mod error;
pub mod files;
pub mod middleware;
pub mod request_id;
pub mod tags;

use axum::{
    Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::{IntoResponse, Json},
    routing::{delete, get, post, put},
};
use blog_core::auth::{AuthGate, AuthManager, CredentialHasher, SessionStore, TokenService};
use blog_core::content::{
    CommentManager, ContentManager, FileManager, LocalBlobStore, TagManager,
};
use blog_core::db::{Database, SqliteUserRepository};
use blog_core::store::KvStore;
use blog_core::verification::{LogMailer, Mailer, VerificationService};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::config::{ServerConfig, UploadConfig};

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request; every manager sits behind an `Arc` or is
/// cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub store: Arc<dyn KvStore>,
    pub auth_manager: Arc<AuthManager>,
    pub gate: AuthGate,
    pub contents: Arc<ContentManager>,
    pub tags: Arc<TagManager>,
    pub comments: Arc<CommentManager>,
    pub files: Arc<FileManager>,
    pub verification: Arc<VerificationService>,
    pub mailer: Arc<dyn Mailer>,
    /// Directory served under `/img`
    pub upload_dir: PathBuf,
}

impl AppState {
    /// Wire the managers around an opened database and key-value store
    pub fn new(
        db: Database,
        store: Arc<dyn KvStore>,
        auth_manager: AuthManager,
        uploads: &UploadConfig,
        verification_code_length: usize,
    ) -> Self {
        let pool = Arc::new(db.pool().clone());
        let blobs = Arc::new(LocalBlobStore::new(&uploads.dir));

        Self {
            gate: auth_manager.gate(),
            auth_manager: Arc::new(auth_manager),
            contents: Arc::new(ContentManager::new(pool.clone())),
            tags: Arc::new(TagManager::new(pool.clone())),
            comments: Arc::new(CommentManager::new(pool.clone())),
            files: Arc::new(FileManager::with_max_size(pool, blobs, uploads.max_bytes)),
            verification: Arc::new(VerificationService::with_code_length(
                store.clone(),
                verification_code_length,
            )),
            mailer: Arc::new(LogMailer),
            upload_dir: uploads.dir.clone(),
            store,
            db,
        }
    }

    /// Build the state for a configured server
    pub fn from_config(config: &ServerConfig, db: Database, store: Arc<dyn KvStore>) -> Self {
        let auth_manager = AuthManager::new(
            Arc::new(SqliteUserRepository::new(db.pool().clone())),
            CredentialHasher::new(config.security.password_pepper.clone()),
            TokenService::new(&config.security.jwt_secret),
            SessionStore::new(store.clone()),
        );

        Self::new(
            db,
            store,
            auth_manager,
            &config.uploads,
            config.verification_code_length,
        )
    }
}

/// Create the complete API router with all endpoints and middleware.
///
/// # Example
///
/// ```rust,no_run
/// # use blog_server::api::{create_router, AppState};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let state: AppState = unimplemented!();
/// let app = create_router(state);
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```
pub fn create_router(state: AppState) -> Router {
    let upload_dir = state.upload_dir.clone();

    Router::new()
        .route("/health", get(health_check))
        .nest("/user", user_routes(&state))
        .nest("/content", content_routes(&state))
        .nest("/comment", comment_routes(&state))
        .nest("/tag", tag_routes(&state))
        .nest("/file", file_routes(&state))
        .nest("/email", email_routes())
        .nest_service("/img", ServeDir::new(upload_dir))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(request_id::request_id_middleware))
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

fn user_routes(state: &AppState) -> Router<AppState> {
    let public_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/logout", post(auth::logout))
        .route("/password", put(auth::change_password))
        .route("/list", get(auth::list_users))
        .route(
            "/{id}",
            get(auth::get_user)
                .put(auth::update_user)
                .delete(auth::delete_user),
        )
        .layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new().merge(public_routes).merge(protected_routes)
}

fn content_routes(state: &AppState) -> Router<AppState> {
    let optional_routes = Router::new()
        .route("/", get(content::list_contents))
        .route("/{id}", get(content::get_content))
        .layer(from_fn_with_state(state.clone(), middleware::optional_auth));

    let protected_routes = Router::new()
        .route("/", post(content::create_content))
        .route(
            "/{id}",
            put(content::update_content).delete(content::delete_content),
        )
        .route("/{id}/tags", post(content::attach_tags))
        .route("/{id}/tags/{tag_id}", delete(content::detach_tag))
        .route("/{id}/files", post(content::attach_files))
        .route("/{id}/files/{file_id}", delete(content::detach_file))
        .layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new().merge(optional_routes).merge(protected_routes)
}

fn comment_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(comments::create_comment))
        .route("/content/{content_id}", get(comments::list_for_content))
        .route(
            "/{id}",
            put(comments::update_comment).delete(comments::delete_comment),
        )
        .layer(from_fn_with_state(state.clone(), middleware::require_auth))
}

fn tag_routes(state: &AppState) -> Router<AppState> {
    let public_routes = Router::new()
        .route("/", get(tags::list_tags))
        .route("/{id}", get(tags::get_tag));

    let protected_routes = Router::new()
        .route("/", post(tags::create_tag))
        .route("/{id}", put(tags::update_tag).delete(tags::delete_tag))
        .layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new().merge(public_routes).merge(protected_routes)
}

fn file_routes(state: &AppState) -> Router<AppState> {
    let body_limit = usize::try_from(state.files.max_size())
        .unwrap_or(usize::MAX)
        .saturating_add(files::MULTIPART_OVERHEAD);

    let public_routes = Router::new()
        .route("/list", get(files::list_files))
        .route("/content/{id}", get(files::files_for_content));

    let protected_routes = Router::new()
        .route("/upload", post(files::upload))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new().merge(public_routes).merge(protected_routes)
}

fn email_routes() -> Router<AppState> {
    Router::new()
        .route("/verify", post(email::send_code))
        .route("/verify/check", post(email::check_code))
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` when both the database and the key-value store answer,
/// `503 Service Unavailable` otherwise.
///
/// ```bash
/// curl http://localhost:8080/health
/// # {"status":"healthy","database":true,"store":true,"timestamp":"2026-01-01T10:30:00Z"}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_healthy = state.db.health_check().await.is_ok();
    let store_healthy = state.store.ping().await.is_ok();

    let overall_healthy = db_healthy && store_healthy;

    let status_code = if overall_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if overall_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_healthy,
        "store": store_healthy,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
