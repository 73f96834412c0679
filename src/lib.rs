use std::sync::Arc;

use axum::{Router, extract::FromRef, http::HeaderName, middleware};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod session;
pub mod token;

// Routing split by access level (public, authenticated, admin).
pub mod routes;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use auth::{Principal, RequireRole};
pub use config::{AppConfig, ConfigError};
pub use error::ApiError;
pub use models::Role;
pub use repository::{InMemoryUserStore, PostgresUserStore, UserStore, UserStoreState};
pub use session::{InMemorySessionStore, SessionState, SessionStore};
pub use token::{AuthError, Claims, TokenCodec};

/// ApiDoc
///
/// OpenAPI document for every route, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::create_session, handlers::destroy_session, handlers::verify_token,
        handlers::get_session_user, handlers::update_user, handlers::list_users
    ),
    components(
        schemas(
            models::User, models::Role, models::LoginRequest, models::SessionResponse,
            models::UserUpdateRequest, models::UserUpdate, token::Claims, error::ErrorBody,
        )
    ),
    tags(
        (name = "blog-api", description = "Session and authorization API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Everything a request may need, created once at startup and shared by
/// reference. The signing secret lives inside `tokens` and is read-only; the
/// session store is the only mutable shared resource.
#[derive(Clone)]
pub struct AppState {
    /// User persistence collaborator (Postgres or in-memory).
    pub users: UserStoreState,
    /// Server-side session store; the source of truth for logged-in state.
    pub sessions: SessionState,
    /// Token signer/verifier bound to the configured secret.
    pub tokens: Arc<TokenCodec>,
    /// The loaded, immutable configuration.
    pub config: AppConfig,
}

impl AppState {
    /// Assembles the state with an in-memory session store sized from `config`.
    pub fn new(config: AppConfig, users: UserStoreState) -> Result<Self, ConfigError> {
        let sessions = Arc::new(InMemorySessionStore::from_config(&config)?) as SessionState;
        Self::with_sessions(config, users, sessions)
    }

    pub fn with_sessions(
        config: AppConfig,
        users: UserStoreState,
        sessions: SessionState,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            users,
            sessions,
            tokens: Arc::new(TokenCodec::from_config(&config)?),
            config,
        })
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for UserStoreState {
    fn from_ref(app_state: &AppState) -> UserStoreState {
        app_state.users.clone()
    }
}

impl FromRef<AppState> for SessionState {
    fn from_ref(app_state: &AppState) -> SessionState {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for Arc<TokenCodec> {
    fn from_ref(app_state: &AppState) -> Arc<TokenCodec> {
        app_state.tokens.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routing tree, applies the access gates per route group and
/// wraps everything in the observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::require_session,
            )),
        )
        .nest(
            "/admin",
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                RequireRole::new(state.clone(), Role::ADMIN),
                auth::require_role,
            )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for every request, correlated by the `x-request-id` set above.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
