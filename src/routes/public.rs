use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that must work without a session. Login and logout live here
/// because they establish or tear down the session the other groups require.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for monitoring and load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /session   login, sets the session cookie
        // DELETE /session logout, idempotent
        .route(
            "/session",
            post(handlers::create_session).delete(handlers::destroy_session),
        )
        // POST /token/verify
        // Stateless check of an `Authorization: Bearer` token.
        .route("/token/verify", post(handlers::verify_token))
}
