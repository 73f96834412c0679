use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, put},
};

/// Authenticated Router Module
///
/// Every route here sits behind `require_session`, so handlers can take a
/// `Principal` argument and rely on it being the verified caller.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /session/user
        // The caller's own user row.
        .route("/session/user", get(handlers::get_session_user))
        // PUT /users/{id}
        // Self-service profile/role update. The privilege guard rejects any
        // target other than the caller and admins stepping down from tier 1.
        .route("/users/{id}", put(handlers::update_user))
}
