use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Admin Router Module
///
/// Nested under `/admin` and wrapped in `require_role(Role::ADMIN)`: no session
/// is `401`, any tier other than `1` is `403`.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/users
        .route("/users", get(handlers::list_users))
}
