/// Router Module Index
///
/// Routing is split by access level so the gate for each group is applied once,
/// as a layer, rather than remembered in every handler.

/// Routes reachable without a session: login, logout, bearer verification, health.
pub mod public;

/// Routes wrapped in `require_session`. Handlers receive a resolved `Principal`.
pub mod authenticated;

/// Routes wrapped in `require_role` with the administrator tier.
pub mod admin;
