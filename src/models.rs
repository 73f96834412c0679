use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Identity ---

/// Role
///
/// An opaque, ordered authority tier. Only tier `1` (administrator) has
/// confirmed semantics; the remaining values (`-1`, `0`, `2`, ...) are assigned
/// by the account-creation flow and are compared purely by their integer value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS, ToSchema,
    sqlx::Type, Default,
)]
#[sqlx(transparent)]
#[ts(export)]
pub struct Role(pub i32);

impl Role {
    pub const ADMIN: Role = Role(1);

    pub fn is_admin(self) -> bool {
        self == Self::ADMIN
    }

    /// Whether this tier satisfies a route requirement of `required`.
    ///
    /// An admin requirement is an exact match on tier `1`. Any other
    /// requirement is an ordered comparison on the raw tier value.
    pub fn satisfies(self, required: Role) -> bool {
        if required.is_admin() {
            self.is_admin()
        } else {
            self >= required
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User
///
/// A user row as returned by the `UserStore` collaborator. The password hash
/// never leaves the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    pub email_notification: bool,
}

// --- Request Payloads ---

/// LoginRequest
///
/// Credentials submitted to `POST /session`. Only forwarded to the user store,
/// never logged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// UserUpdateRequest
///
/// Payload of `PUT /users/{id}`. `role` is the acting caller's current role.
///
/// Both role fields travel as strings: the zero value of an integer would be
/// indistinguishable from the valid role `0`, so "absent" must stay detectable.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(default)]
#[ts(export)]
pub struct UserUpdateRequest {
    pub user: UserUpdate,
    pub role: String,
}

/// UserUpdate
///
/// The target user's new profile fields plus the requested new role.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(default, rename_all = "camelCase")]
#[ts(export)]
pub struct UserUpdate {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: String,
    pub email_notification: bool,
}

/// ProfileUpdate
///
/// The validated form of a `UserUpdateRequest`, produced only by the privilege
/// guard and consumed by `UserStore::update_user`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileUpdate {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    pub email_notification: bool,
}

// --- Responses ---

/// SessionResponse
///
/// Body returned by a successful login. The token itself stays server-side.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SessionResponse {
    pub id: i64,
    pub role: Role,
}
