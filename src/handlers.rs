use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use axum_extra::extract::cookie::CookieJar;

use crate::{
    AppState,
    auth::{BearerToken, Principal},
    error::{ApiError, ApiJson, ErrorBody, ValidationError},
    guard,
    models::{LoginRequest, SessionResponse, User, UserUpdateRequest},
    session::{self, SESSION_TOKEN_KEY},
    token::Claims,
};

// --- Session Lifecycle ---

/// create_session
///
/// [Public Route] Login. Resolves the credentials through the user store, mints
/// a token, stores it in a fresh session and hands the session id back as a
/// cookie. A session cookie already present on the request is retired first so
/// a pre-login id never becomes authenticated.
///
/// The steps are not atomic across components: any failure after the session is
/// created destroys it again, leaving the client simply not logged in.
#[utoipa::path(
    post,
    path = "/session",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in, session cookie set", body = SessionResponse),
        (status = 400, description = "Body is not a valid login request", body = ErrorBody),
        (status = 401, description = "Credentials matched no user")
    )
)]
pub async fn create_session(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<(CookieJar, Json<SessionResponse>), ApiError> {
    let user = state
        .users
        .find_by_credentials(&payload.email, &payload.password)
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    let token = state
        .tokens
        .issue(user.id, user.role)
        .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))?;

    if let Some(previous) = jar.get(&state.config.session_cookie_name) {
        state.sessions.destroy(previous.value()).await?;
    }

    let session_id = state.sessions.create().await?;
    if let Err(e) = state
        .sessions
        .put(&session_id, SESSION_TOKEN_KEY, token)
        .await
    {
        state.sessions.destroy(&session_id).await?;
        return Err(ApiError::Internal(format!("session write failed: {e}")));
    }

    tracing::info!(subject = user.id, role = %user.role, "session created");

    let jar = jar.add(session::session_cookie(&state.config, &session_id));
    Ok((
        jar,
        Json(SessionResponse {
            id: user.id,
            role: user.role,
        }),
    ))
}

/// destroy_session
///
/// [Public Route] Logout. Removes the session named by the cookie and clears the
/// cookie. Idempotent: succeeds with `204` whether or not a session existed.
#[utoipa::path(
    delete,
    path = "/session",
    responses((status = 204, description = "Logged out"))
)]
pub async fn destroy_session(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode), ApiError> {
    if let Some(cookie) = jar.get(&state.config.session_cookie_name) {
        state.sessions.destroy(cookie.value()).await?;
        tracing::info!("session destroyed");
    }
    let jar = jar.add(session::clear_session_cookie(&state.config));
    Ok((jar, StatusCode::NO_CONTENT))
}

/// verify_token
///
/// [Public Route] Stateless check for callers holding a bearer token instead of
/// a session cookie.
#[utoipa::path(
    post,
    path = "/token/verify",
    responses(
        (status = 200, description = "Token is authentic", body = Claims),
        (status = 401, description = "Token missing, malformed, tampered or expired")
    )
)]
pub async fn verify_token(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<Json<Claims>, ApiError> {
    Ok(Json(state.tokens.verify(&token)?))
}

// --- Users ---

/// get_session_user
///
/// [Authenticated Route] The caller's own user row.
#[utoipa::path(
    get,
    path = "/session/user",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 404, description = "User no longer exists")
    )
)]
pub async fn get_session_user(
    principal: Principal,
    State(state): State<AppState>,
) -> Result<Json<User>, ApiError> {
    match state.users.find_by_id(principal.subject_id).await? {
        Some(user) => Ok(Json(user)),
        None => {
            tracing::info!(subject = principal.subject_id, "session user not found");
            Err(ApiError::NotFound("user"))
        }
    }
}

/// update_user
///
/// [Authenticated Route] Self-service profile and role update, gated by the
/// privilege guard. When the role changes, the token in the caller's session is
/// re-issued so later requests see the new tier.
#[utoipa::path(
    put,
    path = "/users/{id}",
    params(("id" = i64, Path, description = "User ID, must be the caller's own")),
    request_body = UserUpdateRequest,
    responses(
        (status = 204, description = "Updated"),
        (status = 400, description = "Validation failed")
    )
)]
pub async fn update_user(
    principal: Principal,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UserUpdateRequest>,
) -> Result<StatusCode, ApiError> {
    let update = guard::validate_update(&id, principal.subject_id, &payload).inspect_err(|e| {
        tracing::info!(subject = principal.subject_id, error = %e, "user update rejected");
    })?;

    if !state.users.update_user(&update).await? {
        tracing::info!(user = update.id, "user does not exist");
        return Err(ValidationError(vec!["user does not exist".to_string()]).into());
    }

    if update.role != principal.role {
        let token = state
            .tokens
            .issue(update.id, update.role)
            .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))?;
        state
            .sessions
            .put(&principal.session_id, SESSION_TOKEN_KEY, token)
            .await?;
    }

    Ok(StatusCode::NO_CONTENT)
}

/// list_users
///
/// [Admin Route] Every user, oldest first.
#[utoipa::path(
    get,
    path = "/admin/users",
    responses(
        (status = 200, description = "All users", body = [User]),
        (status = 403, description = "Caller is not an administrator")
    )
)]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(state.users.list_users().await?))
}
