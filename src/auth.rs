use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use crate::{
    AppState,
    config::AppConfig,
    error::ApiError,
    models::Role,
    session::{SESSION_TOKEN_KEY, SessionError, SessionId, SessionState, SessionStore},
    token::TokenCodec,
};

/// Principal
///
/// The caller of the current request, resolved from a verified session. Lives
/// for exactly one request and is never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    pub subject_id: i64,
    pub role: Role,
    pub session_id: SessionId,
}

/// Resolves the principal owning `session_id`.
///
/// Read-only: a session without a token, or with one that no longer verifies,
/// is reported as unauthenticated and left in place.
pub async fn resolve_principal(
    sessions: &dyn SessionStore,
    tokens: &TokenCodec,
    session_id: &str,
) -> Result<Principal, ApiError> {
    let token = match sessions.get(session_id, SESSION_TOKEN_KEY).await {
        Ok(token) => token,
        Err(SessionError::NotFound) => {
            tracing::debug!("session has no token");
            return Err(ApiError::Unauthenticated);
        }
        Err(e) => return Err(e.into()),
    };

    let claims = tokens.verify(&token)?;
    Ok(Principal {
        subject_id: claims.sub,
        role: claims.role,
        session_id: session_id.to_string(),
    })
}

/// Reads the session id out of the request cookies.
pub fn session_id_from(parts: &Parts, cookie_name: &str) -> Option<SessionId> {
    CookieJar::from_headers(&parts.headers)
        .get(cookie_name)
        .map(|c| c.value().to_string())
        .filter(|id| !id.is_empty())
}

/// Principal extractor
///
/// Handlers behind `require_session`/`require_role` pick up the principal the
/// middleware already placed in the request extensions. Anywhere else the
/// session is resolved on the spot. Rejects with `401`.
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
    SessionState: FromRef<S>,
    Arc<TokenCodec>: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(principal) = parts.extensions.get::<Principal>() {
            return Ok(principal.clone());
        }

        let config = AppConfig::from_ref(state);
        let session_id =
            session_id_from(parts, &config.session_cookie_name).ok_or(ApiError::Unauthenticated)?;

        let sessions = SessionState::from_ref(state);
        let tokens = Arc::<TokenCodec>::from_ref(state);
        resolve_principal(sessions.as_ref(), &tokens, &session_id).await
    }
}

/// BearerToken
///
/// Raw token from the `Authorization` header, for callers that hold a token
/// rather than a session cookie. The `Bearer ` prefix is optional.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .ok_or(ApiError::Unauthenticated)?;

        let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
        if token.is_empty() {
            return Err(ApiError::Unauthenticated);
        }
        Ok(BearerToken(token.to_string()))
    }
}

/// RequireRole
///
/// Middleware state for routes that need a minimum tier on top of a session.
#[derive(Clone)]
pub struct RequireRole {
    pub state: AppState,
    pub min: Role,
}

impl RequireRole {
    pub fn new(state: AppState, min: Role) -> Self {
        Self { state, min }
    }
}

/// require_session
///
/// Gate for authenticated routes: `401` unless the request carries a session
/// holding a valid token. On success the `Principal` is placed in the request
/// extensions for the wrapped handler.
pub async fn require_session(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(&state, None, request, next).await
}

/// require_role
///
/// `require_session` plus a tier check: `403` when the resolved role does not
/// satisfy the configured minimum.
pub async fn require_role(
    State(guard): State<RequireRole>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(&guard.state, Some(guard.min), request, next).await
}

async fn authorize(
    state: &AppState,
    required: Option<Role>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (mut parts, body) = request.into_parts();
    let principal = Principal::from_request_parts(&mut parts, state).await?;

    if let Some(required) = required {
        if !principal.role.satisfies(required) {
            tracing::info!(
                subject = principal.subject_id,
                role = %principal.role,
                required = %required,
                "insufficient privilege"
            );
            return Err(ApiError::Forbidden);
        }
    }

    parts.extensions.insert(principal);
    Ok(next.run(Request::from_parts(parts, body)).await)
}
