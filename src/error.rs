use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use utoipa::ToSchema;

use crate::{repository::StoreError, session::SessionError, token::AuthError};

/// Error body written for every `ApiError`, which covers all handler and
/// extractor failures (unmatched routes keep axum's empty 404/405).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub status: u16,
    pub title: String,
    pub detail: String,
}

/// Aggregated validation failure. Every problem found is reported at once and
/// nothing is persisted.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("validation failed: {}", .0.join(", "))]
pub struct ValidationError(pub Vec<String>);

/// ApiError
///
/// Everything a handler, extractor or middleware can fail with. All auth and
/// session failures terminate here as a status code; none of them escapes as a
/// fault that could take the process down.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No session, or no token inside it.
    #[error("not authenticated")]
    Unauthenticated,

    /// A token was present but did not verify.
    #[error(transparent)]
    Token(#[from] AuthError),

    /// Authenticated, but the role is below the route's requirement.
    #[error("insufficient privilege")]
    Forbidden,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound => Self::Unauthenticated,
            SessionError::Backend(msg) => Self::Internal(msg),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(ValidationError(vec![rejection.body_text()]))
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated | Self::Token(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (title, detail) = match &self {
            Self::Unauthenticated | Self::Token(_) => (
                "Unauthorized",
                "You are not authorized to access this resource".to_string(),
            ),
            Self::Forbidden => (
                "Forbidden",
                "You are not authorized to access this resource".to_string(),
            ),
            Self::Validation(e) => ("Bad Request", e.to_string()),
            Self::NotFound(_) => ("Not Found", self.to_string()),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                ("Internal Server Error", "internal error".to_string())
            }
        };

        let body = ErrorBody {
            status: status.as_u16(),
            title: title.to_string(),
            detail,
        };
        (status, Json(body)).into_response()
    }
}

/// ApiJson
///
/// `Json` body extractor whose rejections (bad syntax, missing fields, wrong
/// content type) are reported as `400` with an `ErrorBody`.
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}
