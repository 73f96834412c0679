use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode,
    errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::{
    config::{AppConfig, ConfigError, MAX_TTL_SECS},
    models::Role,
};

/// Fixed issuer stamped into, and required on, every token this service mints.
pub const ISSUER: &str = "kylerjacobson.dev";

/// Claims
///
/// The signed identity payload. Immutable once minted: a token is authentic iff
/// its HMAC signature verifies under the server secret and `exp` lies in the future.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Claims {
    /// Subject: the user's id. Carried as a JWT string claim, exposed as an integer.
    #[serde(with = "subject")]
    #[schema(value_type = String)]
    pub sub: i64,
    /// Authority tier of the subject at login time.
    pub role: Role,
    /// Issuer: always `ISSUER`.
    pub iss: String,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
}

/// Token verification failures. Every one of them is recoverable and surfaces
/// to clients as `401`; the variants exist for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature is invalid")]
    BadSignature,

    #[error("token has expired")]
    Expired,
}

/// TokenCodec
///
/// Signs and verifies `Claims` with the process-wide HMAC secret. Built once at
/// startup from `AppConfig` and shared read-only; signing and verification are
/// pure CPU work.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &str, ttl_secs: i64) -> Result<Self, ConfigError> {
        if secret.trim().is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        if !(1..=MAX_TTL_SECS).contains(&ttl_secs) {
            return Err(ConfigError::Invalid {
                var: "TOKEN_TTL_SECS",
                value: ttl_secs.to_string(),
            });
        }

        let mut validation = Validation::new(Algorithm::HS256);
        // No clock skew allowance: a token one second past `exp` is expired.
        validation.leeway = 0;
        // `exp` is exclusive: a token is only valid while `exp > now`.
        validation.reject_tokens_expiring_in_less_than = 1;
        validation.validate_exp = true;
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl: Duration::seconds(ttl_secs),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Self::new(&config.jwt_secret, config.token_ttl_secs)
    }

    /// Mints a token for `subject_id` valid for the configured ttl from now.
    pub fn issue(
        &self,
        subject_id: i64,
        role: Role,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        self.issue_at(subject_id, role, Utc::now())
    }

    /// Mints a token as if the current time were `now`.
    pub fn issue_at(
        &self,
        subject_id: i64,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = Claims {
            sub: subject_id,
            role,
            iss: ISSUER.to_string(),
            exp: (now + self.ttl).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    /// Parses `token`, checks its signature, issuer and expiry.
    ///
    /// Never panics on hostile input; every failure is folded into an `AuthError`.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let token = token.trim();
        match decode::<Claims>(token, &self.decoding, &self.validation) {
            Ok(data) => Ok(data.claims),
            Err(e) => {
                let err = classify(token, e.kind());
                match err {
                    AuthError::BadSignature => tracing::warn!(
                        security_event = "bad_signature",
                        "rejected token with an invalid signature"
                    ),
                    AuthError::Expired => tracing::debug!("rejected expired token"),
                    AuthError::Malformed => {
                        tracing::debug!(reason = ?e.kind(), "rejected malformed token")
                    }
                }
                Err(err)
            }
        }
    }
}

fn classify(token: &str, kind: &ErrorKind) -> AuthError {
    match kind {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => AuthError::BadSignature,
        // The signature segment is the last thing decoded before verification. If the
        // header and body are intact, an undecodable signature is tampering.
        ErrorKind::Base64(_) if has_intact_body(token) => AuthError::BadSignature,
        _ => AuthError::Malformed,
    }
}

fn has_intact_body(token: &str) -> bool {
    let mut segments = token.split('.');
    let (Some(_), Some(payload), Some(_), None) =
        (segments.next(), segments.next(), segments.next(), segments.next())
    else {
        return false;
    };

    decode_header(token).is_ok()
        && URL_SAFE_NO_PAD
            .decode(payload)
            .ok()
            .is_some_and(|bytes| serde_json::from_slice::<Claims>(&bytes).is_ok())
}

mod subject {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(sub: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&sub.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}
