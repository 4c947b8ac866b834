//! # JWT Authentication
//!
//! Optional middleware guarding every route. Requests must carry
//! `Authorization: Bearer <token>`, where the token is RS256-signed by the
//! configured key and its claims carry a non-empty `jti`. `exp` and `nbf`
//! are checked when present.

use std::fmt;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::errors::ApiError;

/// Authentication failures
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("token not provided or malformed")]
    MissingToken,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Valid signature but no `jti` claim
    #[error("invalid token: authentication failed")]
    MissingTokenId,

    #[error("unable to parse public key: {0}")]
    InvalidKey(String),
}

/// Result type for authentication
pub type AuthResult<T> = Result<T, AuthError>;

/// Claims read from access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Token ID
    #[serde(default)]
    pub jti: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// Verifies RS256 access tokens against one public key
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// Build from a PEM-encoded RSA public key
    pub fn from_rsa_pem(pem: &[u8]) -> AuthResult<Self> {
        let key = DecodingKey::from_rsa_pem(pem).map_err(|e| AuthError::InvalidKey(e.to_string()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.required_spec_claims.clear();
        validation.validate_nbf = true;

        Ok(Self { key, validation })
    }

    /// Verify `token` and return its claims
    pub fn verify(&self, token: &str) -> AuthResult<AccessClaims> {
        let data = decode::<AccessClaims>(token, &self.key, &self.validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        if data.claims.jti.is_empty() {
            return Err(AuthError::MissingTokenId);
        }
        Ok(data.claims)
    }
}

impl fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtVerifier")
            .field("algorithms", &self.validation.algorithms)
            .finish()
    }
}

/// Extract the token from an `Authorization: Bearer <token>` value
fn bearer_token(header: &str) -> AuthResult<&str> {
    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None)
            if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() =>
        {
            Ok(token)
        }
        _ => Err(AuthError::MissingToken),
    }
}

/// Middleware rejecting requests without a valid token
pub async fn require_jwt(
    State(verifier): State<Arc<JwtVerifier>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingToken)?;
    let token = bearer_token(header)?;

    let claims = verifier.verify(token).map_err(|e| {
        debug!(error = %e, "token rejected");
        e
    })?;
    info!(jti = %claims.jti, sub = ?claims.sub, "jwt user");

    Ok(next.run(request).await)
}
