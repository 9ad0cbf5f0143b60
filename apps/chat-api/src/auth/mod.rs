//! Bearer-token verification for the WebSocket handshake.

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::AppState;

/// Identity resolved from a verified token, attached to the connection for
/// its whole lifetime.
#[derive(Debug, Clone)]
pub struct UserIdentity {
    pub user_id: String,
    pub name: String,
    pub image: Option<String>,
    /// Semantic tag carried through from the user record; never consulted
    /// for authorization decisions in this service.
    pub role: String,
}

/// Handshake failures. Unlike [`crate::error::EventError`], these terminate
/// the connection: no event is processed after a failed handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// No token supplied in the connection metadata.
    MissingToken,
    /// Malformed or unverifiable token.
    InvalidSignature,
    /// Well-formed token whose subject matches no user record.
    UnknownUser,
    /// Collaborator I/O failure while resolving the subject.
    LookupFailed,
    /// Signing secret absent. Fatal to the process, not the connection.
    ServerMisconfigured,
}

impl AuthError {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingToken => "Missing authentication token",
            Self::InvalidSignature => "Invalid authentication token",
            Self::UnknownUser => "Unknown user",
            Self::LookupFailed => "User lookup failed",
            Self::ServerMisconfigured => "Server misconfigured",
        }
    }
}

/// Claims carried by the bearer token issued by the identity collaborator.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject — the stable user identifier.
    pub sub: String,
    /// Expiration (unix timestamp).
    pub exp: i64,
    /// Issued-at (unix timestamp).
    pub iat: i64,
}

/// Check the token signature and extract its subject. Pure, no I/O.
pub fn decode_subject(secret: &str, raw: &str) -> Result<String, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::ServerMisconfigured);
    }

    // The scheme marker is optional connection metadata; strip it if present.
    let token = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }

    let data = jsonwebtoken::decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|_| AuthError::InvalidSignature)?;

    Ok(data.claims.sub)
}

/// Verify a bearer token and resolve it to a live user record.
pub async fn verify(state: &AppState, raw: Option<&str>) -> Result<UserIdentity, AuthError> {
    let raw = match raw {
        Some(t) if !t.trim().is_empty() => t,
        _ => return Err(AuthError::MissingToken),
    };

    let subject = decode_subject(&state.config.token_secret, raw)?;

    let user = state
        .users
        .find_user_by_id(&subject)
        .await
        .map_err(|err| {
            tracing::error!(%err, "identity lookup failed during handshake");
            AuthError::LookupFailed
        })?
        .ok_or(AuthError::UnknownUser)?;

    Ok(UserIdentity {
        user_id: user.id,
        name: user.name,
        image: user.image,
        role: user.role,
    })
}
