//! Session token verification.
//!
//! Tokens are HMAC-signed JWTs whose `id` claim is the participant id. The
//! token is read from the session cookie, or from an `Authorization: Bearer`
//! header when no cookie is present.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum_extra::extract::CookieJar;
use huddle_core::ParticipantId;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;

/// Errors authenticating a request.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Neither the cookie nor a bearer header carried a token.
    #[error("missing session token")]
    MissingToken,
    /// The token failed signature or claim validation.
    #[error("invalid session token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    /// The token verified but carries no usable `id` claim.
    #[error("session token has no participant id")]
    MissingParticipant,
}

impl AuthError {
    /// Body text returned to the client with a 401.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::MissingToken => "unauthorized",
            Self::InvalidToken(_) | Self::MissingParticipant => "unauthorized token",
        }
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    id: Option<String>,
}

/// Verifies session tokens against a shared secret.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier {
    /// Accept HS256, HS384 and HS512 tokens signed with `secret`.
    ///
    /// `exp` is checked when present but is not required.
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.required_spec_claims.clear();
        validation.validate_exp = true;
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify `token` and return the participant it names.
    pub fn verify(&self, token: &str) -> Result<ParticipantId, AuthError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation)?;
        match data.claims.id {
            Some(id) if !id.is_empty() => Ok(ParticipantId::new(id)),
            _ => Err(AuthError::MissingParticipant),
        }
    }

    /// Find and verify the token carried by a request.
    pub fn authenticate(
        &self,
        jar: &CookieJar,
        headers: &HeaderMap,
        cookie_name: &str,
    ) -> Result<ParticipantId, AuthError> {
        let token = token_from_request(jar, headers, cookie_name).ok_or(AuthError::MissingToken)?;
        self.verify(&token)
    }
}

/// The session cookie's value, else the bearer token.
pub fn token_from_request(jar: &CookieJar, headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    if let Some(cookie) = jar.get(cookie_name) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
}
