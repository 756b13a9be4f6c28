//! Explicit authentication context handed to every collaborator that talks to
//! the intake API.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StaleSession {
    #[error("no active session; log in to continue")]
    Missing,
    #[error("session expired at {0}; log in again")]
    Expired(DateTime<Utc>),
    #[error("session was rejected by the server; log in again")]
    Revoked,
}

#[derive(Clone, PartialEq, Eq)]
struct Session {
    access_token: String,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Default)]
pub struct AuthContext {
    session: Option<Session>,
    revoked: bool,
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("authenticated", &self.session.is_some())
            .field("expires_at", &self.expires_at())
            .field("revoked", &self.revoked)
            .finish()
    }
}

impl AuthContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for a token obtained out of band (config, env). The expiry is
    /// read from the token's `exp` claim when it is a JWT.
    pub fn with_token(access_token: impl Into<String>) -> Self {
        let mut ctx = Self::new();
        ctx.login(access_token, None);
        ctx
    }

    pub fn login(&mut self, access_token: impl Into<String>, expires_at: Option<DateTime<Utc>>) {
        let access_token = access_token.into();
        let expires_at = expires_at.or_else(|| jwt_expiry(&access_token));
        self.session = Some(Session {
            access_token,
            expires_at,
        });
        self.revoked = false;
    }

    pub fn logout(&mut self) {
        self.session = None;
        self.revoked = false;
    }

    /// Marks the current credential unusable after the server refused it.
    pub fn revoke(&mut self) {
        if self.session.is_some() {
            self.revoked = true;
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.session.as_ref().and_then(|s| s.expires_at)
    }

    pub fn is_authenticated(&self, now: DateTime<Utc>) -> bool {
        self.bearer(now).is_ok()
    }

    pub fn bearer(&self, now: DateTime<Utc>) -> Result<&str, StaleSession> {
        let session = self.session.as_ref().ok_or(StaleSession::Missing)?;
        if self.revoked {
            return Err(StaleSession::Revoked);
        }
        if let Some(expires_at) = session.expires_at {
            if expires_at <= now {
                return Err(StaleSession::Expired(expires_at));
            }
        }
        Ok(&session.access_token)
    }
}

#[derive(Debug, Deserialize)]
struct ExpiryClaims {
    exp: Option<i64>,
}

/// Reads `exp` without verifying the signature; the server stays the
/// authority on validity, this only lets the client fail fast.
fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();

    let data =
        jsonwebtoken::decode::<ExpiryClaims>(token, &DecodingKey::from_secret(&[]), &validation)
            .ok()?;
    data.claims
        .exp
        .and_then(|exp| DateTime::<Utc>::from_timestamp(exp, 0))
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
