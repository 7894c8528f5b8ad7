//! Caller-identity resolution. Accounts and sessions are owned by the
//! external identity provider; the only thing this server does is resolve a
//! bearer token into a user id. A client-supplied user id is never trusted.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::state::AppState;
use crate::store::StoreError;
use crate::utils::error::AppError;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolves a bearer token to a user id, or `None` when the token is
    /// unknown or expired.
    async fn resolve(&self, token: &str) -> Result<Option<Uuid>, StoreError>;
}

/// The resolved caller. Extraction itself never rejects an anonymous
/// request; each operation decides whether anonymity is fatal, so a
/// reservation attempt without a session becomes a `NotAuthenticated`
/// outcome before any inventory access rather than a routing-level 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    Authenticated(Uuid),
    Anonymous,
}

impl Caller {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Caller::Authenticated(id) => Some(*id),
            Caller::Anonymous => None,
        }
    }

    /// For operations that need a user up front (event creation, listing
    /// one's reservations).
    pub fn require(&self) -> Result<Uuid, AppError> {
        self.user_id()
            .ok_or_else(|| AppError::AuthError("You must be signed in".to_string()))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        let Some(token) = token else {
            return Ok(Caller::Anonymous);
        };

        match state.identity.resolve(token).await {
            Ok(Some(user_id)) => Ok(Caller::Authenticated(user_id)),
            Ok(None) => Ok(Caller::Anonymous),
            Err(e) => Err(AppError::StoreUnavailable(e.to_string())),
        }
    }
}
