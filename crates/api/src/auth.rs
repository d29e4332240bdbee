//! Bearer-token authentication and role checks.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use domain::{Principal, Role};
use store::Store;

use crate::config::TokenGrant;
use crate::error::ApiError;
use crate::state::AppState;

/// Resolves a presented credential to a principal.
pub trait Authenticator: Send + Sync {
    /// Returns the principal behind `token`, or None if it is unknown.
    fn authenticate(&self, token: &str) -> Option<Principal>;
}

/// Authenticator backed by a fixed token table.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenAuthenticator {
    tokens: HashMap<String, Principal>,
}

impl StaticTokenAuthenticator {
    pub fn new(grants: impl IntoIterator<Item = TokenGrant>) -> Self {
        Self {
            tokens: grants
                .into_iter()
                .map(|grant| (grant.token, grant.principal))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl Authenticator for StaticTokenAuthenticator {
    fn authenticate(&self, token: &str) -> Option<Principal> {
        self.tokens.get(token).copied()
    }
}

/// Extractor for the principal behind `Authorization: Bearer <token>`.
///
/// A missing or malformed header is rejected with 401, an unknown token
/// with 403.
#[derive(Debug, Clone, Copy)]
pub struct Authenticated(pub Principal);

impl Authenticated {
    /// Returns the principal if it holds one of `roles`.
    pub fn require_any(&self, roles: &[Role]) -> Result<Principal, ApiError> {
        if self.0.has_any_role(roles) {
            Ok(self.0)
        } else {
            tracing::debug!(principal_id = %self.0.id, role = %self.0.role, "role rejected");
            Err(ApiError::Forbidden(
                "Insufficient role for this operation".to_string(),
            ))
        }
    }

    pub fn require_customer(&self) -> Result<Principal, ApiError> {
        self.require_any(&[Role::Customer])
    }

    pub fn require_staff(&self) -> Result<Principal, ApiError> {
        self.require_any(Role::STAFF)
    }
}

impl<S: Store + 'static> FromRequestParts<Arc<AppState<S>>> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(ApiError::Unauthenticated)?;

        state
            .authenticator
            .authenticate(token)
            .map(Authenticated)
            .ok_or_else(|| ApiError::Forbidden("Invalid credentials".to_string()))
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
