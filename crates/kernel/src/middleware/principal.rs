//! Bearer token to principal resolution.
//!
//! Checks `Authorization: Bearer <token>` headers against the principals
//! file and stores the resulting [`Principal`] in request extensions.

use std::convert::Infallible;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use serde::Deserialize;
use tracing::debug;

use crate::error::AppError;
use crate::models::Principal;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct PrincipalsFile {
    #[serde(default, rename = "principal")]
    principals: Vec<PrincipalEntry>,
}

#[derive(Debug, Deserialize)]
struct PrincipalEntry {
    token: String,
    name: String,
    #[serde(default)]
    roles: Vec<String>,
}

/// Known bearer tokens.
#[derive(Clone, Default)]
pub struct PrincipalDirectory {
    tokens: Arc<DashMap<String, Principal>>,
}

impl PrincipalDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token for an authenticated principal.
    pub fn insert(&self, token: impl Into<String>, principal: Principal) {
        self.tokens.insert(token.into(), principal);
    }

    /// Parse `[[principal]]` tables with `token`, `name` and `roles`.
    pub fn load_toml(&self, source: &str) -> Result<usize> {
        let file: PrincipalsFile = toml::from_str(source).context("invalid principals file")?;
        let count = file.principals.len();

        for entry in file.principals {
            self.insert(entry.token, Principal::authenticated(entry.name, entry.roles));
        }

        Ok(count)
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let directory = Self::new();
        let count = directory.load_toml(&source)?;
        debug!(count, path = %path.display(), "principals loaded");
        Ok(directory)
    }

    pub fn lookup(&self, token: &str) -> Option<Principal> {
        self.tokens.get(token).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl std::fmt::Debug for PrincipalDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrincipalDirectory")
            .field("tokens", &self.tokens.len())
            .finish()
    }
}

/// Middleware that resolves the request principal.
///
/// - No `Authorization` header -> anonymous principal
/// - Known bearer token -> that principal
/// - Anything else -> 401 JSON error
pub async fn resolve_principal(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let principal = match auth_header {
        None => Principal::anonymous(),
        Some(value) => {
            let token = value.strip_prefix("Bearer ").map(str::trim);
            match token.and_then(|t| state.principals().lookup(t)) {
                Some(principal) => principal,
                None => {
                    debug!("rejected unknown bearer token");
                    return AppError::Unauthorized.into_response();
                }
            }
        }
    };

    request.extensions_mut().insert(principal);
    next.run(request).await
}

/// Extractor for the principal set by [`resolve_principal`].
///
/// Falls back to anonymous when the middleware did not run.
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Principal);

impl<S: Send + Sync> FromRequestParts<S> for CurrentPrincipal {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let principal = parts
            .extensions
            .get::<Principal>()
            .cloned()
            .unwrap_or_default();
        Ok(Self(principal))
    }
}
