//! Authentication and authorization for the triage API
//!
//! Authentication proper is an outside concern: an [`AuthProvider`] turns
//! request headers into a [`Session`]. The session is an explicit value
//! handed to whoever needs the current actor; nothing looks it up from
//! ambient state.
//!
//! - [`StaticTokenAuthProvider`]: bearer tokens configured up front
//! - [`NoAuthProvider`]: development mode, every request is an admin

use crate::core::error::{AuthError, NayaResult};
use async_trait::async_trait;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Platform role of an actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Client,
    #[serde(alias = "gestionnaire")]
    Manager,
    Admin,
    #[serde(alias = "coursier")]
    Courier,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Manager => "manager",
            Role::Admin => "admin",
            Role::Courier => "courier",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated actor of one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub name: String,
    pub role: Role,
}

impl Session {
    pub fn new(user_id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            role,
        }
    }
}

/// Authorization context extracted from a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthContext {
    /// No credentials presented
    Anonymous,

    User(Session),
}

impl AuthContext {
    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthContext::User(session) => Some(session),
            AuthContext::Anonymous => None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.session().map(|s| s.role)
    }
}

/// Roles allowed to perform an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthPolicy {
    roles: Vec<Role>,
}

impl AuthPolicy {
    /// Actor must hold one of these roles
    pub fn has_role(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            roles: roles.into_iter().collect(),
        }
    }

    /// Policy of every triage endpoint: managers and admins
    pub fn triage() -> Self {
        Self::has_role([Role::Manager, Role::Admin])
    }

    pub fn check(&self, context: &AuthContext) -> bool {
        context.role().is_some_and(|r| self.roles.contains(&r))
    }

    /// Like [`check`](Self::check), but explains the refusal
    ///
    /// Anonymous callers get `MissingCredentials` (401); authenticated
    /// callers with the wrong role get `Forbidden` (403).
    pub fn authorize(&self, context: &AuthContext, action: &str) -> Result<(), AuthError> {
        if self.check(context) {
            return Ok(());
        }
        match context {
            AuthContext::Anonymous => Err(AuthError::MissingCredentials),
            AuthContext::User(session) => Err(AuthError::Forbidden {
                role: session.role.to_string(),
                action: action.to_string(),
            }),
        }
    }
}

/// Trait for auth providers
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Resolve request headers to an auth context
    ///
    /// No credentials at all is `Anonymous`; credentials that do not check
    /// out are an error.
    async fn authenticate(&self, headers: &HeaderMap) -> NayaResult<AuthContext>;
}

/// Token of an `Authorization: Bearer <token>` header, if present
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Bearer tokens mapped to fixed sessions
#[derive(Debug, Clone, Default)]
pub struct StaticTokenAuthProvider {
    tokens: HashMap<String, Session>,
}

impl StaticTokenAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, session: Session) -> Self {
        self.tokens.insert(token.into(), session);
        self
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl AuthProvider for StaticTokenAuthProvider {
    async fn authenticate(&self, headers: &HeaderMap) -> NayaResult<AuthContext> {
        if !headers.contains_key(AUTHORIZATION) {
            return Ok(AuthContext::Anonymous);
        }
        let token = bearer_token(headers).ok_or(AuthError::InvalidCredentials)?;
        match self.tokens.get(token) {
            Some(session) => Ok(AuthContext::User(session.clone())),
            None => {
                tracing::warn!("rejected unknown bearer token");
                Err(AuthError::InvalidCredentials.into())
            }
        }
    }
}

/// Default no-auth provider (for development)
///
/// Every request runs as the same admin session.
pub struct NoAuthProvider;

impl NoAuthProvider {
    pub fn session() -> Session {
        Session::new("dev", "Development", Role::Admin)
    }
}

#[async_trait]
impl AuthProvider for NoAuthProvider {
    async fn authenticate(&self, _headers: &HeaderMap) -> NayaResult<AuthContext> {
        Ok(AuthContext::User(Self::session()))
    }
}
