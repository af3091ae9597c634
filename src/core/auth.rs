//! Authorization for campus-rs
//!
//! Authentication itself (password hashing, token issuance) happens outside
//! this crate. An [`AuthProvider`] turns request headers into an
//! [`AuthContext`]; routes declare an [`AccessPolicy`]; role checks all go
//! through [`authorize`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};

use crate::core::error::RequestError;

/// User roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Instructor,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Instructor => "instructor",
            Role::Student => "student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "admin" => Ok(Role::Admin),
            "instructor" => Ok(Role::Instructor),
            "student" => Ok(Role::Student),
            other => Err(anyhow::anyhow!("unknown role '{}'", other)),
        }
    }
}

/// An authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: String,
    pub role: Role,
}

/// Authorization context extracted from a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthContext {
    /// Caller presented valid credentials
    Authenticated(Principal),

    /// No credentials (public access)
    Anonymous,
}

impl AuthContext {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            AuthContext::Authenticated(principal) => Some(principal),
            AuthContext::Anonymous => None,
        }
    }
}

/// Check that `principal` holds exactly the `required` role
pub fn authorize(principal: &Principal, required: Role) -> Result<(), RequestError> {
    if principal.role == required {
        Ok(())
    } else {
        tracing::debug!(
            user_id = %principal.user_id,
            role = %principal.role,
            required = %required,
            "role check failed"
        );
        Err(RequestError::Forbidden)
    }
}

/// Access policy for a group of routes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AccessPolicy {
    /// No credentials required
    #[default]
    Public,

    /// Any authenticated caller
    Authenticated,

    /// Authenticated caller with the given role
    Role(Role),
}

impl AccessPolicy {
    /// Check the context against this policy
    pub fn check(&self, context: &AuthContext) -> Result<(), RequestError> {
        match (self, context) {
            (AccessPolicy::Public, _) => Ok(()),
            (_, AuthContext::Anonymous) => Err(RequestError::Unauthenticated),
            (AccessPolicy::Authenticated, AuthContext::Authenticated(_)) => Ok(()),
            (AccessPolicy::Role(role), AuthContext::Authenticated(principal)) => {
                authorize(principal, *role)
            }
        }
    }

    /// Parse policy from config: `public`, `authenticated`, `role:<name>`
    pub fn parse_policy(s: &str) -> Result<Self> {
        match s {
            "public" => Ok(AccessPolicy::Public),
            "authenticated" => Ok(AccessPolicy::Authenticated),
            s => match s.strip_prefix("role:") {
                Some(role) => Ok(AccessPolicy::Role(role.parse()?)),
                None => Err(anyhow::anyhow!("unknown access policy '{}'", s)),
            },
        }
    }
}

/// Trait for auth providers
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Extract auth context from request headers
    async fn authenticate(&self, headers: &HeaderMap) -> Result<AuthContext, RequestError>;
}

/// Default no-auth provider (for development)
#[derive(Debug, Clone, Default)]
pub struct NoAuthProvider;

#[async_trait]
impl AuthProvider for NoAuthProvider {
    async fn authenticate(&self, _headers: &HeaderMap) -> Result<AuthContext, RequestError> {
        Ok(AuthContext::Anonymous)
    }
}

/// Bearer tokens mapped to principals, loaded from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticTokenProvider {
    tokens: HashMap<String, Principal>,
}

impl StaticTokenProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token
    pub fn with_token(mut self, token: impl Into<String>, principal: Principal) -> Self {
        self.tokens.insert(token.into(), principal);
        self
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl AuthProvider for StaticTokenProvider {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<AuthContext, RequestError> {
        let Some(token) = bearer_token(headers) else {
            return Ok(AuthContext::Anonymous);
        };

        self.tokens
            .get(token)
            .cloned()
            .map(AuthContext::Authenticated)
            .ok_or(RequestError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn principal(role: Role) -> Principal {
        Principal {
            user_id: "u-1".into(),
            role,
        }
    }

    #[test]
    fn test_authorize_exact_role() {
        assert!(authorize(&principal(Role::Admin), Role::Admin).is_ok());
        assert_eq!(
            authorize(&principal(Role::Admin), Role::Student),
            Err(RequestError::Forbidden)
        );
    }

    #[test]
    fn test_policy_check() {
        let admin = AuthContext::Authenticated(principal(Role::Admin));
        let student = AuthContext::Authenticated(principal(Role::Student));
        let anon = AuthContext::Anonymous;

        assert!(AccessPolicy::Public.check(&anon).is_ok());
        assert_eq!(
            AccessPolicy::Authenticated.check(&anon),
            Err(RequestError::Unauthenticated)
        );
        assert!(AccessPolicy::Authenticated.check(&student).is_ok());
        assert!(AccessPolicy::Role(Role::Admin).check(&admin).is_ok());
        assert_eq!(
            AccessPolicy::Role(Role::Admin).check(&student),
            Err(RequestError::Forbidden)
        );
        assert_eq!(
            AccessPolicy::Role(Role::Admin).check(&anon),
            Err(RequestError::Unauthenticated)
        );
    }

    #[test]
    fn test_parse_policy() {
        assert_eq!(
            AccessPolicy::parse_policy("public").unwrap(),
            AccessPolicy::Public
        );
        assert_eq!(
            AccessPolicy::parse_policy("role:instructor").unwrap(),
            AccessPolicy::Role(Role::Instructor)
        );
        assert!(AccessPolicy::parse_policy("role:janitor").is_err());
        assert!(AccessPolicy::parse_policy("owner").is_err());
    }

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
    }

    #[tokio::test]
    async fn test_static_token_provider() {
        let provider = StaticTokenProvider::new().with_token("secret", principal(Role::Admin));

        let mut headers = HeaderMap::new();
        assert_eq!(
            provider.authenticate(&headers).await,
            Ok(AuthContext::Anonymous)
        );

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer secret"));
        assert_eq!(
            provider.authenticate(&headers).await,
            Ok(AuthContext::Authenticated(principal(Role::Admin)))
        );

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer wrong"));
        assert_eq!(
            provider.authenticate(&headers).await,
            Err(RequestError::InvalidToken)
        );
    }

    #[tokio::test]
    async fn test_no_auth_provider_is_anonymous() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer anything"));
        assert_eq!(
            NoAuthProvider.authenticate(&headers).await,
            Ok(AuthContext::Anonymous)
        );
    }
}
