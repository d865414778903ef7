//! Bearer-token authentication

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Caller identity
    pub subject: String,
    /// May start generation runs
    pub is_admin: bool,
}

/// Resolves bearer tokens to principals
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Principal for `token`, or `None` if the token is unknown
    async fn authenticate(&self, token: &str) -> Option<Principal>;
}

/// One row of the static token table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEntry {
    /// Bearer token
    pub token: String,
    /// Caller identity
    pub subject: String,
    /// Administrative access
    #[serde(default)]
    pub admin: bool,
}

impl TokenEntry {
    /// Create administrative entry
    #[must_use]
    pub fn admin(subject: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            subject: subject.into(),
            admin: true,
        }
    }

    /// Create non-administrative entry
    #[must_use]
    pub fn viewer(subject: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            subject: subject.into(),
            admin: false,
        }
    }
}

/// Authenticator over a configured token table
#[derive(Debug, Clone, Default)]
pub struct StaticTokenAuthenticator {
    tokens: HashMap<String, Principal>,
}

impl StaticTokenAuthenticator {
    /// Create from table rows; later rows win on duplicate tokens
    #[must_use]
    pub fn new(entries: impl IntoIterator<Item = TokenEntry>) -> Self {
        let tokens = entries
            .into_iter()
            .filter(|e| !e.token.is_empty())
            .map(|e| {
                (
                    e.token,
                    Principal {
                        subject: e.subject,
                        is_admin: e.admin,
                    },
                )
            })
            .collect();
        Self { tokens }
    }
}

#[async_trait]
impl Authenticator for StaticTokenAuthenticator {
    async fn authenticate(&self, token: &str) -> Option<Principal> {
        self.tokens.get(token).cloned()
    }
}

/// Extract the token from an `Authorization` header value
#[must_use]
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
