//! Bearer-token identity resolution.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use uuid::Uuid;

use solace_core::config::AuthConfig;

/// Maps a caller credential to a stable user identity.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// `None` means the credential is unknown and the request is rejected.
    async fn resolve(&self, token: &str) -> Option<Uuid>;
}

/// Config-declared token table.
pub struct TokenMap {
    tokens: HashMap<String, Uuid>,
    accept_user_id_tokens: bool,
}

impl TokenMap {
    pub fn from_config(config: &AuthConfig) -> Self {
        let tokens = config
            .tokens
            .iter()
            .map(|entry| (entry.token.clone(), entry.user_id))
            .collect();
        Self {
            tokens,
            accept_user_id_tokens: config.accept_user_id_tokens,
        }
    }
}

#[async_trait]
impl IdentityResolver for TokenMap {
    async fn resolve(&self, token: &str) -> Option<Uuid> {
        if let Some(user_id) = self.tokens.get(token) {
            return Some(*user_id);
        }
        if self.accept_user_id_tokens {
            return Uuid::parse_str(token).ok();
        }
        None
    }
}

/// Extract the bearer token from an Authorization header, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}
