//! Session collaborator: turns an upgrade request into a verified user id

use async_trait::async_trait;
use log::debug;
use warp::hyper::HeaderMap;

use crate::auth::token::{extract_bearer_token, TokenManager};
use crate::constants::SESSION_COOKIE;
use crate::core::message::UserId;
use crate::error::{ParlorError, Result};

/// Resolves the identity behind a request. The hub never issues credentials.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn resolve(&self, headers: &HeaderMap) -> Result<UserId>;
}

/// Pull the value of a named cookie out of the Cookie header
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all("cookie")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Token lookup order: Authorization header, X-Auth-Token, session cookie
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(extract_bearer_token)
    {
        debug!("Token extracted from Authorization header");
        return Some(token);
    }

    if let Some(token) = headers.get("x-auth-token").and_then(|v| v.to_str().ok()) {
        debug!("Token extracted from X-Auth-Token header");
        return Some(token.to_string());
    }

    cookie_value(headers, SESSION_COOKIE)
}

/// Verifies signed session tokens
pub struct TokenSessionResolver {
    tokens: TokenManager,
}

impl TokenSessionResolver {
    pub fn new(secret: &str) -> Self {
        Self {
            tokens: TokenManager::new(secret),
        }
    }
}

#[async_trait]
impl SessionResolver for TokenSessionResolver {
    async fn resolve(&self, headers: &HeaderMap) -> Result<UserId> {
        let token = extract_session_token(headers).ok_or(ParlorError::Unauthorized)?;
        self.tokens.validate_and_get_user_id(&token)
    }
}
