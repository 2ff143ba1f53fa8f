use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::core::message::UserId;
use crate::error::{ParlorError, Result};

fn unix_now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as usize)
        .unwrap_or(0)
}

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (numeric user ID as a string)
    pub sub: String,
    /// Username
    pub username: String,
    /// Expiration time (as UTC timestamp)
    pub exp: usize,
    /// Issued at (as UTC timestamp)
    pub iat: usize,
}

impl Claims {
    /// Creates new claims for a user, valid for 24 hours
    pub fn new(user_id: UserId, username: String) -> Self {
        Self::with_expiration(user_id, username, 24)
    }

    /// Creates claims with custom expiration
    pub fn with_expiration(user_id: UserId, username: String, hours: usize) -> Self {
        let now = unix_now();
        Self {
            sub: user_id.to_string(),
            username,
            exp: now + hours * 3600,
            iat: now,
        }
    }

    /// Check if the token is expired
    pub fn is_expired(&self) -> bool {
        unix_now() > self.exp
    }
}

/// Manages JWT token operations
pub struct TokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenManager {
    /// Creates a new token manager with a secret
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        }
    }

    /// Generates a JWT token for the given claims
    pub fn generate_token(&self, claims: &Claims) -> Result<String> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|e| ParlorError::AuthError(format!("Failed to generate token: {}", e)))
    }

    /// Validates and decodes a JWT token
    pub fn validate_token(&self, token: &str) -> Result<TokenData<Claims>> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| ParlorError::AuthError(format!("Invalid token: {}", e)))
    }

    /// Validates a token and returns the user ID if valid
    pub fn validate_and_get_user_id(&self, token: &str) -> Result<UserId> {
        let claims = self.validate_token(token)?.claims;

        if claims.is_expired() {
            return Err(ParlorError::AuthError("Token expired".to_string()));
        }

        match claims.sub.parse::<UserId>() {
            Ok(id) if id > 0 => Ok(id),
            _ => Err(ParlorError::AuthError(format!(
                "Token subject '{}' is not a user id",
                claims.sub
            ))),
        }
    }
}

/// Extracts bearer token from Authorization header
pub fn extract_bearer_token(auth_header: &str) -> Option<String> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip_yields_user_id() {
        let manager = TokenManager::new("token-tests-secret-0123456789abcdef");
        let token = manager.generate_token(&Claims::new(42, "alice".to_string())).unwrap();
        assert_eq!(manager.validate_and_get_user_id(&token).unwrap(), 42);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = TokenManager::new("token-tests-secret-0123456789abcdef");
        let verifier = TokenManager::new("another-secret-fedcba9876543210xyz");
        let token = issuer.generate_token(&Claims::new(42, "alice".to_string())).unwrap();
        assert!(verifier.validate_and_get_user_id(&token).is_err());
    }

    #[test]
    fn test_non_numeric_subject_rejected() {
        let manager = TokenManager::new("token-tests-secret-0123456789abcdef");
        let mut claims = Claims::new(1, "alice".to_string());
        claims.sub = "alice".to_string();
        let token = manager.generate_token(&claims).unwrap();
        assert!(manager.validate_and_get_user_id(&token).is_err());
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc"), Some("abc".to_string()));
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
    }
}
