//! Bearer token service
//!
//! HS256-signed tokens carrying the user id and clearance mask. The
//! clearance in the token is advisory; the auth middleware re-reads the
//! account on every request so revocations take effect immediately.

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{AppError, AppResult};
use crate::models::User;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: i64,
    /// Clearance mask at issue time
    pub clearance: i64,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
}

/// Token issue/validation service
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry: u64,
}

impl JwtService {
    pub fn new(secret: &str, expiry: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiry,
        }
    }

    /// Token lifetime in seconds
    pub fn expiry(&self) -> u64 {
        self.expiry
    }

    /// Issue a token for an authenticated user
    pub fn generate_token(&self, user: &User) -> AppResult<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| AppError::Internal(format!("System time error: {}", e)))?
            .as_secs();

        let claims = Claims {
            sub: user.id,
            clearance: user.clearance.bits(),
            iat: now,
            exp: now + self.expiry,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Validate a token and return its claims
    pub fn validate_token(&self, token: &str) -> AppResult<Claims> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AppError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Clearance;

    fn test_user() -> User {
        User {
            id: 7,
            email: "a@b.co".to_string(),
            name: "Test".to_string(),
            password_hash: String::new(),
            needs_password_change: false,
            clearance: Clearance::USER.grant(Clearance::CFO),
            last_login: None,
        }
    }

    #[test]
    fn test_token_round_trip() {
        let service = JwtService::new("test-secret", 3600);
        let token = service.generate_token(&test_user()).unwrap();
        let claims = service.validate_token(&token).unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.clearance, 3);
    }

    #[test]
    fn test_rejects_foreign_signature() {
        let service = JwtService::new("test-secret", 3600);
        let other = JwtService::new("other-secret", 3600);
        let token = service.generate_token(&test_user()).unwrap();
        assert!(other.validate_token(&token).is_err());
    }
}
