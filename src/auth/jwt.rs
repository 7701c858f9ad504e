//! JWT token issuing and validation.
//!
//! Tokens are HS256-signed with the encryption master secret and carry the
//! user identity, role, and the machine fingerprint observed at issue time.
//! Validity defaults to 24 hours from issuance.

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::types::{Result, VaultError};

use super::Role;

/// JWT claims carried by a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// User identity this token acts as
    pub user_id: String,

    /// Role granted to the token
    pub role: Role,

    /// Machine fingerprint observed when the token was issued
    pub machine_id: String,

    /// Issued-at (seconds since epoch)
    pub iat: i64,

    /// Expiry (seconds since epoch)
    pub exp: i64,
}

/// Result of verifying a token.
#[derive(Debug)]
pub struct TokenValidationResult {
    pub valid: bool,
    pub claims: Option<Claims>,
    pub error: Option<String>,
}

/// Issues and verifies HS256 bearer tokens.
pub struct JwtValidator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry_seconds: u64,
}

impl JwtValidator {
    /// Create a validator from the shared secret.
    pub fn new(secret: &str, expiry_seconds: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiry_seconds,
        }
    }

    /// Issue a token for `(user_id, role)` bound to the given machine id.
    pub fn issue(&self, user_id: &str, role: Role, machine_id: &str) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            user_id: user_id.to_string(),
            role,
            machine_id: machine_id.to_string(),
            iat: now,
            exp: now + self.expiry_seconds as i64,
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| VaultError::Auth(format!("Token signing failed: {e}")))
    }

    /// Verify a token, returning claims when valid.
    pub fn verify_token(&self, token: &str) -> TokenValidationResult {
        match decode::<Claims>(token, &self.decoding_key, &Validation::default()) {
            Ok(data) => TokenValidationResult {
                valid: true,
                claims: Some(data.claims),
                error: None,
            },
            Err(e) => TokenValidationResult {
                valid: false,
                claims: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Extract a bearer token from an `Authorization` header value.
pub fn extract_token_from_header(header: Option<&str>) -> Option<&str> {
    header?.strip_prefix("Bearer ").filter(|t| !t.is_empty())
}

// =============================================================================
// Tests
// =============================================================================
