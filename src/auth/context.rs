//! Auth context extraction.
//!
//! Derives `{user_id, role, user_secret?}` from a request's headers. A valid
//! bearer token wins; absent one, demo mode falls back to the demo identity
//! headers. Production mode without a valid token is a hard 401 - the demo
//! fallback is explicitly a non-production default.

use hyper::header::{HeaderMap, AUTHORIZATION};
use tracing::debug;

use crate::machine::DEMO_USER_ID;
use crate::types::{Result, VaultError};

use super::{extract_token_from_header, JwtValidator, Role};

/// Demo identity header (demo mode only).
pub const DEMO_USER_HEADER: &str = "x-demo-user-id";

/// Optional user secret for legacy record decryption.
pub const USER_SECRET_HEADER: &str = "x-user-secret";

/// The resolved identity of an inbound request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub role: Role,
    /// Caller-supplied secret for decrypting legacy records
    pub user_secret: Option<String>,
}

impl AuthContext {
    /// Resolve the auth context from request headers.
    pub fn from_headers(
        headers: &HeaderMap,
        jwt: &JwtValidator,
        demo_mode: bool,
    ) -> Result<Self> {
        let user_secret = header_str(headers, USER_SECRET_HEADER).map(str::to_string);

        let auth_header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        if let Some(token) = extract_token_from_header(auth_header) {
            let result = jwt.verify_token(token);
            if let Some(claims) = result.claims.filter(|_| result.valid) {
                debug!(user_id = %claims.user_id, role = %claims.role, "Bearer token accepted");
                return Ok(Self {
                    user_id: claims.user_id,
                    role: claims.role,
                    user_secret,
                });
            }
            if !demo_mode {
                return Err(VaultError::Auth(
                    result.error.unwrap_or_else(|| "Invalid token".to_string()),
                ));
            }
            debug!("Invalid bearer token - falling back to demo identity");
        }

        if !demo_mode {
            return Err(VaultError::Auth("Authentication required".to_string()));
        }

        let user_id = header_str(headers, DEMO_USER_HEADER)
            .unwrap_or(DEMO_USER_ID)
            .to_string();
        Ok(Self {
            user_id,
            role: Role::User,
            user_secret,
        })
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    fn jwt() -> JwtValidator {
        JwtValidator::new("ctx-secret", 86400)
    }

    #[test]
    fn test_bearer_token_resolves_claims() {
        let jwt = jwt();
        let token = jwt.issue("alice", Role::Reviewer, "m1").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );

        let ctx = AuthContext::from_headers(&headers, &jwt, false).unwrap();
        assert_eq!(ctx.user_id, "alice");
        assert_eq!(ctx.role, Role::Reviewer);
    }

    #[test]
    fn test_demo_fallback_uses_header() {
        let mut headers = HeaderMap::new();
        headers.insert(DEMO_USER_HEADER, HeaderValue::from_static("carol@demo"));
        headers.insert(USER_SECRET_HEADER, HeaderValue::from_static("hunter2"));

        let ctx = AuthContext::from_headers(&headers, &jwt(), true).unwrap();
        assert_eq!(ctx.user_id, "carol@demo");
        assert_eq!(ctx.role, Role::User);
        assert_eq!(ctx.user_secret.as_deref(), Some("hunter2"));
    }

    #[test]
    fn test_demo_fallback_default_identity() {
        let ctx = AuthContext::from_headers(&HeaderMap::new(), &jwt(), true).unwrap();
        assert_eq!(ctx.user_id, DEMO_USER_ID);
        assert_eq!(ctx.role, Role::User);
    }

    #[test]
    fn test_production_requires_token() {
        let err = AuthContext::from_headers(&HeaderMap::new(), &jwt(), false).unwrap_err();
        assert!(matches!(err, VaultError::Auth(_)));
    }

    #[test]
    fn test_production_rejects_invalid_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer garbage"));
        let err = AuthContext::from_headers(&headers, &jwt(), false).unwrap_err();
        assert!(matches!(err, VaultError::Auth(_)));
    }

    #[test]
    fn test_demo_mode_ignores_invalid_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer garbage"));
        let ctx = AuthContext::from_headers(&headers, &jwt(), true).unwrap();
        assert_eq!(ctx.user_id, DEMO_USER_ID);
    }
}
