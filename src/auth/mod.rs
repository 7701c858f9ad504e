//! Authentication for stacks-vault
//!
//! Provides:
//! - The user/reviewer role model
//! - JWT token issuing and validation
//! - Auth context extraction from request headers (with demo fallback)

pub mod context;
pub mod jwt;

pub use context::{AuthContext, DEMO_USER_HEADER, USER_SECRET_HEADER};
pub use jwt::{extract_token_from_header, Claims, JwtValidator, TokenValidationResult};

use serde::{Deserialize, Serialize};
use std::fmt;

/// The two-role authorization model.
///
/// Users see their own decrypted transaction metadata; reviewers are a
/// secondary, audited role with separate expiring machine-bound grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Reviewer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Reviewer => write!(f, "reviewer"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "reviewer" => Ok(Role::Reviewer),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::from_str::<Role>("\"reviewer\"").unwrap(),
            Role::Reviewer
        );
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert!("admin".parse::<Role>().is_err());
    }
}
