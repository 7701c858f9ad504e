//! Reviewer access policies.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::machine::SYSTEM_REVIEWER_ID;

/// Demo auditor identity, granted view/audit but not decrypt.
pub const DEMO_AUDITOR_ID: &str = "auditor@stacks";

/// Actions a reviewer may be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewerAction {
    Decrypt,
    View,
    Audit,
}

impl fmt::Display for ReviewerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewerAction::Decrypt => write!(f, "decrypt"),
            ReviewerAction::View => write!(f, "view"),
            ReviewerAction::Audit => write!(f, "audit"),
        }
    }
}

/// A reviewer's standing grant: which machines they may operate from, which
/// actions they may perform, and until when.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewerAccessPolicy {
    pub reviewer_id: String,
    pub authorized_machines: Vec<String>,
    pub permissions: Vec<ReviewerAction>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ReviewerAccessPolicy {
    pub fn permits(&self, action: ReviewerAction) -> bool {
        self.permissions.contains(&action)
    }

    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn machine_authorized(&self, machine_id: &str) -> bool {
        self.authorized_machines.iter().any(|m| m == machine_id)
    }
}

/// Outcome of a policy check. `reason` is set exactly when `authorized` is
/// false and names the first failing check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationDecision {
    pub authorized: bool,
    pub reason: Option<String>,
}

impl AuthorizationDecision {
    pub fn allow() -> Self {
        Self {
            authorized: true,
            reason: None,
        }
    }

    pub fn deny(reason: &str) -> Self {
        Self {
            authorized: false,
            reason: Some(reason.to_string()),
        }
    }
}

/// The built-in demo policy set: the system reviewer with full permissions and
/// a view/audit-only auditor, both bound to the given machine with a 30-day
/// window.
pub fn demo_policies(machine_id: &str) -> Vec<ReviewerAccessPolicy> {
    let now = Utc::now();
    let expires_at = now + Duration::days(30);
    vec![
        ReviewerAccessPolicy {
            reviewer_id: SYSTEM_REVIEWER_ID.to_string(),
            authorized_machines: vec![machine_id.to_string()],
            permissions: vec![
                ReviewerAction::Decrypt,
                ReviewerAction::View,
                ReviewerAction::Audit,
            ],
            created_at: now,
            expires_at,
        },
        ReviewerAccessPolicy {
            reviewer_id: DEMO_AUDITOR_ID.to_string(),
            authorized_machines: vec![machine_id.to_string()],
            permissions: vec![ReviewerAction::View, ReviewerAction::Audit],
            created_at: now,
            expires_at,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_policies_shape() {
        let policies = demo_policies("m1");
        assert_eq!(policies.len(), 2);
        assert_eq!(policies[0].reviewer_id, SYSTEM_REVIEWER_ID);
        assert!(policies[0].permits(ReviewerAction::Decrypt));
        assert!(!policies[1].permits(ReviewerAction::Decrypt));
        assert!(policies[1].permits(ReviewerAction::View));
        assert!(policies.iter().all(|p| p.machine_authorized("m1")));
    }

    #[test]
    fn test_expiry_check() {
        let mut policy = demo_policies("m1").remove(0);
        assert!(!policy.expired(Utc::now()));
        policy.expires_at = Utc::now() - Duration::hours(1);
        assert!(policy.expired(Utc::now()));
    }

    #[test]
    fn test_action_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(ReviewerAction::Decrypt).unwrap(),
            "decrypt"
        );
        assert_eq!(ReviewerAction::Audit.to_string(), "audit");
    }
}
