//! Authorized-machine grant registry.
//!
//! Answers "is the current machine allowed to act as (user, role)?". Grants
//! come from static configuration (`AUTHORIZED_MACHINES` JSON). In demo mode,
//! missing or malformed configuration degrades to a synthesized default that
//! authorizes the *current* machine for a fixed demo user and the system
//! reviewer - meaning every machine running the process is trivially
//! authorized for the demo identities. Production startup rejects that
//! degradation in `Args::validate()`.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::auth::Role;

use super::MachineIdentity;

/// Default demo user identity.
pub const DEMO_USER_ID: &str = "demo@user";

/// Fixed reviewer identity used for reviewer key derivation and grants.
pub const SYSTEM_REVIEWER_ID: &str = "reviewer@system";

// =============================================================================
// Grant Record
// =============================================================================

/// A grant allowing a machine to act as a given user/role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizedMachine {
    /// Fingerprint machine_id this grant applies to
    pub machine_id: String,

    /// User identity the machine may act as
    pub user_id: String,

    /// Role the machine may assume for that user
    pub role: Role,

    /// Grants can be disabled without being removed
    pub authorized: bool,

    /// Operator-facing description
    pub label: String,
}

// =============================================================================
// Registry
// =============================================================================

/// Holds the authorized-machine grant set for this process.
pub struct AuthorizationRegistry {
    identity: Arc<MachineIdentity>,
    configured: Option<Vec<AuthorizedMachine>>,
}

impl AuthorizationRegistry {
    /// Build the registry from raw configuration.
    ///
    /// `configured = None` (or malformed JSON already rejected upstream for
    /// production) selects the demo default grant set.
    pub fn new(identity: Arc<MachineIdentity>, configured: Option<Vec<AuthorizedMachine>>) -> Self {
        if configured.is_none() {
            warn!(
                demo_user = DEMO_USER_ID,
                reviewer = SYSTEM_REVIEWER_ID,
                "No AUTHORIZED_MACHINES configured - current machine authorized for demo identities"
            );
        }
        Self {
            identity,
            configured,
        }
    }

    /// The effective grant list: configured entries, or the synthesized demo
    /// default authorizing the current machine for the demo identities.
    pub fn list(&self) -> Vec<AuthorizedMachine> {
        match &self.configured {
            Some(machines) => machines.clone(),
            None => {
                let machine_id = self.identity.fingerprint().machine_id;
                vec![
                    AuthorizedMachine {
                        machine_id: machine_id.clone(),
                        user_id: DEMO_USER_ID.to_string(),
                        role: Role::User,
                        authorized: true,
                        label: "Demo user on current machine".to_string(),
                    },
                    AuthorizedMachine {
                        machine_id,
                        user_id: SYSTEM_REVIEWER_ID.to_string(),
                        role: Role::Reviewer,
                        authorized: true,
                        label: "System reviewer on current machine".to_string(),
                    },
                ]
            }
        }
    }

    /// True iff a grant exists matching the current machine's fingerprint,
    /// the given user, the given role, and `authorized = true`.
    pub fn is_authorized(&self, user_id: &str, role: Role) -> bool {
        let current = self.identity.fingerprint();
        self.list().iter().any(|m| {
            m.authorized
                && m.machine_id == current.machine_id
                && m.user_id == user_id
                && m.role == role
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Arc<MachineIdentity> {
        Arc::new(MachineIdentity::new("registry-test-salt".to_string()))
    }

    #[test]
    fn test_demo_default_authorizes_current_machine() {
        let registry = AuthorizationRegistry::new(identity(), None);

        assert!(registry.is_authorized(DEMO_USER_ID, Role::User));
        assert!(registry.is_authorized(SYSTEM_REVIEWER_ID, Role::Reviewer));
        // No cross-role leakage
        assert!(!registry.is_authorized(DEMO_USER_ID, Role::Reviewer));
        assert!(!registry.is_authorized(SYSTEM_REVIEWER_ID, Role::User));
    }

    #[test]
    fn test_unknown_user_not_authorized() {
        let registry = AuthorizationRegistry::new(identity(), None);
        assert!(!registry.is_authorized("bob", Role::User));
    }

    #[test]
    fn test_configured_grants_replace_defaults() {
        let id = identity();
        let machine_id = id.fingerprint().machine_id;
        let grants = vec![AuthorizedMachine {
            machine_id,
            user_id: "alice".to_string(),
            role: Role::User,
            authorized: true,
            label: "alice workstation".to_string(),
        }];
        let registry = AuthorizationRegistry::new(id, Some(grants));

        assert!(registry.is_authorized("alice", Role::User));
        // Demo identities no longer implicitly authorized
        assert!(!registry.is_authorized(DEMO_USER_ID, Role::User));
    }

    #[test]
    fn test_disabled_grant_denied() {
        let id = identity();
        let machine_id = id.fingerprint().machine_id;
        let grants = vec![AuthorizedMachine {
            machine_id,
            user_id: "alice".to_string(),
            role: Role::User,
            authorized: false,
            label: "revoked".to_string(),
        }];
        let registry = AuthorizationRegistry::new(id, Some(grants));
        assert!(!registry.is_authorized("alice", Role::User));
    }

    #[test]
    fn test_foreign_machine_denied() {
        let grants = vec![AuthorizedMachine {
            machine_id: "not-this-machine".to_string(),
            user_id: "alice".to_string(),
            role: Role::User,
            authorized: true,
            label: "other host".to_string(),
        }];
        let registry = AuthorizationRegistry::new(identity(), Some(grants));
        assert!(!registry.is_authorized("alice", Role::User));
    }
}
