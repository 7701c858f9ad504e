//! Reviewer access gate and audit log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::auth::Role;
use crate::cipher::{CipherService, EncryptedBlockData};
use crate::machine::MachineIdentity;

use super::policy::{demo_policies, AuthorizationDecision, ReviewerAccessPolicy, ReviewerAction};

/// Ring buffer capacity for the in-memory audit trail. Oldest entries are
/// evicted once the cap is reached.
pub const MAX_LOG_ENTRIES: usize = 10_000;

/// One recorded reviewer access attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogEntry {
    pub user_id: String,
    pub reviewer_id: String,
    pub machine_id: String,
    pub action: ReviewerAction,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Result of an access attempt: the decrypted payload when the action was
/// decrypt and everything succeeded, otherwise a denial reason.
#[derive(Debug)]
pub struct AccessOutcome {
    pub success: bool,
    pub data: Option<Value>,
    pub reason: Option<String>,
}

/// Gates reviewer actions against access policies and records every attempt.
pub struct AccessAuditor {
    identity: Arc<MachineIdentity>,
    cipher: Arc<CipherService>,
    policies: Vec<ReviewerAccessPolicy>,
    logs: Mutex<VecDeque<AccessLogEntry>>,
}

impl AccessAuditor {
    /// Build with the default demo policy set bound to the current machine.
    pub fn new(identity: Arc<MachineIdentity>, cipher: Arc<CipherService>) -> Self {
        let machine_id = identity.fingerprint().machine_id;
        Self::with_policies(identity, cipher, demo_policies(&machine_id))
    }

    /// Build with an explicit policy set.
    pub fn with_policies(
        identity: Arc<MachineIdentity>,
        cipher: Arc<CipherService>,
        policies: Vec<ReviewerAccessPolicy>,
    ) -> Self {
        Self {
            identity,
            cipher,
            policies,
            logs: Mutex::new(VecDeque::with_capacity(256)),
        }
    }

    /// Check whether `reviewer_id` may perform `action` from this machine.
    ///
    /// Exactly one denial reason is reported, in fixed precedence: unknown
    /// reviewer, then expiry, then permission, then machine.
    pub fn is_reviewer_authorized(
        &self,
        reviewer_id: &str,
        action: ReviewerAction,
    ) -> AuthorizationDecision {
        let Some(policy) = self.policies.iter().find(|p| p.reviewer_id == reviewer_id) else {
            return AuthorizationDecision::deny("not found");
        };
        if policy.expired(Utc::now()) {
            return AuthorizationDecision::deny("expired");
        }
        if !policy.permits(action) {
            return AuthorizationDecision::deny("missing permission");
        }
        let machine_id = self.identity.fingerprint().machine_id;
        if !policy.machine_authorized(&machine_id) {
            return AuthorizationDecision::deny("machine not authorized");
        }
        AuthorizationDecision::allow()
    }

    /// Attempt a reviewer action against a user's data. Appends exactly one
    /// audit entry per call, whose success flag matches the outcome the
    /// caller observes, including cipher failures after the policy check
    /// passed.
    pub fn attempt_access(
        &self,
        user_id: &str,
        reviewer_id: &str,
        action: ReviewerAction,
        encrypted_data: Option<&EncryptedBlockData>,
    ) -> AccessOutcome {
        let decision = self.is_reviewer_authorized(reviewer_id, action);

        let outcome = if !decision.authorized {
            warn!(
                reviewer_id,
                user_id,
                %action,
                reason = decision.reason.as_deref().unwrap_or(""),
                "Reviewer access denied"
            );
            AccessOutcome {
                success: false,
                data: None,
                reason: decision.reason,
            }
        } else if action != ReviewerAction::Decrypt {
            AccessOutcome {
                success: true,
                data: None,
                reason: None,
            }
        } else if let Some(block) = encrypted_data {
            match self.cipher.decrypt(block, user_id, Role::Reviewer) {
                Ok(value) => AccessOutcome {
                    success: true,
                    data: Some(value),
                    reason: None,
                },
                Err(e) => AccessOutcome {
                    success: false,
                    data: None,
                    reason: Some(e.to_string()),
                },
            }
        } else {
            AccessOutcome {
                success: false,
                data: None,
                reason: Some("No encrypted data supplied".to_string()),
            }
        };

        // Logged only once the outcome is known. Appending before the slow
        // decrypt and amending afterwards would let a concurrent append land
        // between the two lock acquisitions and misattribute the amendment.
        self.append_log(AccessLogEntry {
            user_id: user_id.to_string(),
            reviewer_id: reviewer_id.to_string(),
            machine_id: self.identity.fingerprint().machine_id,
            action,
            timestamp: Utc::now(),
            success: outcome.success,
            reason: outcome.reason.clone(),
        });

        outcome
    }

    /// All recorded attempts, optionally filtered to one reviewer.
    pub fn logs(&self, reviewer_id: Option<&str>) -> Vec<AccessLogEntry> {
        let logs = self.logs.lock().unwrap_or_else(|e| e.into_inner());
        match reviewer_id {
            Some(id) => logs.iter().filter(|l| l.reviewer_id == id).cloned().collect(),
            None => logs.iter().cloned().collect(),
        }
    }

    /// Record the intent to enroll a reviewer machine. The in-memory policy
    /// set is static; a persistent registry would apply this.
    pub fn authorize_reviewer_machine(&self, reviewer_id: &str, machine_id: &str) {
        info!(reviewer_id, machine_id, "Reviewer machine authorization requested (not persisted)");
    }

    /// Record the intent to revoke a reviewer's access. Not persisted, see
    /// `authorize_reviewer_machine`.
    pub fn revoke_reviewer_access(&self, reviewer_id: &str) {
        info!(reviewer_id, "Reviewer access revocation requested (not persisted)");
    }

    fn append_log(&self, entry: AccessLogEntry) {
        let mut logs = self.logs.lock().unwrap_or_else(|e| e.into_inner());
        if logs.len() == MAX_LOG_ENTRIES {
            logs.pop_front();
        }
        logs.push_back(entry);
    }
}

// =============================================================================
// Tests
// =============================================================================
