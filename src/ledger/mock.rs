//! In-memory rewards ledger.
//!
//! Holds balances, per-user newest-first transaction records and the dedupe
//! map for the life of the process. State is guarded by one mutex so the
//! dedupe check, balance update and record append are a single atomic
//! sequence under concurrent requests.
//!
//! Minting never fails: when metadata encryption fails the transaction still
//! commits with a placeholder noting the error.

use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::audit::{AccessAuditor, ReviewerAction};
use crate::auth::Role;
use crate::cipher::{CipherService, LegacyBlockData, MachineBinding, LEGACY_ALGORITHM};
use crate::machine::{AuthorizationRegistry, MachineIdentity, SYSTEM_REVIEWER_ID};

use super::types::{
    HistoryEntry, LedgerNetwork, MachineBindingInfo, Metadata, TransactionRecord, TxRef,
};
use super::{annotate_reviewer_view, RewardsLedger};

/// Redacted stand-in shown wherever plaintext metadata is not available.
const REDACTED_PREVIEW: &str = "Goal completion reward";

#[derive(Default)]
struct LedgerState {
    balances: HashMap<String, u64>,
    /// Per-user records, newest first
    records: HashMap<String, Vec<TransactionRecord>>,
    /// dedupe_key -> the original receipt
    dedupe: HashMap<String, TxRef>,
}

pub struct MockLedger {
    identity: Arc<MachineIdentity>,
    registry: Arc<AuthorizationRegistry>,
    cipher: Arc<CipherService>,
    auditor: Arc<AccessAuditor>,
    state: Mutex<LedgerState>,
}

impl MockLedger {
    pub fn new(
        identity: Arc<MachineIdentity>,
        registry: Arc<AuthorizationRegistry>,
        cipher: Arc<CipherService>,
        auditor: Arc<AccessAuditor>,
    ) -> Self {
        Self {
            identity,
            registry,
            cipher,
            auditor,
            state: Mutex::new(LedgerState::default()),
        }
    }

    fn decrypt_for_history(
        &self,
        user_id: &str,
        user_secret: Option<&str>,
        reviewer_mode: bool,
        record: &TransactionRecord,
    ) -> serde_json::Value {
        let Some(block) = record.tx_ref.encrypted_data.as_ref() else {
            return record.metadata.to_value();
        };

        if block.algorithm == LEGACY_ALGORITHM {
            let Some(secret) = user_secret else {
                return record.metadata.to_value();
            };
            let legacy = LegacyBlockData {
                data: block.data.clone(),
                iv: block.iv.clone(),
                algorithm: block.algorithm.clone(),
            };
            return match self.cipher.decrypt_legacy(&legacy, user_id, secret) {
                Ok(value) => value,
                Err(e) => Metadata::DecryptionError(e.to_string()).to_value(),
            };
        }

        if reviewer_mode {
            let outcome = self.auditor.attempt_access(
                user_id,
                SYSTEM_REVIEWER_ID,
                ReviewerAction::Decrypt,
                Some(block),
            );
            return match outcome.data {
                Some(value) => annotate_reviewer_view(value, &block.algorithm),
                None => {
                    let mut placeholder = record.metadata.to_value();
                    if let Some(obj) = placeholder.as_object_mut() {
                        obj.insert(
                            "error".to_string(),
                            json!(outcome
                                .reason
                                .unwrap_or_else(|| "Access denied".to_string())),
                        );
                    }
                    placeholder
                }
            };
        }

        if !self.registry.is_authorized(user_id, Role::User) {
            return Metadata::DecryptionError(format!(
                "Machine not authorized for {user_id} as user"
            ))
            .to_value();
        }
        match self.cipher.decrypt(block, user_id, Role::User) {
            Ok(value) => value,
            Err(e) => Metadata::DecryptionError(e.to_string()).to_value(),
        }
    }
}

impl RewardsLedger for MockLedger {
    fn mint_to(&self, user_id: &str, points: u64, dedupe_key: &str, reason: Option<&str>) -> TxRef {
        let fp = self.identity.fingerprint();
        let reason = reason.unwrap_or("Goal completion");

        let metadata = json!({
            "reason": reason,
            "goalType": "goal_completion",
            "timestamp": Utc::now().to_rfc3339(),
            "pointsAwarded": points,
            "userId": user_id,
            "machineId": fp.machine_id,
            "userContext": fp.user_context,
        });

        // Encrypt outside the lock; the dedupe check below decides whether
        // the result is used.
        let encrypted = self
            .cipher
            .encrypt(&metadata, user_id, Some(SYSTEM_REVIEWER_ID));

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(original) = state.dedupe.get(dedupe_key) {
            debug!(user_id, dedupe_key, "Duplicate mint - returning original receipt");
            return original.clone();
        }

        let (tx_ref, stored_metadata) = match encrypted {
            Ok(block) => {
                let tx_ref = TxRef {
                    network: LedgerNetwork::Mock,
                    id_or_hash: format!("mock_tx_{}", Uuid::new_v4().simple()),
                    timestamp: Utc::now().timestamp_millis(),
                    encrypted: true,
                    machine_binding: Some(block.machine_binding.clone()),
                    encrypted_data: Some(block.clone()),
                };
                let stored = Metadata::RedactedPreview {
                    preview: REDACTED_PREVIEW.to_string(),
                    algorithm: block.algorithm,
                    machine_binding: block.machine_binding,
                };
                (tx_ref, stored)
            }
            Err(e) => {
                warn!(user_id, error = %e, "Metadata encryption failed - committing mint with placeholder");
                let tx_ref = TxRef {
                    network: LedgerNetwork::Mock,
                    id_or_hash: format!("mock_tx_{}", Uuid::new_v4().simple()),
                    timestamp: Utc::now().timestamp_millis(),
                    encrypted: false,
                    machine_binding: None,
                    encrypted_data: None,
                };
                (tx_ref, Metadata::DecryptionError(format!("Encryption failed: {e}")))
            }
        };

        *state.balances.entry(user_id.to_string()).or_insert(0) += points;
        state
            .dedupe
            .insert(dedupe_key.to_string(), tx_ref.clone());
        state
            .records
            .entry(user_id.to_string())
            .or_default()
            .insert(
                0,
                TransactionRecord {
                    points,
                    encrypted: tx_ref.encrypted,
                    metadata: stored_metadata,
                    tx_ref: tx_ref.clone(),
                },
            );

        tx_ref
    }

    fn balance_of(&self, user_id: &str) -> u64 {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.balances.get(user_id).copied().unwrap_or(0)
    }

    fn history(
        &self,
        user_id: &str,
        user_secret: Option<&str>,
        reviewer_mode: bool,
        limit: Option<usize>,
    ) -> Vec<HistoryEntry> {
        // Snapshot under the lock, decrypt outside it. The KDF makes each
        // decrypt attempt deliberately slow, so the limit is applied before
        // any cryptographic work.
        let records: Vec<TransactionRecord> = {
            let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            let records = state.records.get(user_id).map(Vec::as_slice).unwrap_or(&[]);
            let take = limit.unwrap_or(records.len()).min(records.len());
            records[..take].to_vec()
        };

        records
            .iter()
            .map(|record| {
                let metadata = if record.encrypted {
                    self.decrypt_for_history(user_id, user_secret, reviewer_mode, record)
                } else {
                    record.metadata.to_value()
                };
                HistoryEntry {
                    points: record.points,
                    tx_ref: record.tx_ref.clone(),
                    metadata,
                }
            })
            .collect()
    }

    fn machine_binding_info(&self) -> MachineBindingInfo {
        let current_machine = self.identity.fingerprint().machine_id;
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let mut referenced_machines: Vec<String> = Vec::new();
        let mut encrypted_records = 0;
        let mut decryptable_records = 0;

        for record in state.records.values().flatten() {
            let Some(encoded) = record.tx_ref.machine_binding.as_deref() else {
                continue;
            };
            encrypted_records += 1;
            if let Ok(binding) = MachineBinding::decode(encoded) {
                if !referenced_machines.contains(&binding.user_machine_id) {
                    referenced_machines.push(binding.user_machine_id.clone());
                }
                if binding.permits(&current_machine) {
                    decryptable_records += 1;
                }
            }
        }

        MachineBindingInfo {
            current_machine,
            authorized_machines: referenced_machines,
            encrypted_records,
            decryptable_records,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::ALGORITHM;
    use crate::machine::DEMO_USER_ID;

    fn ledger() -> MockLedger {
        let identity = Arc::new(MachineIdentity::new("ledger-test-salt".to_string()));
        let registry = Arc::new(AuthorizationRegistry::new(Arc::clone(&identity), None));
        let cipher = Arc::new(CipherService::new(
            Arc::clone(&identity),
            Arc::clone(&registry),
            "test-master".to_string(),
            "test-reviewer-master".to_string(),
        ));
        let auditor = Arc::new(AccessAuditor::new(
            Arc::clone(&identity),
            Arc::clone(&cipher),
        ));
        MockLedger::new(identity, registry, cipher, auditor)
    }

    #[test]
    fn test_mint_and_balance() {
        let ledger = ledger();
        assert_eq!(ledger.balance_of("alice"), 0);

        ledger.mint_to("alice", 50, "k1", Some("Saved $100"));
        assert_eq!(ledger.balance_of("alice"), 50);

        ledger.mint_to("alice", 25, "k2", None);
        assert_eq!(ledger.balance_of("alice"), 75);
    }

    #[test]
    fn test_duplicate_dedupe_key_returns_original_receipt() {
        let ledger = ledger();
        let first = ledger.mint_to("alice", 50, "k1", None);
        let second = ledger.mint_to("alice", 50, "k1", None);

        assert_eq!(ledger.balance_of("alice"), 50);
        assert_eq!(second.id_or_hash, first.id_or_hash);
        assert_eq!(ledger.history("alice", None, false, None).len(), 1);
    }

    #[test]
    fn test_mint_stores_redacted_metadata() {
        let ledger = ledger();
        let tx = ledger.mint_to(DEMO_USER_ID, 10, "k1", None);
        assert!(tx.encrypted);
        assert!(tx.encrypted_data.is_some());

        let state = ledger.state.lock().unwrap();
        let record = &state.records[DEMO_USER_ID][0];
        // The stored metadata must not contain plaintext
        match &record.metadata {
            Metadata::RedactedPreview { preview, .. } => {
                assert_eq!(preview, REDACTED_PREVIEW);
            }
            other => panic!("expected redacted preview, got {other:?}"),
        }
    }

    #[test]
    fn test_history_newest_first_with_decrypted_metadata() {
        let ledger = ledger();
        ledger.mint_to(DEMO_USER_ID, 10, "k1", Some("first"));
        ledger.mint_to(DEMO_USER_ID, 20, "k2", Some("second"));

        let history = ledger.history(DEMO_USER_ID, None, false, None);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].points, 20);
        assert_eq!(history[0].metadata["reason"], "second");
        assert_eq!(history[1].metadata["reason"], "first");
        assert_eq!(history[1].metadata["pointsAwarded"], 10);
    }

    #[test]
    fn test_history_limit_caps_newest_first() {
        let ledger = ledger();
        for i in 0..5 {
            ledger.mint_to(DEMO_USER_ID, 10 + i, &format!("k{i}"), Some(&format!("r{i}")));
        }

        let history = ledger.history(DEMO_USER_ID, None, false, Some(3));
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].metadata["reason"], "r4");
        assert_eq!(history[2].metadata["reason"], "r2");

        // Limit larger than the record count is not an error
        assert_eq!(
            ledger.history(DEMO_USER_ID, None, false, Some(50)).len(),
            5
        );
    }

    #[test]
    fn test_history_unauthorized_user_gets_placeholder() {
        // "bob" has no grant in the demo set
        let ledger = ledger();
        ledger.mint_to("bob", 10, "k1", Some("secret reason"));

        let history = ledger.history("bob", None, false, None);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].metadata["encrypted"], true);
        assert!(history[0].metadata["error"].is_string());
        assert!(history[0].metadata.get("reason").is_none());
        // Balance is visible regardless
        assert_eq!(ledger.balance_of("bob"), 10);
    }

    #[test]
    fn test_reviewer_history_annotated() {
        let ledger = ledger();
        ledger.mint_to(DEMO_USER_ID, 10, "k1", Some("reviewed"));

        let history = ledger.history(DEMO_USER_ID, None, true, None);
        assert_eq!(history[0].metadata["reason"], "reviewed");
        assert_eq!(history[0].metadata["_encryptionAlgorithm"], ALGORITHM);
        assert!(history[0].metadata["_decryptedOn"].is_string());

        // The reviewer read left an audit trail
        assert_eq!(ledger.auditor.logs(Some(SYSTEM_REVIEWER_ID)).len(), 1);
    }

    #[test]
    fn test_machine_binding_info() {
        let ledger = ledger();
        ledger.mint_to(DEMO_USER_ID, 10, "k1", None);
        ledger.mint_to("bob", 5, "k2", None);

        let info = ledger.machine_binding_info();
        assert_eq!(info.encrypted_records, 2);
        assert_eq!(info.decryptable_records, 2);
        assert_eq!(info.authorized_machines.len(), 1);
        assert_eq!(info.authorized_machines[0], info.current_machine);
    }
}
