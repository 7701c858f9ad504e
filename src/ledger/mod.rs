//! Rewards ledger
//!
//! Append-only, idempotent record of point-minting transactions with
//! per-record encrypted metadata and role-gated visibility on read. Balances
//! are never gated: decryption protects metadata only, never point totals.

pub mod factory;
pub mod mock;
pub mod types;

pub use factory::{build_ledger, LedgerBackend};
pub use mock::MockLedger;
pub use types::{
    HistoryEntry, LedgerNetwork, MachineBindingInfo, Metadata, TransactionRecord, TxRef,
};

use serde_json::Value;

/// The ledger contract: idempotent mint, balance lookup, role-gated history
/// and an operator-facing binding diagnostic.
///
/// Every method is infallible by contract. Encryption and decryption failures
/// degrade to structured placeholders rather than surfacing as errors.
pub trait RewardsLedger: Send + Sync {
    /// Mint `points` to `user_id`, deduplicated on `dedupe_key`. A repeated
    /// key returns the original receipt without changing the balance.
    fn mint_to(&self, user_id: &str, points: u64, dedupe_key: &str, reason: Option<&str>) -> TxRef;

    /// Current balance, zero for unknown users.
    fn balance_of(&self, user_id: &str) -> u64;

    /// Transaction history, newest first. `user_secret` unlocks legacy
    /// records; `reviewer_mode` routes decryption through the access auditor.
    /// `limit` caps the result before any decryption work is done; `None`
    /// returns everything.
    fn history(
        &self,
        user_id: &str,
        user_secret: Option<&str>,
        reviewer_mode: bool,
        limit: Option<usize>,
    ) -> Vec<HistoryEntry>;

    /// Aggregate machine-binding diagnostic across all stored records.
    fn machine_binding_info(&self) -> MachineBindingInfo;
}

/// Annotate decrypted reviewer metadata with access provenance.
pub(crate) fn annotate_reviewer_view(mut value: Value, algorithm: &str) -> Value {
    if let Some(obj) = value.as_object_mut() {
        obj.insert(
            "_decryptedOn".to_string(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );
        obj.insert(
            "_encryptionAlgorithm".to_string(),
            Value::String(algorithm.to_string()),
        );
    }
    value
}
