//! Ledger wire and storage types.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::cipher::EncryptedBlockData;

/// Which network a transaction reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerNetwork {
    Mock,
    Local,
    Testnet,
}

/// Immutable receipt for one mint operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxRef {
    pub network: LedgerNetwork,
    pub id_or_hash: String,
    pub timestamp: i64,
    pub encrypted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_binding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted_data: Option<EncryptedBlockData>,
}

/// What a reader is allowed to see of a record's metadata.
///
/// Callers must handle all three cases; there is no ad hoc `.encrypted` or
/// `.error` field probing on a loose object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Metadata {
    /// Decrypted (or never-encrypted) metadata
    Plaintext(Value),

    /// Redacted stand-in stored alongside encrypted records so in-process
    /// introspection never sees plaintext
    RedactedPreview {
        preview: String,
        algorithm: String,
        machine_binding: String,
    },

    /// Cryptographic or authorization failure, with a non-sensitive reason
    DecryptionError(String),
}

impl Metadata {
    /// Render to the wire shape history responses carry.
    pub fn to_value(&self) -> Value {
        match self {
            Metadata::Plaintext(v) => v.clone(),
            Metadata::RedactedPreview {
                preview,
                algorithm,
                machine_binding,
            } => json!({
                "encrypted": true,
                "preview": preview,
                "algorithm": algorithm,
                "machineBinding": machine_binding,
            }),
            Metadata::DecryptionError(reason) => json!({
                "encrypted": true,
                "error": reason,
            }),
        }
    }
}

/// Ledger-internal stored record. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    pub points: u64,
    pub tx_ref: TxRef,
    pub metadata: Metadata,
    pub encrypted: bool,
}

/// One entry of a history response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub points: u64,
    pub tx_ref: TxRef,
    pub metadata: Value,
}

/// Operator diagnostic over all stored records.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineBindingInfo {
    pub current_machine: String,
    pub authorized_machines: Vec<String>,
    pub encrypted_records: usize,
    pub decryptable_records: usize,
}
