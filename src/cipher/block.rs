//! Encrypted record wire shapes.
//!
//! These structs are the serialization contract for encrypted transaction
//! metadata: field names and encodings (hex ciphertext/IV/salt, base64 JSON
//! machine binding) must stay stable because stored records outlive releases.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

/// Algorithm tag for machine-bound records.
pub const ALGORITHM: &str = "SHA256-AES256";

/// Algorithm tag for pre-machine-binding records.
pub const LEGACY_ALGORITHM: &str = "AES256-CBC-LEGACY";

// =============================================================================
// Machine Binding
// =============================================================================

/// The association between a ciphertext and the fingerprints of the machines
/// permitted to decrypt it.
///
/// Both fields currently collapse to the same machine because the demo
/// topology runs user and reviewer on one host; a real deployment would
/// populate `reviewer_machine_id` from an out-of-band reviewer enrollment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MachineBinding {
    pub user_machine_id: String,
    pub reviewer_machine_id: String,
    pub timestamp: i64,
}

impl MachineBinding {
    /// Encode as base64(JSON) for embedding in records.
    pub fn encode(&self) -> String {
        // Serialization of this struct cannot fail
        let json = serde_json::to_vec(self).unwrap_or_default();
        BASE64.encode(json)
    }

    /// Decode from the stored base64(JSON) form.
    pub fn decode(encoded: &str) -> Result<Self, String> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| format!("Invalid machine binding encoding: {e}"))?;
        serde_json::from_slice(&bytes).map_err(|e| format!("Invalid machine binding JSON: {e}"))
    }

    /// True iff the given machine id may decrypt ciphertext carrying this
    /// binding.
    pub fn permits(&self, machine_id: &str) -> bool {
        self.user_machine_id == machine_id || self.reviewer_machine_id == machine_id
    }
}

// =============================================================================
// Encrypted Block
// =============================================================================

/// A machine-bound encrypted payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedBlockData {
    /// Hex-encoded AES-256-CBC ciphertext
    pub data: String,

    /// Hex-encoded 16-byte IV
    pub iv: String,

    /// Hex-encoded 32-byte KDF salt
    pub salt: String,

    /// base64(JSON) `MachineBinding`
    pub machine_binding: String,

    /// First 16 hex chars of sha256(user key) - diagnostic fingerprint of the
    /// key used, not reversible to the key
    pub user_key_hash: String,

    /// Always `SHA256-AES256` for this scheme
    pub algorithm: String,
}

/// A legacy encrypted payload (no machine binding, no per-record KDF salt).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LegacyBlockData {
    /// Hex-encoded AES-256-CBC ciphertext
    pub data: String,

    /// Hex-encoded 16-byte IV
    pub iv: String,

    /// Always `AES256-CBC-LEGACY`
    pub algorithm: String,
}

// =============================================================================
// Tests
// =============================================================================
