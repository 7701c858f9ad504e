//! Machine-bound encryption service.
//!
//! Encryption binds ciphertext to the current machine's fingerprint;
//! decryption re-derives the same key material, which only works on a machine
//! whose fingerprint matches the recorded binding, with the same user id and
//! the fixed reviewer id used at encryption time.
//!
//! Decrypt failure is an expected, frequent outcome (wrong machine, missing
//! grant), so `decrypt` returns `Result<_, DecryptError>` rather than
//! treating it as exceptional.

use rand::rngs::OsRng;
use rand::RngCore;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use zeroize::Zeroizing;

use crate::auth::Role;
use crate::machine::{AuthorizationRegistry, MachineIdentity, SYSTEM_REVIEWER_ID};
use crate::types::{Result, VaultError};

use super::block::{EncryptedBlockData, LegacyBlockData, MachineBinding, ALGORITHM};
use super::legacy;
use super::{aes256_cbc_decrypt, aes256_cbc_encrypt};

/// PBKDF2 iteration count - deliberately slow as a brute-force cost factor.
pub const PBKDF2_ITERATIONS: u32 = 10_000;

/// IV length for AES-256-CBC (16 bytes).
pub const IV_LEN: usize = 16;

/// KDF salt length (32 bytes).
pub const SALT_LEN: usize = 32;

/// Key-derivation purpose for user keys.
const PURPOSE_ENCRYPTION: &str = "encryption";

/// Key-derivation purpose for reviewer keys.
const PURPOSE_REVIEWER: &str = "reviewer-encryption";

// =============================================================================
// Errors
// =============================================================================

/// Why a decrypt was declined. Messages are audit-grade but never leak key
/// material.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecryptError {
    /// Current machine lacks a grant for (user, role)
    #[error("Machine not authorized for {user_id} as {role}")]
    MachineNotAuthorized { user_id: String, role: Role },

    /// Ciphertext's recorded binding does not match the current machine
    #[error("Ciphertext bound to a different machine")]
    MachineMismatch,

    /// Cipher or format error (wrong key material, corrupted bytes)
    #[error("Decryption failed: {0}")]
    Failed(String),
}

// =============================================================================
// Cipher Service
// =============================================================================

/// Encrypts/decrypts JSON payloads with machine- and role-bound keys.
pub struct CipherService {
    identity: Arc<MachineIdentity>,
    registry: Arc<AuthorizationRegistry>,
    master_secret: String,
    reviewer_master_key: String,
}

impl CipherService {
    pub fn new(
        identity: Arc<MachineIdentity>,
        registry: Arc<AuthorizationRegistry>,
        master_secret: String,
        reviewer_master_key: String,
    ) -> Self {
        Self {
            identity,
            registry,
            master_secret,
            reviewer_master_key,
        }
    }

    /// Encrypt a JSON payload for `user_id`, readable by that user and the
    /// system reviewer on machines matching the recorded binding.
    ///
    /// `reviewer_id` defaults to the fixed system reviewer; decryption always
    /// re-derives with the system reviewer id, so passing a custom reviewer
    /// produces blocks only that pairing can open.
    pub fn encrypt(
        &self,
        payload: &Value,
        user_id: &str,
        reviewer_id: Option<&str>,
    ) -> Result<EncryptedBlockData> {
        let reviewer_id = reviewer_id.unwrap_or(SYSTEM_REVIEWER_ID);

        let user_key = self.identity.derived_key(user_id, PURPOSE_ENCRYPTION);
        let reviewer_key = self.identity.derived_key(reviewer_id, PURPOSE_REVIEWER);
        let combined = self.combined_key(&user_key, &reviewer_key);

        let mut iv = [0u8; IV_LEN];
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut iv);
        OsRng.fill_bytes(&mut salt);

        let key = derive_cipher_key(&combined, &salt);

        let plaintext = serde_json::to_vec(payload)
            .map_err(|e| VaultError::Internal(format!("Payload serialization failed: {e}")))?;
        let ciphertext = aes256_cbc_encrypt(&key, &iv, &plaintext);

        let fp = self.identity.fingerprint();
        // Both sides of the binding are the current machine: the demo
        // topology never runs the reviewer on a separate host. A real
        // deployment would obtain the reviewer fingerprint out of band.
        let binding = MachineBinding {
            user_machine_id: fp.machine_id.clone(),
            reviewer_machine_id: fp.machine_id,
            timestamp: chrono::Utc::now().timestamp_millis(),
        };

        let user_key_hash = hex::encode(Sha256::digest(user_key.as_bytes()))[..16].to_string();

        Ok(EncryptedBlockData {
            data: hex::encode(ciphertext),
            iv: hex::encode(iv),
            salt: hex::encode(salt),
            machine_binding: binding.encode(),
            user_key_hash,
            algorithm: ALGORITHM.to_string(),
        })
    }

    /// Decrypt a machine-bound block on behalf of `(user_id, role)`.
    ///
    /// Checks run in a fixed order before any cryptographic work:
    /// 1. authorization registry grant for the caller
    /// 2. machine binding match against the current fingerprint
    ///
    /// `user_id` is always the data owner (it feeds key derivation); `role`
    /// is the caller's role. Reviewer callers are checked against the fixed
    /// system reviewer grant.
    pub fn decrypt(
        &self,
        block: &EncryptedBlockData,
        user_id: &str,
        role: Role,
    ) -> std::result::Result<Value, DecryptError> {
        let grant_subject = match role {
            Role::User => user_id,
            Role::Reviewer => SYSTEM_REVIEWER_ID,
        };
        if !self.registry.is_authorized(grant_subject, role) {
            return Err(DecryptError::MachineNotAuthorized {
                user_id: grant_subject.to_string(),
                role,
            });
        }

        let binding = MachineBinding::decode(&block.machine_binding)
            .map_err(|_| DecryptError::MachineMismatch)?;
        let fp = self.identity.fingerprint();
        if !binding.permits(&fp.machine_id) {
            debug!(
                machine_id = %fp.machine_id,
                "Machine binding mismatch - refusing decrypt"
            );
            return Err(DecryptError::MachineMismatch);
        }

        let user_key = self.identity.derived_key(user_id, PURPOSE_ENCRYPTION);
        let reviewer_key = self
            .identity
            .derived_key(SYSTEM_REVIEWER_ID, PURPOSE_REVIEWER);
        let combined = self.combined_key(&user_key, &reviewer_key);

        let iv: [u8; IV_LEN] = decode_fixed(&block.iv)
            .ok_or_else(|| DecryptError::Failed("Invalid IV".to_string()))?;
        let salt: [u8; SALT_LEN] = decode_fixed(&block.salt)
            .ok_or_else(|| DecryptError::Failed("Invalid salt".to_string()))?;
        let ciphertext = hex::decode(&block.data)
            .map_err(|_| DecryptError::Failed("Invalid ciphertext encoding".to_string()))?;

        let key = derive_cipher_key(&combined, &salt);
        let plaintext = aes256_cbc_decrypt(&key, &iv, &ciphertext)
            .map_err(|_| DecryptError::Failed("Unable to decrypt record".to_string()))?;

        serde_json::from_slice(&plaintext)
            .map_err(|_| DecryptError::Failed("Decrypted payload is not valid JSON".to_string()))
    }

    /// Decrypt a legacy (pre machine-binding) record using a caller-supplied
    /// secret. Retained only to keep old data readable.
    pub fn decrypt_legacy(
        &self,
        block: &LegacyBlockData,
        user_id: &str,
        user_secret: &str,
    ) -> std::result::Result<Value, DecryptError> {
        legacy::decrypt(block, user_id, user_secret, &self.reviewer_master_key)
    }

    /// Encrypt with the legacy scheme. New records must not use this; it
    /// exists so tests and migration tooling can fabricate old-format data.
    pub fn encrypt_legacy(
        &self,
        payload: &Value,
        user_id: &str,
        user_secret: &str,
    ) -> Result<LegacyBlockData> {
        legacy::encrypt(payload, user_id, user_secret, &self.reviewer_master_key)
    }

    fn combined_key(&self, user_key: &str, reviewer_key: &str) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(Sha256::digest(
            format!("{user_key}:{reviewer_key}:{}", self.master_secret).as_bytes(),
        )))
    }
}

/// PBKDF2-HMAC-SHA256 over the combined key and per-record salt.
fn derive_cipher_key(combined: &str, salt: &[u8]) -> Zeroizing<[u8; 32]> {
    let mut key = Zeroizing::new([0u8; 32]);
    pbkdf2::pbkdf2_hmac::<Sha256>(combined.as_bytes(), salt, PBKDF2_ITERATIONS, &mut *key);
    key
}

fn decode_fixed<const N: usize>(hex_str: &str) -> Option<[u8; N]> {
    let bytes = hex::decode(hex_str).ok()?;
    bytes.try_into().ok()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::{AuthorizedMachine, DEMO_USER_ID};
    use serde_json::json;

    fn service_with_grants(grants: Option<Vec<AuthorizedMachine>>) -> CipherService {
        let identity = Arc::new(MachineIdentity::new("cipher-test-salt".to_string()));
        let registry = Arc::new(AuthorizationRegistry::new(Arc::clone(&identity), grants));
        CipherService::new(
            identity,
            registry,
            "test-master-secret".to_string(),
            "test-reviewer-key".to_string(),
        )
    }

    fn demo_service() -> CipherService {
        service_with_grants(None)
    }

    fn grant(identity: &MachineIdentity, user_id: &str, role: Role) -> AuthorizedMachine {
        AuthorizedMachine {
            machine_id: identity.fingerprint().machine_id,
            user_id: user_id.to_string(),
            role,
            authorized: true,
            label: "test".to_string(),
        }
    }

    #[test]
    fn test_roundtrip_for_authorized_user() {
        let service = demo_service();
        let payload = json!({"reason": "Goal completed", "points": 50});

        let block = service.encrypt(&payload, DEMO_USER_ID, None).unwrap();
        assert_eq!(block.algorithm, ALGORITHM);
        assert_eq!(block.iv.len(), IV_LEN * 2);
        assert_eq!(block.salt.len(), SALT_LEN * 2);
        assert_eq!(block.user_key_hash.len(), 16);

        let decrypted = service.decrypt(&block, DEMO_USER_ID, Role::User).unwrap();
        assert_eq!(decrypted, payload);
    }

    #[test]
    fn test_reviewer_can_decrypt_user_record() {
        let service = demo_service();
        let payload = json!({"reason": "test"});
        let block = service.encrypt(&payload, DEMO_USER_ID, None).unwrap();

        // Reviewer role resolves the grant via the fixed system reviewer id
        let decrypted = service
            .decrypt(&block, DEMO_USER_ID, Role::Reviewer)
            .unwrap();
        assert_eq!(decrypted, payload);
    }

    #[test]
    fn test_unauthorized_user_rejected_before_crypto() {
        // bob has no grant on this machine
        let service = demo_service();
        let block = service.encrypt(&json!({"reason": "test"}), "bob", None).unwrap();

        let err = service.decrypt(&block, "bob", Role::User).unwrap_err();
        assert!(matches!(err, DecryptError::MachineNotAuthorized { .. }));
    }

    #[test]
    fn test_foreign_machine_binding_rejected() {
        let identity = Arc::new(MachineIdentity::new("cipher-test-salt".to_string()));
        let grants = vec![grant(&identity, "alice", Role::User)];
        let service = service_with_grants(Some(grants));

        let mut block = service.encrypt(&json!({"a": 1}), "alice", None).unwrap();
        block.machine_binding = MachineBinding {
            user_machine_id: "some-other-machine".to_string(),
            reviewer_machine_id: "another-machine".to_string(),
            timestamp: 0,
        }
        .encode();

        let err = service.decrypt(&block, "alice", Role::User).unwrap_err();
        assert_eq!(err, DecryptError::MachineMismatch);
    }

    #[test]
    fn test_corrupted_ciphertext_fails_generically() {
        let service = demo_service();
        let mut block = service
            .encrypt(&json!({"a": 1}), DEMO_USER_ID, None)
            .unwrap();
        block.data = hex::encode([0u8; 32]);

        let err = service.decrypt(&block, DEMO_USER_ID, Role::User).unwrap_err();
        match err {
            DecryptError::Failed(msg) => {
                // Generic message, no key material
                assert!(!msg.contains("key"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn test_wrong_user_id_cannot_decrypt() {
        let identity = Arc::new(MachineIdentity::new("cipher-test-salt".to_string()));
        let machine_id = identity.fingerprint().machine_id;
        let grants = vec![
            grant(&identity, "alice", Role::User),
            AuthorizedMachine {
                machine_id,
                user_id: "mallory".to_string(),
                role: Role::User,
                authorized: true,
                label: "test".to_string(),
            },
        ];
        let service = service_with_grants(Some(grants));

        let block = service.encrypt(&json!({"a": 1}), "alice", None).unwrap();
        // mallory is authorized on this machine but derives a different key
        let err = service.decrypt(&block, "mallory", Role::User).unwrap_err();
        assert!(matches!(err, DecryptError::Failed(_)));
    }

    #[test]
    fn test_legacy_roundtrip() {
        let service = demo_service();
        let payload = json!({"reason": "old record"});

        let block = service
            .encrypt_legacy(&payload, "alice", "secret-phrase")
            .unwrap();
        assert_eq!(block.algorithm, super::super::LEGACY_ALGORITHM);

        let decrypted = service
            .decrypt_legacy(&block, "alice", "secret-phrase")
            .unwrap();
        assert_eq!(decrypted, payload);

        assert!(service
            .decrypt_legacy(&block, "alice", "wrong-phrase")
            .is_err());
    }
}
