//! Legacy encryption scheme (pre machine-binding).
//!
//! Records written before machine binding were keyed from a user-supplied
//! secret and the reviewer master key, with no per-record KDF salt. Kept so
//! old data stays readable; new records always use the machine-bound scheme.
//!
//! Key schedule: `sha256(sha256("{user_id}:{user_secret}") + reviewer_master_key)`
//! then AES-256-CBC with a random IV.

use rand::rngs::OsRng;
use rand::RngCore;
use serde_json::Value;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::types::{Result, VaultError};

use super::block::{LegacyBlockData, LEGACY_ALGORITHM};
use super::service::DecryptError;
use super::{aes256_cbc_decrypt, aes256_cbc_encrypt};

fn derive_key(user_id: &str, user_secret: &str, reviewer_master_key: &str) -> Zeroizing<[u8; 32]> {
    let user_hash = hex::encode(Sha256::digest(
        format!("{user_id}:{user_secret}").as_bytes(),
    ));
    let mut combined = Sha256::new();
    combined.update(user_hash.as_bytes());
    combined.update(reviewer_master_key.as_bytes());
    Zeroizing::new(combined.finalize().into())
}

pub fn encrypt(
    payload: &Value,
    user_id: &str,
    user_secret: &str,
    reviewer_master_key: &str,
) -> Result<LegacyBlockData> {
    let key = derive_key(user_id, user_secret, reviewer_master_key);

    let mut iv = [0u8; 16];
    OsRng.fill_bytes(&mut iv);

    let plaintext = serde_json::to_vec(payload)
        .map_err(|e| VaultError::Internal(format!("Payload serialization failed: {e}")))?;
    let ciphertext = aes256_cbc_encrypt(&key, &iv, &plaintext);

    Ok(LegacyBlockData {
        data: hex::encode(ciphertext),
        iv: hex::encode(iv),
        algorithm: LEGACY_ALGORITHM.to_string(),
    })
}

pub fn decrypt(
    block: &LegacyBlockData,
    user_id: &str,
    user_secret: &str,
    reviewer_master_key: &str,
) -> std::result::Result<Value, DecryptError> {
    let key = derive_key(user_id, user_secret, reviewer_master_key);

    let iv: [u8; 16] = hex::decode(&block.iv)
        .ok()
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| DecryptError::Failed("Invalid IV".to_string()))?;
    let ciphertext = hex::decode(&block.data)
        .map_err(|_| DecryptError::Failed("Invalid ciphertext encoding".to_string()))?;

    let plaintext = aes256_cbc_decrypt(&key, &iv, &ciphertext)
        .map_err(|_| DecryptError::Failed("Unable to decrypt record".to_string()))?;

    serde_json::from_slice(&plaintext)
        .map_err(|_| DecryptError::Failed("Decrypted payload is not valid JSON".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_legacy_roundtrip() {
        let payload = json!({"reason": "pre-migration record", "points": 10});
        let block = encrypt(&payload, "alice", "passphrase", "master").unwrap();
        assert_eq!(block.algorithm, LEGACY_ALGORITHM);

        let decrypted = decrypt(&block, "alice", "passphrase", "master").unwrap();
        assert_eq!(decrypted, payload);
    }

    #[test]
    fn test_legacy_wrong_secret_fails() {
        let block = encrypt(&json!({"a": 1}), "alice", "right", "master").unwrap();
        assert!(decrypt(&block, "alice", "wrong", "master").is_err());
        assert!(decrypt(&block, "bob", "right", "master").is_err());
        assert!(decrypt(&block, "alice", "right", "other-master").is_err());
    }
}
