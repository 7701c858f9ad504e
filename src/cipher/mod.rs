//! Machine-bound payload encryption
//!
//! Encrypts JSON payloads such that decryption requires both knowledge of the
//! right identifiers (user id + the fixed reviewer id) and execution on an
//! authorized machine whose fingerprint matches the recorded binding.
//!
//! # Scheme
//!
//! - Key material: SHA-256 over machine-derived user/reviewer keys + the
//!   process master secret
//! - KDF: PBKDF2-HMAC-SHA256, 10,000 iterations over a random 32-byte salt
//! - Cipher: AES-256-CBC with a random 16-byte IV
//!
//! A weaker legacy scheme (no machine binding, keyed by a user-supplied
//! secret) is retained decrypt-only for records written before machine
//! binding existed.

pub mod block;
pub mod legacy;
pub mod service;

pub use block::{EncryptedBlockData, LegacyBlockData, MachineBinding, ALGORITHM, LEGACY_ALGORITHM};
pub use service::{CipherService, DecryptError};

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// AES-256-CBC encrypt with PKCS#7 padding.
pub(crate) fn aes256_cbc_encrypt(key: &[u8; 32], iv: &[u8; 16], plaintext: &[u8]) -> Vec<u8> {
    Aes256CbcEnc::new(key.into(), iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// AES-256-CBC decrypt. The error is deliberately opaque - padding or format
/// failures must not leak anything about the key material.
pub(crate) fn aes256_cbc_decrypt(
    key: &[u8; 32],
    iv: &[u8; 16],
    ciphertext: &[u8],
) -> Result<Vec<u8>, ()> {
    Aes256CbcDec::new(key.into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cbc_roundtrip() {
        let key = [7u8; 32];
        let iv = [3u8; 16];
        let ct = aes256_cbc_encrypt(&key, &iv, b"hello world");
        assert_eq!(aes256_cbc_decrypt(&key, &iv, &ct).unwrap(), b"hello world");
    }

    #[test]
    fn test_cbc_wrong_key_fails_or_garbles() {
        let key = [7u8; 32];
        let wrong = [8u8; 32];
        let iv = [3u8; 16];
        let ct = aes256_cbc_encrypt(&key, &iv, b"hello world");
        // Wrong key either fails padding or yields different bytes
        match aes256_cbc_decrypt(&wrong, &iv, &ct) {
            Ok(pt) => assert_ne!(pt, b"hello world"),
            Err(()) => {}
        }
    }
}
