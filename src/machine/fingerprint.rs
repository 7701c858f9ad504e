//! Machine fingerprinting and purpose-scoped key derivation.
//!
//! The fingerprint is a stand-in for hardware identity: a SHA-256 hash over a
//! fixed set of host attributes plus a server-side salt. It is a *derivation*,
//! not a stored entity - computed on demand, compared for equality, never
//! mutated. The same unchanged host always produces the same `machine_id`
//! within a process run.
//!
//! # Security
//!
//! The attributes are easily-spoofable OS-level values, not a TPM quote. This
//! binds ciphertext to "a machine that looks like this one", which is the
//! intended demo-grade guarantee.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sysinfo::{Networks, System};
use tracing::warn;

// =============================================================================
// Fingerprint
// =============================================================================

/// A deterministic, comparable identity for the current execution host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MachineFingerprint {
    /// Stable hash of host attributes + server salt
    pub machine_id: String,

    /// Hash folding username + hostname + machine_id
    pub user_context: String,

    /// When this fingerprint was computed (ms since epoch)
    pub timestamp: i64,

    /// False when host attributes could not be read and the low-security
    /// fallback path was used
    pub verified: bool,
}

/// Host attributes gathered once per process.
#[derive(Debug, Clone)]
struct HostAttributes {
    os: String,
    arch: String,
    hostname: String,
    cpu_count: usize,
    total_memory: u64,
    mac_hash: String,
    username: String,
    home_dir: String,
    timezone: String,
    locale: String,
}

impl HostAttributes {
    /// Gather host attributes. Returns None if any fallible source
    /// (hostname, timezone) cannot be read.
    fn gather() -> Option<Self> {
        let hostname = hostname::get().ok()?.to_string_lossy().into_owned();
        let timezone = iana_time_zone::get_timezone().ok()?;

        let mut system = System::new_all();
        system.refresh_memory();

        // Sorted so interface enumeration order does not change the hash.
        let networks = Networks::new_with_refreshed_list();
        let mut macs: Vec<String> = networks
            .iter()
            .map(|(_, data)| data.mac_address().to_string())
            .filter(|mac| mac != "00:00:00:00:00:00")
            .collect();
        macs.sort();
        macs.dedup();
        let mac_hash = sha256_hex(&macs.join(","));

        Some(Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            hostname,
            cpu_count: num_cpus::get(),
            total_memory: system.total_memory(),
            mac_hash,
            username: env_or_unknown(&["USER", "USERNAME"]),
            home_dir: env_or_unknown(&["HOME", "USERPROFILE"]),
            timezone,
            locale: env_or_unknown(&["LC_ALL", "LANG"]),
        })
    }
}

// =============================================================================
// Machine Identity
// =============================================================================

/// Derives machine fingerprints and purpose-scoped secret material.
///
/// Attribute gathering is memoized per process so fingerprint computation is
/// deterministic within a run and cheap on the hot path.
pub struct MachineIdentity {
    salt: String,
    attrs: OnceLock<Option<HostAttributes>>,
}

impl MachineIdentity {
    /// Create an identity derivation service with the given server-side salt.
    pub fn new(salt: String) -> Self {
        Self {
            salt,
            attrs: OnceLock::new(),
        }
    }

    fn attrs(&self) -> &Option<HostAttributes> {
        self.attrs.get_or_init(HostAttributes::gather)
    }

    /// Compute the fingerprint for the current host.
    ///
    /// Never fails: if host attributes cannot be read, degrades to a
    /// lower-security fallback derived from hostname + username + current
    /// time. The fallback is NOT stable across calls (`verified = false`).
    pub fn fingerprint(&self) -> MachineFingerprint {
        let now = chrono::Utc::now().timestamp_millis();

        match self.attrs() {
            Some(a) => {
                let joined = [
                    a.os.as_str(),
                    a.arch.as_str(),
                    a.hostname.as_str(),
                    &a.cpu_count.to_string(),
                    &a.total_memory.to_string(),
                    a.mac_hash.as_str(),
                    a.username.as_str(),
                    a.home_dir.as_str(),
                    a.timezone.as_str(),
                    a.locale.as_str(),
                ]
                .join("|");
                let machine_id = sha256_hex(&format!("{joined}|{}", self.salt));
                let user_context = sha256_hex(&format!(
                    "{}:{}:{}:{}",
                    a.username, a.hostname, machine_id, self.salt
                ));
                MachineFingerprint {
                    machine_id,
                    user_context,
                    timestamp: now,
                    verified: true,
                }
            }
            None => {
                warn!("Host attributes unavailable - using unstable fallback fingerprint");
                let hostname = hostname::get()
                    .map(|h| h.to_string_lossy().into_owned())
                    .unwrap_or_else(|_| "unknown-host".to_string());
                let username = env_or_unknown(&["USER", "USERNAME"]);
                let machine_id =
                    sha256_hex(&format!("{hostname}:{username}:{now}:{}", self.salt));
                let user_context =
                    sha256_hex(&format!("{username}:{hostname}:{machine_id}"));
                MachineFingerprint {
                    machine_id,
                    user_context,
                    timestamp: now,
                    verified: false,
                }
            }
        }
    }

    /// Derive a 256-bit hex key scoped to a user and purpose on this machine.
    ///
    /// Same inputs on the same machine always yield the same key; different
    /// machines yield different keys (modulo the fallback path).
    pub fn derived_key(&self, user_id: &str, purpose: &str) -> String {
        let fp = self.fingerprint();
        sha256_hex(&format!(
            "{}:{}:{user_id}:{purpose}:{}",
            fp.machine_id, fp.user_context, self.salt
        ))
    }

    /// True iff both `machine_id` and `user_context` are equal.
    pub fn matches(a: &MachineFingerprint, b: &MachineFingerprint) -> bool {
        a.machine_id == b.machine_id && a.user_context == b.user_context
    }
}

fn env_or_unknown(keys: &[&str]) -> String {
    keys.iter()
        .find_map(|k| std::env::var(k).ok())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> MachineIdentity {
        MachineIdentity::new("test-salt".to_string())
    }

    #[test]
    fn test_fingerprint_deterministic_within_process() {
        let id = identity();
        let a = id.fingerprint();
        let b = id.fingerprint();

        assert_eq!(a.machine_id, b.machine_id);
        assert_eq!(a.user_context, b.user_context);
        assert!(MachineIdentity::matches(&a, &b));
    }

    #[test]
    fn test_fingerprint_is_256_bit_hex() {
        let fp = identity().fingerprint();
        assert_eq!(fp.machine_id.len(), 64);
        assert!(fp.machine_id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_salt_changes_machine_id() {
        let a = MachineIdentity::new("salt-a".to_string()).fingerprint();
        let b = MachineIdentity::new("salt-b".to_string()).fingerprint();
        assert_ne!(a.machine_id, b.machine_id);
    }

    #[test]
    fn test_derived_key_deterministic() {
        let id = identity();
        let k1 = id.derived_key("alice", "encryption");
        let k2 = id.derived_key("alice", "encryption");
        assert_eq!(k1, k2);
        assert_eq!(k1.len(), 64);
    }

    #[test]
    fn test_derived_key_scoped_by_user_and_purpose() {
        let id = identity();
        let base = id.derived_key("alice", "encryption");
        assert_ne!(base, id.derived_key("bob", "encryption"));
        assert_ne!(base, id.derived_key("alice", "reviewer-encryption"));
    }

    #[test]
    fn test_matches_requires_both_fields() {
        let id = identity();
        let a = id.fingerprint();
        let mut b = a.clone();
        b.user_context = "different".to_string();
        assert!(!MachineIdentity::matches(&a, &b));
    }

    #[test]
    fn test_fingerprint_serializes_camel_case() {
        let fp = identity().fingerprint();
        let json = serde_json::to_value(&fp).unwrap();
        assert!(json.get("machineId").is_some());
        assert!(json.get("userContext").is_some());
    }
}
