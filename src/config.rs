//! Configuration for stacks-vault
//!
//! CLI arguments and environment variable handling using clap.
//!
//! Every secret has an insecure demo fallback, but the fallbacks are only
//! reachable when `--demo-mode` is set. In production mode `validate()` fails
//! fast on missing secrets or malformed machine authorization config, so the
//! two modes cannot be confused at runtime.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

use crate::ledger::LedgerBackend;
use crate::machine::AuthorizedMachine;

/// Demo fallback for the process-wide encryption master secret.
pub const DEMO_MASTER_SECRET: &str = "stacks-demo-master-secret-insecure";

/// Demo fallback for the reviewer master key (legacy record decryption).
pub const DEMO_REVIEWER_MASTER_KEY: &str = "stacks-demo-reviewer-key-insecure";

/// Demo fallback for the fingerprint salt.
pub const DEMO_FINGERPRINT_SALT: &str = "stacks-demo-fingerprint-salt";

/// Stacks Vault - machine-bound encryption and rewards ledger gateway
#[derive(Parser, Debug, Clone)]
#[command(name = "stacks-vault")]
#[command(about = "Machine-bound rewards ledger gateway for Stacks")]
pub struct Args {
    /// Unique node identifier for this gateway instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Enable demo mode (insecure secret fallbacks, demo identity headers)
    #[arg(long, env = "DEMO_MODE", default_value = "false")]
    pub demo_mode: bool,

    /// Process-wide master secret mixed into every combined encryption key
    /// and used to sign bearer tokens (required in production mode)
    #[arg(long, env = "ENCRYPTION_MASTER_SECRET")]
    pub encryption_master_secret: Option<String>,

    /// Master key for the legacy (pre machine-binding) record scheme
    #[arg(long, env = "REVIEWER_MASTER_KEY")]
    pub reviewer_master_key: Option<String>,

    /// Server-side salt folded into machine fingerprints and derived keys
    #[arg(long, env = "MACHINE_FINGERPRINT_SALT")]
    pub machine_fingerprint_salt: Option<String>,

    /// JSON array of authorized machine grants
    /// (machineId/userId/role/authorized/label per entry)
    #[arg(long, env = "AUTHORIZED_MACHINES")]
    pub authorized_machines: Option<String>,

    /// Ledger backend selection (mock | localchain | testnet)
    #[arg(long, env = "USE_LEDGER", default_value = "mock")]
    pub use_ledger: String,

    /// Bearer token validity in seconds
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "86400")]
    pub jwt_expiry_seconds: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Effective master secret.
    ///
    /// `validate()` guarantees the configured value is present outside demo
    /// mode, so the fallback here is only reachable in demo mode.
    pub fn master_secret(&self) -> String {
        self.encryption_master_secret
            .clone()
            .unwrap_or_else(|| DEMO_MASTER_SECRET.to_string())
    }

    /// Effective reviewer master key (legacy scheme).
    pub fn reviewer_master_key(&self) -> String {
        self.reviewer_master_key
            .clone()
            .unwrap_or_else(|| DEMO_REVIEWER_MASTER_KEY.to_string())
    }

    /// Effective fingerprint salt.
    pub fn fingerprint_salt(&self) -> String {
        self.machine_fingerprint_salt
            .clone()
            .unwrap_or_else(|| DEMO_FINGERPRINT_SALT.to_string())
    }

    /// Parse the configured ledger backend.
    pub fn ledger_backend(&self) -> Result<LedgerBackend, String> {
        self.use_ledger.parse()
    }

    /// Parse the configured machine grants, if any.
    ///
    /// Returns `Ok(None)` when unset. Malformed JSON is an error; the caller
    /// decides whether to degrade (demo mode) or abort (production).
    pub fn parse_authorized_machines(&self) -> Result<Option<Vec<AuthorizedMachine>>, String> {
        match self.authorized_machines.as_deref() {
            None => Ok(None),
            Some(raw) => serde_json::from_str(raw)
                .map(Some)
                .map_err(|e| format!("AUTHORIZED_MACHINES is not valid JSON: {e}")),
        }
    }

    /// Validate configuration.
    ///
    /// Production mode rejects missing secrets and malformed machine grants
    /// instead of silently widening the authorized set.
    pub fn validate(&self) -> Result<(), String> {
        if !self.demo_mode {
            if self.encryption_master_secret.is_none() {
                return Err("ENCRYPTION_MASTER_SECRET is required in production mode".to_string());
            }
            if self.reviewer_master_key.is_none() {
                return Err("REVIEWER_MASTER_KEY is required in production mode".to_string());
            }
            if self.machine_fingerprint_salt.is_none() {
                return Err("MACHINE_FINGERPRINT_SALT is required in production mode".to_string());
            }
            if self.authorized_machines.is_none() {
                return Err("AUTHORIZED_MACHINES is required in production mode".to_string());
            }
            self.parse_authorized_machines()?;
        } else if let Err(e) = self.parse_authorized_machines() {
            // Demo mode degrades to the default grant set, but still surfaces
            // the parse failure at startup rather than at first request.
            tracing::warn!("{e} - falling back to demo machine grants");
        }

        self.ledger_backend()?;

        if self.jwt_expiry_seconds == 0 {
            return Err("JWT_EXPIRY_SECONDS must be greater than zero".to_string());
        }

        Ok(())
    }
}
