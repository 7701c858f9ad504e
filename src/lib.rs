//! Stacks Vault - machine-bound rewards ledger core
//!
//! Encrypts reward transaction metadata to the machine it was created on and
//! serves it back through role-gated, audited reads. Point balances are never
//! encrypted; only transaction metadata is.
//!
//! ## Services
//!
//! - **Machine identity**: deterministic host fingerprinting and purpose-scoped
//!   key derivation
//! - **Cipher**: PBKDF2 + AES-256-CBC encryption bound to machine fingerprints
//! - **Audit**: expiring reviewer access policies with a bounded audit trail
//! - **Ledger**: idempotent in-memory rewards ledger with encrypted metadata
//! - **HTTP**: wallet and mint endpoints over hyper

pub mod audit;
pub mod auth;
pub mod cipher;
pub mod config;
pub mod ledger;
pub mod machine;
pub mod routes;
pub mod server;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{Result, VaultError};
