//! Machine identity and authorization
//!
//! Provides:
//! - Deterministic machine fingerprinting from host characteristics
//! - Purpose-scoped key derivation bound to the current machine
//! - The authorized-machine grant registry

pub mod fingerprint;
pub mod registry;

pub use fingerprint::{MachineFingerprint, MachineIdentity};
pub use registry::{AuthorizationRegistry, AuthorizedMachine, DEMO_USER_ID, SYSTEM_REVIEWER_ID};
