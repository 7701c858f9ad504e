//! Reviewer access control and audit trail
//!
//! Reviewer reads of user transaction metadata are gated by expiring,
//! machine-bound access policies and every attempt is recorded, successful or
//! not. The audit trail is a bounded in-memory ring; a persistent store would
//! replace it in a deployment that must survive restarts.

pub mod auditor;
pub mod policy;

pub use auditor::{AccessAuditor, AccessLogEntry, AccessOutcome, MAX_LOG_ENTRIES};
pub use policy::{AuthorizationDecision, ReviewerAccessPolicy, ReviewerAction};
