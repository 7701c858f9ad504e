//! HTTP routes for the vault

pub mod health;
pub mod mint;
pub mod wallet;

pub use health::{health_check, version_info};
pub use mint::handle_mint;
pub use wallet::handle_wallet;

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::auth::Role;
use crate::machine::SYSTEM_REVIEWER_ID;
use crate::server::AppState;

/// Build a JSON error response `{error, details?}`.
pub fn error_response(
    status: StatusCode,
    message: &str,
    details: Option<&str>,
) -> Response<Full<Bytes>> {
    let mut error = json!({ "error": message });
    if let Some(details) = details {
        error["details"] = json!(details);
    }
    let body = serde_json::to_vec(&error).unwrap_or_default();

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| {
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Full::new(Bytes::from(r#"{"error":"Internal error"}"#)))
                .unwrap()
        })
}

/// Build a successful JSON response.
pub fn json_response(value: &Value) -> Response<Full<Bytes>> {
    let body = serde_json::to_vec(value).unwrap_or_default();

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .header("Cache-Control", "no-cache")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| {
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Full::new(Bytes::from(r#"{"error":"Internal error"}"#)))
                .unwrap()
        })
}

/// Machine authorization status included in wallet and mint responses.
///
/// Merges the current fingerprint, the caller's grant status and the ledger's
/// aggregate binding diagnostic into one flat object.
pub fn machine_status(state: &Arc<AppState>, user_id: &str) -> Value {
    let fp = state.identity.fingerprint();
    let info = state.ledger.machine_binding_info();

    json!({
        "machineId": fp.machine_id,
        "verified": fp.verified,
        "userAuthorized": state.registry.is_authorized(user_id, Role::User),
        "reviewerAuthorized": state.registry.is_authorized(SYSTEM_REVIEWER_ID, Role::Reviewer),
        "currentMachine": info.current_machine,
        "authorizedMachines": info.authorized_machines,
        "encryptedRecords": info.encrypted_records,
        "decryptableRecords": info.decryptable_records,
    })
}
