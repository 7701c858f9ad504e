//! Wallet endpoint.
//!
//! `GET /wallet` returns the caller's balance, their 10 most recent
//! transactions with role-gated metadata, and the machine authorization
//! status. Balances are always returned; decryption outcome only affects the
//! metadata and the `encryptionStatus` flag.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::error;

use crate::auth::{AuthContext, Role};
use crate::ledger::HistoryEntry;
use crate::server::AppState;
use crate::types::VaultError;

use super::{error_response, json_response, machine_status};

/// Maximum history entries returned by the wallet view.
const HISTORY_LIMIT: usize = 10;

/// Handle `GET /wallet`.
pub async fn handle_wallet(state: Arc<AppState>, req: Request<Incoming>) -> Response<Full<Bytes>> {
    let ctx = match AuthContext::from_headers(req.headers(), &state.jwt, state.args.demo_mode) {
        Ok(ctx) => ctx,
        Err(VaultError::Auth(msg)) => {
            return error_response(StatusCode::UNAUTHORIZED, "Authentication required", Some(&msg));
        }
        Err(e) => {
            error!("Wallet auth resolution failed: {e}");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                Some(&e.to_string()),
            );
        }
    };

    // History decryption runs the KDF per record; keep it off the request
    // thread and cap it before any decryption work.
    let worker_state = Arc::clone(&state);
    let worker_ctx = ctx.clone();
    let result = tokio::task::spawn_blocking(move || {
        let reviewer_mode = worker_ctx.role == Role::Reviewer;
        let balance = worker_state.ledger.balance_of(&worker_ctx.user_id);
        let history = worker_state.ledger.history(
            &worker_ctx.user_id,
            worker_ctx.user_secret.as_deref(),
            reviewer_mode,
            Some(HISTORY_LIMIT),
        );
        (balance, history)
    })
    .await;

    let (balance, history) = match result {
        Ok(v) => v,
        Err(e) => {
            error!("Wallet worker task failed: {e}");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                Some(&e.to_string()),
            );
        }
    };

    json_response(&wallet_response(
        balance,
        history,
        ctx.role,
        machine_status(&state, &ctx.user_id),
    ))
}

/// Assemble the wallet response envelope.
fn wallet_response(
    balance: u64,
    history: Vec<HistoryEntry>,
    role: Role,
    machine_status: Value,
) -> Value {
    let encryption_status = encryption_status(&history);
    let history: Vec<Value> = history
        .into_iter()
        .take(HISTORY_LIMIT)
        .map(|entry| serde_json::to_value(entry).unwrap_or(Value::Null))
        .collect();

    json!({
        "tokenBalance": balance,
        "history": history,
        "encryptionStatus": encryption_status,
        "userRole": role.to_string(),
        "machineStatus": machine_status,
    })
}

/// `"decrypted"` when every history entry carries plaintext metadata,
/// `"limited"` as soon as any entry is still encrypted, whether a redacted
/// preview or an error placeholder.
fn encryption_status(history: &[HistoryEntry]) -> &'static str {
    let any_opaque = history.iter().any(|entry| {
        entry
            .metadata
            .get("encrypted")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    });
    if any_opaque {
        "limited"
    } else {
        "decrypted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{LedgerNetwork, TxRef};

    fn entry(metadata: Value) -> HistoryEntry {
        HistoryEntry {
            points: 10,
            tx_ref: TxRef {
                network: LedgerNetwork::Mock,
                id_or_hash: "mock_tx_1".to_string(),
                timestamp: 0,
                encrypted: true,
                machine_binding: None,
                encrypted_data: None,
            },
            metadata,
        }
    }

    #[test]
    fn test_encryption_status_decrypted() {
        let history = vec![entry(json!({"reason": "ok"}))];
        assert_eq!(encryption_status(&history), "decrypted");
        assert_eq!(encryption_status(&[]), "decrypted");
    }

    #[test]
    fn test_encryption_status_limited_on_any_error() {
        let history = vec![
            entry(json!({"reason": "ok"})),
            entry(json!({"encrypted": true, "error": "Machine not authorized"})),
        ];
        assert_eq!(encryption_status(&history), "limited");
    }

    #[test]
    fn test_encryption_status_limited_on_redacted_preview() {
        // A legacy record without a supplied secret stays a redacted preview
        // with no error field, but it is still not readable.
        let history = vec![entry(json!({
            "encrypted": true,
            "preview": "Goal completion reward",
            "algorithm": "AES256-CBC-LEGACY",
            "machineBinding": "AA==",
        }))];
        assert_eq!(encryption_status(&history), "limited");
    }

    #[test]
    fn test_wallet_response_shape() {
        let history = vec![entry(json!({"reason": "ok"}))];
        let response = wallet_response(75, history, Role::User, json!({"machineId": "m1"}));

        assert_eq!(response["tokenBalance"], 75);
        assert_eq!(response["encryptionStatus"], "decrypted");
        assert_eq!(response["userRole"], "user");
        assert_eq!(response["machineStatus"]["machineId"], "m1");
        let entries = response["history"].as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["points"], 10);
        assert_eq!(entries[0]["txRef"]["idOrHash"], "mock_tx_1");
        assert_eq!(entries[0]["metadata"]["reason"], "ok");
    }

    #[test]
    fn test_wallet_response_caps_history_at_ten() {
        let history: Vec<HistoryEntry> = (0..15)
            .map(|i| entry(json!({"reason": format!("r{i}")})))
            .collect();
        let response = wallet_response(0, history, Role::Reviewer, json!({}));

        assert_eq!(response["history"].as_array().unwrap().len(), 10);
        assert_eq!(response["userRole"], "reviewer");
    }
}
