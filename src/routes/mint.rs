//! Mint endpoint.
//!
//! `POST /rewards/mint` with body `{points: number > 0, reason?, dedupeKey?}`.
//! Input validation happens before any ledger interaction; the mint itself
//! never fails once validation passes.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::server::AppState;
use crate::types::VaultError;

use super::{error_response, json_response, machine_status};

/// Handle `POST /rewards/mint`.
pub async fn handle_mint(state: Arc<AppState>, req: Request<Incoming>) -> Response<Full<Bytes>> {
    let ctx = match AuthContext::from_headers(req.headers(), &state.jwt, state.args.demo_mode) {
        Ok(ctx) => ctx,
        Err(VaultError::Auth(msg)) => {
            return error_response(StatusCode::UNAUTHORIZED, "Authentication required", Some(&msg));
        }
        Err(e) => {
            error!("Mint auth resolution failed: {e}");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                Some(&e.to_string()),
            );
        }
    };

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Failed to read request body",
                Some(&e.to_string()),
            );
        }
    };

    let body: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, "Invalid JSON body", Some(&e.to_string()));
        }
    };

    // Validated before touching the ledger
    let Some(points) = parse_points(&body) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "points must be a positive number",
            None,
        );
    };

    let reason = body
        .get("reason")
        .and_then(Value::as_str)
        .map(str::to_string);
    let dedupe_key = body
        .get("dedupeKey")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("mint_{}", Uuid::new_v4().simple()));

    // Metadata encryption inside mint_to runs the KDF
    let worker_state = Arc::clone(&state);
    let user_id = ctx.user_id.clone();
    let result = tokio::task::spawn_blocking(move || {
        worker_state
            .ledger
            .mint_to(&user_id, points, &dedupe_key, reason.as_deref())
    })
    .await;

    let tx_ref = match result {
        Ok(tx) => tx,
        Err(e) => {
            error!("Mint worker task failed: {e}");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                Some(&e.to_string()),
            );
        }
    };

    info!(
        user_id = %ctx.user_id,
        points,
        tx = %tx_ref.id_or_hash,
        "Minted reward points"
    );

    let machine_binding = tx_ref.machine_binding.clone();
    let encrypted = tx_ref.encrypted;
    json_response(&json!({
        "success": true,
        "txRef": serde_json::to_value(&tx_ref).unwrap_or(Value::Null),
        "encrypted": encrypted,
        "machineBinding": machine_binding,
        "message": format!("{points} points minted"),
        "machineStatus": machine_status(&state, &ctx.user_id),
    }))
}

/// Extract `points` from the request body: present, numeric, integral and
/// strictly positive.
fn parse_points(body: &Value) -> Option<u64> {
    body.get("points").and_then(Value::as_u64).filter(|p| *p > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_points_accepts_positive_integers() {
        assert_eq!(parse_points(&json!({"points": 50})), Some(50));
        assert_eq!(parse_points(&json!({"points": 1, "reason": "r"})), Some(1));
    }

    #[test]
    fn test_parse_points_rejects_invalid_values() {
        assert_eq!(parse_points(&json!({})), None);
        assert_eq!(parse_points(&json!({"points": 0})), None);
        assert_eq!(parse_points(&json!({"points": -5})), None);
        assert_eq!(parse_points(&json!({"points": 2.5})), None);
        assert_eq!(parse_points(&json!({"points": "50"})), None);
        assert_eq!(parse_points(&json!({"points": null})), None);
    }
}
