//! HTTP surface: light-client updates, period-store artifacts, manifest,
//! proofs, health and metrics.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::warn;

use colibri::types::{ExecStatus, RequestKind};
use colibri::{MethodSupport, Proofer};

use crate::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/eth/v1/beacon/light_client/updates", get(light_client_updates))
        .route("/period_store", get(manifest))
        .route("/period_store/{period}/{file}", get(period_file))
        .route("/proof", post(proof))
        .route("/rpc", post(rpc))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics(State(state): State<AppState>) -> Response {
    let mut body = String::new();
    if let Some(store) = &state.store {
        body.push_str(&store.stats().render());
    }
    if let Some(prover) = &state.prover {
        let stats = prover.stats();
        body.push_str(&format!(
            "# TYPE prover_last_run_status gauge\nprover_last_run_status {}\n",
            stats.last_run_status
        ));
        body.push_str(&format!(
            "# TYPE prover_total_success counter\nprover_total_success {}\n",
            stats.total_success
        ));
        body.push_str(&format!(
            "# TYPE prover_total_failure counter\nprover_total_failure {}\n",
            stats.total_failure
        ));
        body.push_str(&format!(
            "# TYPE prover_last_verified_period gauge\nprover_last_verified_period {}\n",
            prover.last_verified_period()
        ));
    }
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response()
}

#[derive(Deserialize)]
struct UpdatesQuery {
    start_period: Option<u64>,
    count: Option<u64>,
}

async fn light_client_updates(
    State(state): State<AppState>,
    Query(query): Query<UpdatesQuery>,
) -> Response {
    let Some(store) = &state.store else {
        return (StatusCode::SERVICE_UNAVAILABLE, "period store not configured").into_response();
    };
    let (Some(start), Some(count)) = (query.start_period, query.count) else {
        return (StatusCode::BAD_REQUEST, "start_period and count are required").into_response();
    };
    if count == 0 {
        return (StatusCode::BAD_REQUEST, "count must be positive").into_response();
    }
    match store.get_light_client_updates(start, count).await {
        Ok(bytes) => {
            ([(header::CONTENT_TYPE, "application/octet-stream")], bytes).into_response()
        }
        Err(e) => {
            warn!("light client update aggregation failed: {}", e);
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}

async fn manifest(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(store) = &state.store else {
        return (StatusCode::SERVICE_UNAVAILABLE, "period store not configured").into_response();
    };
    if params.get("manifest").map(String::as_str) != Some("1") {
        return (StatusCode::BAD_REQUEST, "manifest=1 is required").into_response();
    }
    let start = params.get("start").and_then(|s| s.parse().ok()).unwrap_or(0);
    match store.build_manifest(start).await {
        Ok(bytes) => {
            ([(header::CONTENT_TYPE, "application/octet-stream")], bytes).into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

#[derive(Deserialize)]
struct FileQuery {
    offset: Option<u64>,
}

async fn period_file(
    State(state): State<AppState>,
    Path((period, file)): Path<(String, String)>,
    Query(query): Query<FileQuery>,
) -> Response {
    let Some(store) = &state.store else {
        return (StatusCode::SERVICE_UNAVAILABLE, "period store not configured").into_response();
    };
    if period.contains("..") || file.contains("..") || file.contains('/') {
        return (StatusCode::FORBIDDEN, "path traversal").into_response();
    }
    let Ok(period) = period.parse::<u64>() else {
        return (StatusCode::NOT_FOUND, "no such period").into_response();
    };
    let path = store.file_path(period, &file);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(_) => return (StatusCode::NOT_FOUND, "no such artifact").into_response(),
    };
    let offset = query.offset.unwrap_or(0) as usize;
    if offset > bytes.len() {
        return (StatusCode::BAD_REQUEST, "offset beyond end of file").into_response();
    }
    let content_type = if file.ends_with(".json") {
        "application/json"
    } else {
        "application/octet-stream"
    };
    ([(header::CONTENT_TYPE, content_type)], bytes[offset..].to_vec()).into_response()
}

#[derive(Deserialize)]
struct ProofRequest {
    method: String,
    #[serde(default)]
    params: serde_json::Value,
    chain_id: Option<u64>,
    #[serde(default)]
    flags: u32,
}

async fn proof(State(state): State<AppState>, Json(req): Json<ProofRequest>) -> Response {
    let chain_id = req.chain_id.unwrap_or(state.chain_id);
    if colibri::method_support(chain_id, &req.method) == MethodSupport::NotSupported {
        return json_rpc_error(
            StatusCode::BAD_REQUEST,
            -32004,
            &format!("method {} is not supported", req.method),
        );
    }
    let params = if req.params.is_null() {
        "[]".to_string()
    } else {
        req.params.to_string()
    };
    match drive_proofer(&state, &req.method, &params, chain_id, req.flags).await {
        Ok(bytes) => {
            ([(header::CONTENT_TYPE, "application/octet-stream")], bytes).into_response()
        }
        Err(failure) => failure,
    }
}

#[derive(Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    id: serde_json::Value,
    method: String,
    #[serde(default)]
    params: serde_json::Value,
}

/// JSON-RPC front end: the result is the hex-encoded proof container.
async fn rpc(State(state): State<AppState>, Json(req): Json<RpcEnvelope>) -> Response {
    let params =
        if req.params.is_null() { "[]".to_string() } else { req.params.to_string() };
    match drive_proofer(&state, &req.method, &params, state.chain_id, 0).await {
        Ok(bytes) => Json(serde_json::json!({
            "jsonrpc": "2.0",
            "id": req.id,
            "result": format!("0x{}", hex::encode(bytes)),
        }))
        .into_response(),
        Err(failure) => failure,
    }
}

async fn drive_proofer(
    state: &AppState,
    method: &str,
    params: &str,
    chain_id: u64,
    flags: u32,
) -> Result<Vec<u8>, Response> {
    let mut proofer = Proofer::new(method, params, chain_id, flags)
        .map_err(|e| json_rpc_error(StatusCode::BAD_REQUEST, -32602, &e.to_string()))?;

    // Worker-flagged contexts do their CPU-heavy trie work off the async
    // threads.
    let worker = flags & colibri::proofer::FLAG_WORKER_THREAD != 0;

    // Bounded re-entry: every pass either completes requests or finishes.
    for _ in 0..256 {
        let status = if worker {
            tokio::task::block_in_place(|| proofer.execute())
        } else {
            proofer.execute()
        };
        match status {
            ExecStatus::Success => {
                return proofer.take_proof().ok_or_else(|| {
                    (StatusCode::INTERNAL_SERVER_ERROR, "no proof produced").into_response()
                });
            }
            ExecStatus::Error => {
                let message = proofer.state.error().unwrap_or("unknown error").to_string();
                return Err(map_proofer_error(&message));
            }
            ExecStatus::Pending => {
                serve_internal_requests(state, &mut proofer).await;
                state.pool.drive(&mut proofer.state).await;
            }
        }
    }
    Err((StatusCode::INTERNAL_SERVER_ERROR, "proofer did not converge").into_response())
}

/// Internal requests resolve against the period store.
async fn serve_internal_requests(state: &AppState, proofer: &mut Proofer) {
    let internal: Vec<([u8; 32], String)> = proofer
        .state
        .requests()
        .iter()
        .filter(|r| r.is_open() && r.kind == RequestKind::Internal)
        .map(|r| (r.id, r.url.clone()))
        .collect();
    if internal.is_empty() {
        return;
    }
    let Some(store) = &state.store else {
        for (id, _) in internal {
            proofer.state.set_error(&id, "period store not configured", 0);
        }
        return;
    };
    for (id, url) in internal {
        let result = match parse_lcu_query(&url) {
            Some((start, count)) => store.get_light_client_updates(start, count).await,
            None => Err(colibri::ColibriError::Store(format!(
                "unsupported internal request '{}'",
                url
            ))),
        };
        match result {
            Ok(bytes) => proofer.state.set_response(&id, bytes.into(), 0),
            Err(e) => proofer.state.set_error(&id, &e.to_string(), 0),
        }
    }
}

fn parse_lcu_query(url: &str) -> Option<(u64, u64)> {
    let query = url.strip_prefix("lcu?")?;
    let mut start = None;
    let mut count = 1u64;
    for pair in query.split('&') {
        match pair.split_once('=') {
            Some(("start_period", v)) => start = v.parse().ok(),
            Some(("count", v)) => count = v.parse().unwrap_or(1),
            _ => {}
        }
    }
    Some((start?, count))
}

/// Error-taxonomy mapping: user errors become 400 JSON-RPC errors,
/// permanent upstream refusals -32004, exhausted transient failures 503
/// with a retry hint.
fn map_proofer_error(message: &str) -> Response {
    if message.contains("method not supported") {
        return json_rpc_error(StatusCode::BAD_REQUEST, -32004, message);
    }
    if message.contains("user error")
        || message.contains("invalid params")
        || message.contains("Unsupported method")
    {
        return json_rpc_error(StatusCode::BAD_REQUEST, -32602, message);
    }
    (
        StatusCode::SERVICE_UNAVAILABLE,
        [(header::RETRY_AFTER, "12")],
        message.to_string(),
    )
        .into_response()
}

fn json_rpc_error(status: StatusCode, code: i64, message: &str) -> Response {
    (
        status,
        Json(serde_json::json!({
            "jsonrpc": "2.0",
            "id": serde_json::Value::Null,
            "error": { "code": code, "message": message },
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lcu_query() {
        assert_eq!(parse_lcu_query("lcu?start_period=7&count=2"), Some((7, 2)));
        assert_eq!(parse_lcu_query("lcu?start_period=7"), Some((7, 1)));
        assert_eq!(parse_lcu_query("bogus?start_period=7"), None);
        assert_eq!(parse_lcu_query("lcu?count=2"), None);
    }
}
