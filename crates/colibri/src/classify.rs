//! Response classification for the host driver.
//!
//! A pure function of `(http_status, url, body, kind)`. The driver uses the
//! class to decide between accepting a response, retrying on another node,
//! or surfacing a final error.

use crate::types::request::RequestKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    Success,
    /// Malformed client input; propagate to the caller unchanged.
    ErrorUser,
    /// The upstream will never support this call.
    ErrorMethodNotSupported,
    /// Transient or node-local; retry with node exclusion.
    ErrorRetry,
}

/// JSON-RPC invalid-params messages that are really node quirks rather than
/// bad client input. These are retried on another node.
const NON_USER_32602_PATTERNS: &[&str] = &[
    "unsupported param",
    "cannot unmarshal",
    "hex string without 0x prefix",
    "invalid argument 2",
];

pub fn classify_response(
    http_status: u16,
    url: &str,
    body: &[u8],
    kind: RequestKind,
) -> ResponseClass {
    if http_status == 200 {
        if kind == RequestKind::ExecRpc {
            if let Some((code, message)) = json_rpc_error(body) {
                if code == -32602 {
                    let lower = message.to_lowercase();
                    if NON_USER_32602_PATTERNS.iter().any(|p| lower.contains(p)) {
                        return ResponseClass::ErrorRetry;
                    }
                    return ResponseClass::ErrorUser;
                }
                if code == -32601 || code == -32004 {
                    return ResponseClass::ErrorMethodNotSupported;
                }
            }
        }
        return ResponseClass::Success;
    }

    if http_status == 400 {
        if let Some((code, _)) = json_rpc_error(body) {
            if code == -32004 {
                return ResponseClass::ErrorMethodNotSupported;
            }
        }
        return match kind {
            RequestKind::ExecRpc => ResponseClass::ErrorUser,
            _ => ResponseClass::ErrorRetry,
        };
    }

    if http_status == 401 {
        return ResponseClass::ErrorRetry;
    }

    if http_status == 404 {
        // A beacon node that has not seen the header yet is lagging, not
        // failing.
        if kind == RequestKind::BeaconApi && url.contains("/headers/") {
            return ResponseClass::ErrorRetry;
        }
        if kind == RequestKind::ExecRpc {
            return ResponseClass::ErrorUser;
        }
        return ResponseClass::ErrorUser;
    }

    if http_status >= 500 {
        return ResponseClass::ErrorRetry;
    }

    ResponseClass::ErrorRetry
}

fn json_rpc_error(body: &[u8]) -> Option<(i64, String)> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    let error = value.get("error")?;
    let code = error.get("code")?.as_i64()?;
    let message = error
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or_default()
        .to_string();
    Some((code, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_lag_is_retry() {
        let class = classify_response(
            404,
            "/eth/v1/beacon/headers/0xabc",
            b"Header not found",
            RequestKind::BeaconApi,
        );
        assert_eq!(class, ResponseClass::ErrorRetry);
    }

    #[test]
    fn test_invalid_params_is_user_error() {
        let body = br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"invalid argument"}}"#;
        let class = classify_response(200, "", body, RequestKind::ExecRpc);
        assert_eq!(class, ResponseClass::ErrorUser);
    }

    #[test]
    fn test_known_node_quirk_is_retry() {
        let body = br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"unsupported param form"}}"#;
        let class = classify_response(200, "", body, RequestKind::ExecRpc);
        assert_eq!(class, ResponseClass::ErrorRetry);
    }

    #[test]
    fn test_method_not_supported_is_permanent() {
        let body = br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32004,"message":"method not supported"}}"#;
        let class = classify_response(400, "", body, RequestKind::ExecRpc);
        assert_eq!(class, ResponseClass::ErrorMethodNotSupported);
    }

    #[test]
    fn test_unauthorized_is_retry() {
        assert_eq!(
            classify_response(401, "", b"", RequestKind::ExecRpc),
            ResponseClass::ErrorRetry
        );
    }

    #[test]
    fn test_exec_404_is_user() {
        assert_eq!(
            classify_response(404, "/", b"", RequestKind::ExecRpc),
            ResponseClass::ErrorUser
        );
    }

    #[test]
    fn test_server_errors_are_retry() {
        for status in [500, 502, 503] {
            assert_eq!(
                classify_response(status, "", b"", RequestKind::BeaconApi),
                ResponseClass::ErrorRetry
            );
        }
    }

    #[test]
    fn test_plain_success() {
        let body = br#"{"jsonrpc":"2.0","id":1,"result":"0x1"}"#;
        assert_eq!(
            classify_response(200, "", body, RequestKind::ExecRpc),
            ResponseClass::Success
        );
    }
}
