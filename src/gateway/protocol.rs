// Keybridge — JSON-RPC 2.0 Protocol Types
//
// Newline-delimited JSON-RPC 2.0 spoken between the background's socket
// transport and the foreground gateway. Both sides share these types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::keyring::KeyringError;

/// Run a bridged keyring call. Params: a `BridgeRequest`.
pub const METHOD_INVOKE: &str = "keyring_invoke";
/// List the keyring types the foreground hosts. No params.
pub const METHOD_LIST: &str = "keyring_list";

/// A JSON-RPC 2.0 request.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    pub id: Value,
}

/// A JSON-RPC 2.0 success/error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Value,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// Standard JSON-RPC 2.0 error codes
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// The keyring itself failed; `data` carries the serialized `KeyringError`.
pub const KEYRING_ERROR: i32 = -32010;

impl JsonRpcRequest {
    pub fn new(id: u64, method: &str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: Value::from(id),
        }
    }

    /// Validate that this is a proper JSON-RPC 2.0 request.
    pub fn validate(&self) -> Result<(), String> {
        if self.jsonrpc != "2.0" {
            return Err("jsonrpc must be \"2.0\"".to_string());
        }
        if self.method.is_empty() {
            return Err("method must not be empty".to_string());
        }
        Ok(())
    }
}

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Create an error response.
    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
            id,
        }
    }

    /// A keyring failure, preserved in `data` so the caller can rebuild it.
    pub fn keyring_error(id: Value, error: &KeyringError) -> Self {
        let mut response = Self::error(id, KEYRING_ERROR, error.to_string());
        if let Some(ref mut e) = response.error {
            e.data = serde_json::to_value(error).ok();
        }
        response
    }

    /// Create a parse error response (id is null because we couldn't parse it).
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::error(Value::Null, PARSE_ERROR, message)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request_without_params() {
        let json = r#"{"jsonrpc":"2.0","method":"keyring_list","id":1}"#;
        let req: JsonRpcRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.params, Value::Null);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_invalid_jsonrpc_version() {
        let json = r#"{"jsonrpc":"1.0","method":"keyring_list","params":{},"id":1}"#;
        let req: JsonRpcRequest = serde_json::from_str(json).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_new_request_is_valid() {
        let req = JsonRpcRequest::new(7, METHOD_INVOKE, serde_json::json!({}));
        assert!(req.validate().is_ok());
        assert_eq!(req.id, Value::from(7));
    }

    #[test]
    fn test_success_response_omits_error() {
        let resp = JsonRpcResponse::success(Value::from(1), serde_json::json!(["Ledger Hardware"]));
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"result\""));
        assert!(!json.contains("\"error\""));
    }

    #[test]
    fn test_keyring_error_carries_data() {
        let err = KeyringError::failure("Action cancelled by user");
        let resp = JsonRpcResponse::keyring_error(Value::from(3), &err);
        let json = serde_json::to_string(&resp).unwrap();

        let back: JsonRpcResponse = serde_json::from_str(&json).unwrap();
        let error = back.error.unwrap();
        assert_eq!(error.code, KEYRING_ERROR);
        let data: KeyringError = serde_json::from_value(error.data.unwrap()).unwrap();
        assert_eq!(data, err);
    }

    #[test]
    fn test_parse_error_has_null_id() {
        let resp = JsonRpcResponse::parse_error("bad json");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"id\":null"));
        assert!(json.contains("-32700"));
    }
}
