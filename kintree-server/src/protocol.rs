//! JSON-RPC 2.0 message types and method parameters.

use kintree_core::{FamilyDocument, PersonFields};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// A person or relationship named in the request does not exist.
pub const NOT_FOUND: i32 = -32001;
/// The edit conflicts with the data (self-links, duplicate ids, cycles).
pub const CONFLICT: i32 = -32002;
/// A field failed validation.
pub const INVALID_DATA: i32 = -32003;

/// An incoming JSON-RPC request.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    #[serde(default = "default_jsonrpc")]
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub id: Option<Value>,
}

fn default_jsonrpc() -> String {
    "2.0".to_string()
}

/// A JSON-RPC response carrying either a result or an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Response {
    pub fn success<T: Serialize>(id: Option<Value>, result: T) -> Self {
        match serde_json::to_value(result) {
            Ok(value) => Self {
                jsonrpc: "2.0".to_string(),
                result: Some(value),
                error: None,
                id,
            },
            Err(e) => Self::error(id, INTERNAL_ERROR, format!("Serialization failed: {}", e)),
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
                data: None,
            }),
            id,
        }
    }

    /// An error response that also carries structured detail.
    pub fn error_with_data(
        id: Option<Value>,
        code: i32,
        message: impl Into<String>,
        data: Value,
    ) -> Self {
        let mut response = Self::error(id, code, message);
        if let Some(error) = response.error.as_mut() {
            error.data = Some(data);
        }
        response
    }

    pub fn parse_error() -> Self {
        Self::error(None, PARSE_ERROR, "Parse error")
    }

    pub fn invalid_request(id: Option<Value>, message: impl Into<String>) -> Self {
        Self::error(id, INVALID_REQUEST, message)
    }

    pub fn method_not_found(id: Option<Value>, method: &str) -> Self {
        Self::error(id, METHOD_NOT_FOUND, format!("Method not found: {}", method))
    }

    pub fn invalid_params(id: Option<Value>, message: impl Into<String>) -> Self {
        Self::error(id, INVALID_PARAMS, message)
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// A server-initiated message with no id, pushed to every client.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: Value,
}

impl Notification {
    pub fn new(method: &'static str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

// Method parameters

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderParams {
    /// Defaults to the document's root.
    #[serde(default)]
    pub root: Option<String>,
    /// Include the expansion tree alongside the positions.
    #[serde(default)]
    pub include_tree: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentLoadParams {
    pub document: FamilyDocument,
}

/// Fields left out are kept as they are.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetaParams {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollapseParams {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CycleCheckParams {
    pub parent: String,
    pub child: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersonUpdateParams {
    pub id: String,
    pub person: PersonFields,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonDeleteParams {
    pub id: String,
    /// Only report what would be removed.
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParentChildParams {
    #[serde(default)]
    pub father: Option<String>,
    #[serde(default)]
    pub mother: Option<String>,
    pub child: String,
    #[serde(default = "default_biological")]
    pub biological: bool,
    #[serde(default)]
    pub notes: Option<String>,
    /// Store the edge even if it closes an ancestry loop.
    #[serde(default)]
    pub force: bool,
}

fn default_biological() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpouseParams {
    pub people: [String; 2],
    #[serde(default)]
    pub start_year: Option<i32>,
    #[serde(default)]
    pub end_year: Option<i32>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_defaults() {
        let request: Request = serde_json::from_str(r#"{"method": "document.info"}"#).unwrap();
        assert_eq!(request.jsonrpc, "2.0");
        assert!(request.params.is_null());
        assert!(request.id.is_none());
    }

    #[test]
    fn test_error_response_shape() {
        let response = Response::method_not_found(Some(json!(7)), "nope");
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["id"], 7);
        assert_eq!(value["error"]["code"], METHOD_NOT_FOUND);
        assert!(value.get("result").is_none());
        assert!(!response.is_success());
    }

    #[test]
    fn test_parent_child_params_defaults() {
        let params: ParentChildParams =
            serde_json::from_value(json!({"mother": "aneeta", "child": "kartik"})).unwrap();
        assert!(params.biological);
        assert!(!params.force);
        assert_eq!(params.father, None);
    }
}
