use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{JsonRpcVersion, RequestId};

/// Parameters for a JSON-RPC request
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RequestParams {
    /// Positional parameters as an array
    Array(Vec<Value>),
    /// Named parameters as an object
    Object(Map<String, Value>),
}

impl Default for RequestParams {
    fn default() -> Self {
        RequestParams::Array(Vec::new())
    }
}

impl RequestParams {
    /// Get a parameter by name (object params only)
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            RequestParams::Object(map) => map.get(key),
            RequestParams::Array(_) => None,
        }
    }

    /// Get a parameter by index (array params only)
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        match self {
            RequestParams::Array(vec) => vec.get(index),
            RequestParams::Object(_) => None,
        }
    }

    /// Positional lookup first, then by name. Lets handlers accept both call styles.
    pub fn lookup(&self, index: usize, name: &str) -> Option<&Value> {
        self.get_index(index).or_else(|| self.get(name))
    }

    pub fn len(&self) -> usize {
        match self {
            RequestParams::Object(map) => map.len(),
            RequestParams::Array(vec) => vec.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert to a serde_json::Value for serialization
    pub fn to_value(&self) -> Value {
        match self {
            RequestParams::Object(map) => Value::Object(map.clone()),
            RequestParams::Array(arr) => Value::Array(arr.clone()),
        }
    }
}

impl From<Vec<Value>> for RequestParams {
    fn from(vec: Vec<Value>) -> Self {
        RequestParams::Array(vec)
    }
}

impl From<Map<String, Value>> for RequestParams {
    fn from(map: Map<String, Value>) -> Self {
        RequestParams::Object(map)
    }
}

/// A validated JSON-RPC request.
///
/// Built by [`crate::validate_request`]; `method` is non-empty and `params`
/// is always present (missing params become an empty list).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcRequest {
    #[serde(rename = "jsonrpc", skip_serializing_if = "JsonRpcVersion::is_legacy")]
    pub version: JsonRpcVersion,
    pub id: Option<RequestId>,
    pub method: String,
    pub params: RequestParams,
}

impl JsonRpcRequest {
    pub fn new(id: Option<RequestId>, method: impl Into<String>, params: RequestParams) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            id,
            method: method.into(),
            params,
        }
    }

    /// A request in the 1.0 style (`id` present, no `jsonrpc` member)
    pub fn legacy(id: Option<RequestId>, method: impl Into<String>, params: RequestParams) -> Self {
        Self {
            version: JsonRpcVersion::V1_0,
            ..Self::new(id, method, params)
        }
    }

    /// No id (or a null one): no response entry is produced
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Get a parameter by name (if params are an object)
    pub fn get_param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Get a parameter by index (if params are an array)
    pub fn get_param_index(&self, index: usize) -> Option<&Value> {
        self.params.get_index(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_with_object_params() {
        let mut params = Map::new();
        params.insert("name".to_string(), json!("test"));
        params.insert("value".to_string(), json!(42));

        let request = JsonRpcRequest::new(
            Some(RequestId::from("req1")),
            "set_value",
            RequestParams::Object(params),
        );

        assert_eq!(request.get_param("name"), Some(&json!("test")));
        assert_eq!(request.get_param("value"), Some(&json!(42)));
        assert_eq!(request.get_param("missing"), None);
        assert_eq!(request.get_param_index(0), None);
    }

    #[test]
    fn test_request_with_array_params() {
        let request = JsonRpcRequest::new(
            Some(RequestId::from(2)),
            "process",
            vec![json!("test"), json!(42), json!(true)].into(),
        );

        assert_eq!(request.get_param_index(0), Some(&json!("test")));
        assert_eq!(request.get_param_index(2), Some(&json!(true)));
        assert_eq!(request.get_param_index(3), None);
        assert_eq!(request.params.len(), 3);
    }

    #[test]
    fn test_lookup_accepts_both_styles() {
        let positional = RequestParams::from(vec![json!("addr")]);
        let mut named = Map::new();
        named.insert("address".to_string(), json!("addr"));
        let named = RequestParams::from(named);

        assert_eq!(positional.lookup(0, "address"), Some(&json!("addr")));
        assert_eq!(named.lookup(0, "address"), Some(&json!("addr")));
        assert_eq!(RequestParams::default().lookup(0, "address"), None);
    }

    #[test]
    fn test_serialization_follows_version() {
        let v2 = JsonRpcRequest::new(Some(1.into()), "client.version", RequestParams::default());
        let v1 = JsonRpcRequest::legacy(Some(1.into()), "client.version", RequestParams::default());

        assert_eq!(
            serde_json::to_value(&v2).unwrap(),
            json!({"jsonrpc": "2.0", "id": 1, "method": "client.version", "params": []})
        );
        assert_eq!(
            serde_json::to_value(&v1).unwrap(),
            json!({"id": 1, "method": "client.version", "params": []})
        );
        assert!(!v1.is_notification());
        assert!(JsonRpcRequest::new(None, "x", RequestParams::default()).is_notification());
    }
}
