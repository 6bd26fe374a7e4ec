use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;

/// Identifier correlating a response with its request.
///
/// Strings and numbers are accepted. A missing or `null` id marks a
/// notification and is carried as `Option::None` by the request types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(Number),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::String(s) => write!(f, "{}", s),
            RequestId::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n.into())
    }
}

impl From<i32> for RequestId {
    fn from(n: i32) -> Self {
        RequestId::Number(n.into())
    }
}

impl From<u64> for RequestId {
    fn from(n: u64) -> Self {
        RequestId::Number(n.into())
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::String(s)
    }
}

impl RequestId {
    /// Convert a raw JSON id. Returns `None` for anything that is not a string or number.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(RequestId::String(s.clone())),
            Value::Number(n) => Some(RequestId::Number(n.clone())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RequestId::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RequestId::Number(n) => n.as_i64(),
            _ => None,
        }
    }
}

/// JSON-RPC protocol generation of a request.
///
/// Both versions share one dispatch path; the version only decides whether
/// outgoing envelopes carry the `"jsonrpc": "2.0"` marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsonRpcVersion {
    V1_0,
    V2_0,
}

impl JsonRpcVersion {
    /// Detect the version of a request object.
    ///
    /// A `jsonrpc` key means 2.0, otherwise an `id` key means 1.0. An object
    /// carrying neither has no version and is not a valid request.
    pub fn detect(request: &Map<String, Value>) -> Option<Self> {
        if request.contains_key("jsonrpc") {
            Some(JsonRpcVersion::V2_0)
        } else if request.contains_key("id") {
            Some(JsonRpcVersion::V1_0)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JsonRpcVersion::V1_0 => "1.0",
            JsonRpcVersion::V2_0 => "2.0",
        }
    }

    /// 1.0 envelopes are written without the `jsonrpc` member.
    pub fn is_legacy(&self) -> bool {
        matches!(self, JsonRpcVersion::V1_0)
    }

    /// Serde default for envelopes that arrive without a `jsonrpc` member.
    pub fn legacy() -> Self {
        JsonRpcVersion::V1_0
    }
}

impl Default for JsonRpcVersion {
    fn default() -> Self {
        JsonRpcVersion::V2_0
    }
}

impl fmt::Display for JsonRpcVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for JsonRpcVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "2.0" => Ok(JsonRpcVersion::V2_0),
            "1.0" => Ok(JsonRpcVersion::V1_0),
            _ => Err(serde::de::Error::custom(format!(
                "Invalid JSON-RPC version: {}",
                s
            ))),
        }
    }
}

/// Short JSON type name used in diagnostics.
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_request_id_serialization() {
        let id_str = RequestId::String("test".to_string());
        let id_num = RequestId::from(42);

        assert_eq!(serde_json::to_string(&id_str).unwrap(), r#""test""#);
        assert_eq!(serde_json::to_string(&id_num).unwrap(), "42");
    }

    #[test]
    fn test_request_id_from_json() {
        assert_eq!(RequestId::from_json(&json!(7)), Some(RequestId::from(7)));
        assert_eq!(RequestId::from_json(&json!("a")), Some(RequestId::from("a")));
        assert_eq!(
            RequestId::from_json(&json!(1.5)).map(|id| id.to_string()),
            Some("1.5".to_string())
        );
        assert_eq!(RequestId::from_json(&json!(null)), None);
        assert_eq!(RequestId::from_json(&json!([1])), None);
        assert_eq!(RequestId::from_json(&json!(true)), None);
    }

    #[test]
    fn test_version_detection() {
        let v2 = object(json!({"jsonrpc": "2.0", "method": "x"}));
        let v2_with_id = object(json!({"jsonrpc": "2.0", "id": 1, "method": "x"}));
        let v1 = object(json!({"id": 1, "method": "x"}));
        let v1_null_id = object(json!({"id": null, "method": "x"}));
        let unknown = object(json!({"method": "x"}));

        assert_eq!(JsonRpcVersion::detect(&v2), Some(JsonRpcVersion::V2_0));
        assert_eq!(JsonRpcVersion::detect(&v2_with_id), Some(JsonRpcVersion::V2_0));
        assert_eq!(JsonRpcVersion::detect(&v1), Some(JsonRpcVersion::V1_0));
        assert_eq!(JsonRpcVersion::detect(&v1_null_id), Some(JsonRpcVersion::V1_0));
        assert_eq!(JsonRpcVersion::detect(&unknown), None);
    }

    #[test]
    fn test_json_rpc_version() {
        let version = JsonRpcVersion::V2_0;
        assert_eq!(version.as_str(), "2.0");
        assert_eq!(serde_json::to_string(&version).unwrap(), r#""2.0""#);
        assert!(JsonRpcVersion::V1_0.is_legacy());
        assert!(!JsonRpcVersion::V2_0.is_legacy());
    }
}
