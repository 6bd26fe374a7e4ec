use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{request::RequestParams, types::JsonRpcVersion};

/// A server-initiated message (request without an id), queued for delivery
/// on the client's next poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    #[serde(
        rename = "jsonrpc",
        default = "JsonRpcVersion::legacy",
        skip_serializing_if = "JsonRpcVersion::is_legacy"
    )]
    pub version: JsonRpcVersion,
    pub method: String,
    pub params: RequestParams,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: RequestParams) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            method: method.into(),
            params,
        }
    }

    /// Stratum-style push without the `jsonrpc` marker, as Electrum clients expect
    pub fn legacy(method: impl Into<String>, params: RequestParams) -> Self {
        Self {
            version: JsonRpcVersion::V1_0,
            method: method.into(),
            params,
        }
    }

    pub fn to_value(&self) -> Value {
        let mut map = serde_json::Map::new();
        if !self.version.is_legacy() {
            map.insert("jsonrpc".to_string(), Value::from(self.version.as_str()));
        }
        map.insert("method".to_string(), Value::from(self.method.clone()));
        map.insert("params".to_string(), self.params.to_value());
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_legacy_notification_value() {
        let notification = JsonRpcNotification::legacy(
            "blockchain.numblocks.subscribe",
            vec![json!(123456)].into(),
        );

        assert_eq!(
            notification.to_value(),
            json!({"method": "blockchain.numblocks.subscribe", "params": [123456]})
        );
        assert_eq!(
            serde_json::to_value(&notification).unwrap(),
            notification.to_value()
        );
    }

    #[test]
    fn test_notification_json_format() {
        let notification = JsonRpcNotification::new("ping", RequestParams::default());
        let json_str = serde_json::to_string(&notification).unwrap();

        assert!(!json_str.contains("\"id\""));
        assert!(json_str.contains("\"jsonrpc\":\"2.0\""));
        assert!(json_str.contains("\"method\":\"ping\""));
    }
}
