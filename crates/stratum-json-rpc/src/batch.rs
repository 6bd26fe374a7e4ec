//! Wire encoding of a batch of responses.

use tracing::error;

use crate::response::JsonRpcMessage;

/// Sent in place of a response that could not be serialized
pub const SERIALIZATION_FALLBACK: &str =
    r#"{"jsonrpc":"2.0","error":{"code":-32603,"message":"Failed to serialize response"},"id":null}"#;

/// Serialize each message to its own JSON text, in order
pub fn serialize_messages(messages: &[JsonRpcMessage]) -> Vec<String> {
    messages
        .iter()
        .map(|message| {
            message.to_json_string().unwrap_or_else(|err| {
                error!("Failed to serialize response {:?}: {}", message.id(), err);
                SERIALIZATION_FALLBACK.to_string()
            })
        })
        .collect()
}

/// Join already-serialized items into a response body.
///
/// No items gives an empty body, one item is sent as-is, more are wrapped in a JSON array.
pub fn encode_response_body(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [single] => single.clone(),
        many => {
            let mut body =
                String::with_capacity(many.iter().map(|s| s.len() + 1).sum::<usize>() + 1);
            body.push('[');
            body.push_str(&many.join(","));
            body.push(']');
            body
        }
    }
}
