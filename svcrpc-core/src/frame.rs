//! Socket frames
//!
//! Socket transports multiplex several message kinds over one connection, so
//! every envelope (or batch) travels inside a topic-tagged frame:
//!
//! ```json
//! {"topic": "call:echo", "payload": {"jsonrpc": "2.0", "method": "echo", "id": 1}}
//! ```
//!
//! Calls go out on the call topic, optionally suffixed with the target service
//! (see [`addressing::channel_tag`](crate::addressing::channel_tag)); replies
//! come back on the return topic.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default topic for outgoing calls
pub const CALL_TOPIC: &str = "call";

/// Default topic for replies
pub const RETURN_TOPIC: &str = "return";

/// One topic-tagged socket message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Channel the payload belongs to
    pub topic: String,
    /// Envelope or array of envelopes
    pub payload: Value,
}

impl Frame {
    /// Frame carrying `payload` on `topic`
    pub fn new(topic: impl Into<String>, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_frame_wire_shape() {
        let frame = Frame::new("call:echo", json!({"method": "echo"}));
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value, json!({"topic": "call:echo", "payload": {"method": "echo"}}));

        let back: Frame = serde_json::from_value(value).unwrap();
        assert_eq!(back, frame);
    }
}
