//! Text codec for envelopes
//!
//! Transports move text; the core works with decoded envelopes. These helpers
//! sit at that seam and map serde failures onto the error taxonomy:
//!
//! - text that is not JSON → parse error (-32700)
//! - an empty batch array → invalid request (-32600)
//! - JSON of the wrong shape → `Error::Serialization`
//!
//! # Examples
//!
//! ```rust
//! use svcrpc_core::{codec, Id, Payload, Request};
//!
//! let request = Request::new("ping", vec![], Some(Id::Number(1)));
//! let text = codec::encode(&request).unwrap();
//!
//! match codec::decode_payload(&text).unwrap() {
//!     Payload::Single(value) => assert_eq!(value["method"], "ping"),
//!     Payload::Batch(_) => unreachable!(),
//! }
//! ```

use crate::error::{Error, Result, RpcError};
use crate::types::{Payload, Request, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Encode any serializable envelope (or batch) to text
pub fn encode<T: Serialize>(msg: &T) -> Result<String> {
    serde_json::to_string(msg).map_err(|e| Error::Serialization(e.to_string()))
}

/// Decode text into one raw envelope or a batch of raw envelopes
///
/// Batch items stay as raw values so each one can fail independently when it
/// is later interpreted as a request.
pub fn decode_payload(data: &str) -> Result<Payload<Value>> {
    let value: Value =
        serde_json::from_str(data).map_err(|_| Error::Rpc(RpcError::parse_error()))?;
    payload_from_value(value)
}

/// Split an already-parsed JSON value into single or batch form
pub fn payload_from_value(value: Value) -> Result<Payload<Value>> {
    match value {
        Value::Array(items) if items.is_empty() => Err(Error::Rpc(RpcError::invalid_request(
            "Batch cannot be empty",
        ))),
        Value::Array(items) => Ok(Payload::Batch(items)),
        other => Ok(Payload::Single(other)),
    }
}

/// Decode text into a specific type
pub fn decode_as<T: DeserializeOwned>(data: &str) -> Result<T> {
    serde_json::from_str(data).map_err(|e| Error::Serialization(e.to_string()))
}

/// Decode a single request envelope
pub fn decode_request(data: &str) -> Result<Request> {
    decode_as(data)
}

/// Decode a single response envelope
pub fn decode_response(data: &str) -> Result<Response> {
    decode_as(data)
}

/// Decode one response or a batch reply
pub fn decode_responses(data: &str) -> Result<Payload<Response>> {
    decode_as(data)
}

/// Interpret a raw value as a response or batch of responses
pub fn responses_from_value(value: Value) -> Result<Payload<Response>> {
    serde_json::from_value(value).map_err(|e| Error::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Id;
    use serde_json::json;

    #[test]
    fn test_invalid_json_is_parse_error() {
        match decode_payload("{not json") {
            Err(Error::Rpc(e)) => assert_eq!(e.code, -32700),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_batch_is_invalid_request() {
        match decode_payload("[]") {
            Err(Error::Rpc(e)) => assert_eq!(e.code, -32600),
            other => panic!("expected invalid request, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_batch() {
        let text = r#"[{"jsonrpc":"2.0","method":"a","id":1},{"jsonrpc":"2.0","method":"b"}]"#;
        let payload = decode_payload(text).unwrap();
        assert!(payload.is_batch());
        assert_eq!(payload.into_vec().len(), 2);
    }

    #[test]
    fn test_decode_responses_batch() {
        let text = r#"[{"jsonrpc":"2.0","result":5,"id":2},{"jsonrpc":"2.0","result":null,"id":1}]"#;
        let responses = decode_responses(text).unwrap().into_vec();
        assert_eq!(responses[0].id, Some(Id::Number(2)));
        assert_eq!(responses[1].result, Some(Value::Null));
    }

    #[test]
    fn test_decode_request_with_string_id() {
        let request = decode_request(r#"{"jsonrpc":"2.0","method":"echo","params":["x"],"id":"abc"}"#)
            .unwrap();
        assert_eq!(request.id, Some(Id::from("abc")));
        assert_eq!(request.params, Some(json!(["x"])));
    }

    #[test]
    fn test_encode_batch_is_array() {
        let batch = Payload::Batch(vec![
            Request::new("a", vec![], Some(Id::Number(1))),
            Request::notification("b", vec![]),
        ]);
        let text = encode(&batch).unwrap();
        assert!(text.starts_with('['));
    }
}
