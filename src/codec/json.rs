//! JSON payload codec.
//!
//! Implemented as a marker struct with static methods rather than a trait
//! object, which keeps codec selection a compile-time concern.

use crate::error::{Result, RpcError};

/// JSON codec for frame payloads.
///
/// Decoding failure on a complete frame is [`RpcError::Decode`] and is
/// fatal to that frame only; it must never be treated as a signal to keep
/// buffering.
pub struct JsonCodec;

impl JsonCodec {
    /// Encode a value to JSON bytes.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(RpcError::Encode)
    }

    /// Decode JSON bytes to a value.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(RpcError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_encode_decode_round_trip() {
        let value = json!({"id": 1, "result": {"hello": "world"}});
        let bytes = JsonCodec::encode(&value).unwrap();
        let decoded: Value = JsonCodec::decode(&bytes).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_decode_error_is_decode_variant() {
        let result: Result<Value> = JsonCodec::decode(b"{not json");
        assert!(matches!(result, Err(crate::error::RpcError::Decode(_))));
    }
}
