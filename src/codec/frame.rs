//! Length-prefixed frame encoding and incremental decoding.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management.
//! Decoding is a state machine over fragmented reads:
//! - `WaitingForLength`: need at least 4 bytes
//! - `WaitingForPayload`: length parsed, need N more payload bytes
//!
//! A frame is never interpreted until all of its declared bytes have
//! arrived, and a single read may carry any number of complete frames.

use bytes::{Bytes, BytesMut};
use serde::Serialize;

use crate::error::{Result, RpcError};

/// Size of the length prefix in bytes.
pub const LEN_PREFIX_SIZE: usize = 4;

/// Default maximum payload size accepted by a [`FrameBuffer`] (100 MB).
pub const DEFAULT_MAX_FRAME_BYTES: usize = 100 * 1024 * 1024;

/// Serialize `value` to JSON and prefix it with its byte length as a
/// 4-byte big-endian unsigned integer.
///
/// # Errors
///
/// Returns [`RpcError::Encode`] if `value` is not JSON-representable.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let payload = serde_json::to_vec(value).map_err(RpcError::Encode)?;
    let mut frame = Vec::with_capacity(LEN_PREFIX_SIZE + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Parsing state for the incremental decoder.
#[derive(Debug, Clone, Copy)]
enum State {
    /// Waiting for the 4-byte length prefix.
    WaitingForLength,
    /// Length parsed, waiting for the full payload.
    WaitingForPayload { len: usize },
}

/// Buffer for accumulating inbound bytes and extracting complete payloads.
///
/// All data lives in a single `BytesMut`; complete payloads are sliced off
/// with `split_to` and frozen, so no payload bytes are copied twice.
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Maximum allowed payload size.
    max_frame_bytes: usize,
}

impl FrameBuffer {
    /// Create a new frame buffer with the default payload limit.
    pub fn new() -> Self {
        Self::with_max_frame(DEFAULT_MAX_FRAME_BYTES)
    }

    /// Create a new frame buffer with a custom payload limit.
    pub fn with_max_frame(max_frame_bytes: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8 * 1024),
            state: State::WaitingForLength,
            max_frame_bytes,
        }
    }

    /// Push data into the buffer and extract all complete payloads.
    ///
    /// Partial data is buffered internally for the next push; an empty
    /// result means more bytes are needed, not that anything went wrong.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Protocol`] if a declared length exceeds the
    /// configured maximum.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Bytes>> {
        self.buffer.extend_from_slice(data);

        let mut payloads = Vec::new();
        while let Some(payload) = self.try_extract_one()? {
            payloads.push(payload);
        }

        Ok(payloads)
    }

    /// Try to slice a single complete payload off the buffer.
    ///
    /// Returns `Ok(None)` when more data is needed.
    fn try_extract_one(&mut self) -> Result<Option<Bytes>> {
        match self.state {
            State::WaitingForLength => {
                if self.buffer.len() < LEN_PREFIX_SIZE {
                    return Ok(None);
                }

                let len = u32::from_be_bytes([
                    self.buffer[0],
                    self.buffer[1],
                    self.buffer[2],
                    self.buffer[3],
                ]) as usize;

                if len > self.max_frame_bytes {
                    return Err(RpcError::Protocol(format!(
                        "frame length {} exceeds maximum {}",
                        len, self.max_frame_bytes
                    )));
                }

                let _ = self.buffer.split_to(LEN_PREFIX_SIZE);
                self.state = State::WaitingForPayload { len };

                self.try_extract_one()
            }

            State::WaitingForPayload { len } => {
                if self.buffer.len() < len {
                    return Ok(None);
                }

                let payload = self.buffer.split_to(len).freeze();
                self.state = State::WaitingForLength;

                Ok(Some(payload))
            }
        }
    }

    /// Number of buffered, not-yet-consumed bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and reset state.
    ///
    /// Used when a connection is torn down; bytes from a dead connection
    /// must never be combined with bytes from its replacement.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForLength;
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn decode_payload(payload: &[u8]) -> Value {
        serde_json::from_slice(payload).unwrap()
    }

    #[test]
    fn test_encode_prefixes_length() {
        let bytes = encode(&json!("foo")).unwrap();
        let payload = serde_json::to_vec(&json!("foo")).unwrap();

        assert_eq!(&bytes[..4], (payload.len() as u32).to_be_bytes());
        assert_eq!(&bytes[4..], &payload[..]);
    }

    #[test]
    fn test_single_complete_frame() {
        let mut buffer = FrameBuffer::new();
        let value = json!({"id": 1, "method": "echo", "params": ["hi"]});

        let payloads = buffer.push(&encode(&value).unwrap()).unwrap();

        assert_eq!(payloads.len(), 1);
        assert_eq!(decode_payload(&payloads[0]), value);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_round_trip_values() {
        let values = vec![
            json!(null),
            json!(42),
            json!(-1.5),
            json!("string with \"quotes\" and ünïcode"),
            json!([1, [2, [3]]]),
            json!({"nested": {"deep": {"deeper": [true, false, null]}}}),
        ];

        let mut buffer = FrameBuffer::new();
        for value in values {
            let payloads = buffer.push(&encode(&value).unwrap()).unwrap();
            assert_eq!(payloads.len(), 1);
            assert_eq!(decode_payload(&payloads[0]), value);
        }
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut buffer = FrameBuffer::new();

        let mut combined = Vec::new();
        for i in 0..3 {
            combined.extend(encode(&json!({ "id": i })).unwrap());
        }

        let payloads = buffer.push(&combined).unwrap();

        assert_eq!(payloads.len(), 3);
        for (i, payload) in payloads.iter().enumerate() {
            assert_eq!(decode_payload(payload), json!({ "id": i }));
        }
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_length_prefix() {
        let mut buffer = FrameBuffer::new();
        let bytes = encode(&json!("fragmented")).unwrap();

        let payloads = buffer.push(&bytes[..2]).unwrap();
        assert!(payloads.is_empty());

        let payloads = buffer.push(&bytes[2..]).unwrap();
        assert_eq!(payloads.len(), 1);
        assert_eq!(decode_payload(&payloads[0]), json!("fragmented"));
    }

    #[test]
    fn test_fragmented_payload() {
        let mut buffer = FrameBuffer::new();
        let bytes = encode(&json!({"key": "a longer payload value"})).unwrap();

        let split = LEN_PREFIX_SIZE + 7;
        assert!(buffer.push(&bytes[..split]).unwrap().is_empty());

        let payloads = buffer.push(&bytes[split..]).unwrap();
        assert_eq!(payloads.len(), 1);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_byte_at_a_time() {
        let value = json!({"id": 7, "result": [1, 2, 3]});
        let bytes = encode(&value).unwrap();

        let mut buffer = FrameBuffer::new();
        let mut all = Vec::new();

        for byte in &bytes {
            all.extend(buffer.push(&[*byte]).unwrap());
        }

        assert_eq!(all.len(), 1);
        assert_eq!(decode_payload(&all[0]), value);
    }

    #[test]
    fn test_every_split_point_yields_exactly_one_decode() {
        let value = json!({"method": "sweep", "params": [null]});
        let bytes = encode(&value).unwrap();

        for split in 0..=bytes.len() {
            let mut buffer = FrameBuffer::new();
            let mut all = Vec::new();
            all.extend(buffer.push(&bytes[..split]).unwrap());
            all.extend(buffer.push(&bytes[split..]).unwrap());

            assert_eq!(all.len(), 1, "split at {}", split);
            assert_eq!(decode_payload(&all[0]), value);
            assert!(buffer.is_empty());
        }
    }

    #[test]
    fn test_complete_frame_plus_partial_next() {
        let mut buffer = FrameBuffer::new();

        let first = encode(&json!("first")).unwrap();
        let second = encode(&json!("second")).unwrap();

        let mut data = first.clone();
        data.extend_from_slice(&second[..3]);

        let payloads = buffer.push(&data).unwrap();
        assert_eq!(payloads.len(), 1);
        assert_eq!(decode_payload(&payloads[0]), json!("first"));

        let payloads = buffer.push(&second[3..]).unwrap();
        assert_eq!(payloads.len(), 1);
        assert_eq!(decode_payload(&payloads[0]), json!("second"));
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut buffer = FrameBuffer::with_max_frame(16);

        let mut data = Vec::new();
        data.extend_from_slice(&1024u32.to_be_bytes());

        let result = buffer.push(&data);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_clear_resets_state() {
        let mut buffer = FrameBuffer::new();
        let bytes = encode(&json!("abandoned")).unwrap();

        buffer.push(&bytes[..6]).unwrap();
        assert!(!buffer.is_empty());

        buffer.clear();
        assert!(buffer.is_empty());

        // A fresh frame decodes cleanly after the reset.
        let payloads = buffer.push(&encode(&json!("fresh")).unwrap()).unwrap();
        assert_eq!(payloads.len(), 1);
        assert_eq!(decode_payload(&payloads[0]), json!("fresh"));
    }
}
