//! Frame encoding and decoding for byte-stream transports.
//!
//! Stream links (TCP, serial) carry frames with a length prefix:
//! ```text
//! ┌─────────────────┬─────────────────┐
//! │  length (BE)    │    payload      │
//! │    2 bytes      │  length bytes   │
//! └─────────────────┴─────────────────┘
//! ```
//! Datagram links (BLE notify) already preserve boundaries and bypass
//! this codec entirely.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::FrameError;

/// Maximum frame payload size (64KB - 1).
pub const MAX_FRAME_SIZE: usize = 65535;

/// Size of the length prefix.
pub const LEN_PREFIX_SIZE: usize = 2;

/// Encodes a payload into a framed message.
///
/// # Panics
///
/// Panics if the payload exceeds `MAX_FRAME_SIZE`.
#[must_use]
pub fn encode(payload: &[u8]) -> Bytes {
    assert!(
        payload.len() <= MAX_FRAME_SIZE,
        "payload exceeds maximum frame size"
    );

    let mut buf = BytesMut::with_capacity(LEN_PREFIX_SIZE + payload.len());
    buf.put_u16(u16::try_from(payload.len()).expect("length checked above"));
    buf.put_slice(payload);
    buf.freeze()
}

/// Frame decoder that handles partial data.
///
/// Holds at most one in-progress frame; `reset` discards partial state
/// after a disconnect.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
}

impl FrameDecoder {
    /// Creates a new frame decoder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
        }
    }

    /// Feeds data into the decoder.
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next complete frame.
    ///
    /// Returns `Ok(Some(payload))` if a complete frame was decoded,
    /// `Ok(None)` if more data is needed, or an error if the frame is
    /// invalid.
    ///
    /// # Errors
    ///
    /// Returns `FrameError::TooLarge` when the declared length exceeds the
    /// maximum; the session treats this as fatal.
    pub fn decode(&mut self) -> Result<Option<Bytes>, FrameError> {
        if self.buffer.len() < LEN_PREFIX_SIZE {
            return Ok(None);
        }

        // Length prefix is network byte order
        let length = u16::from_be_bytes([self.buffer[0], self.buffer[1]]) as usize;

        if length > MAX_FRAME_SIZE {
            return Err(FrameError::TooLarge {
                size: length,
                max: MAX_FRAME_SIZE,
            });
        }

        if self.buffer.len() < LEN_PREFIX_SIZE + length {
            return Ok(None);
        }

        self.buffer.advance(LEN_PREFIX_SIZE);
        let payload = self.buffer.split_to(length).freeze();

        Ok(Some(payload))
    }

    /// Returns the number of bytes currently buffered.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Discards any partial frame state.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}
