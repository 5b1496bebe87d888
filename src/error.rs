//! Error types for the meshcore-companion library.

use thiserror::Error;

/// The main error type for session and transport operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Serial port error.
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// Connection attempt failed.
    #[error("connect failed: {0}")]
    Connect(std::io::Error),

    /// Connection attempt did not finish within the configured window.
    #[error("connect timed out after {timeout_ms}ms")]
    ConnectTimeout { timeout_ms: u64 },

    /// Writing a frame to the transport failed.
    #[error("send failed: {0}")]
    Send(std::io::Error),

    /// Writing a frame did not finish within the configured window.
    #[error("send timed out after {timeout_ms}ms")]
    SendTimeout { timeout_ms: u64 },

    /// Reading from the transport failed.
    #[error("receive failed: {0}")]
    Receive(std::io::Error),

    /// Frame encoding/decoding error. `TooLarge` is fatal to the session.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The firmware answered a command with an error response.
    #[error("firmware error{}", code.map(|c| format!(" (code {c})")).unwrap_or_default())]
    Firmware { code: Option<u8> },

    /// No response with an expected code arrived in time.
    #[error("command timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// A response arrived whose shape does not match the issued command.
    #[error("unexpected response code 0x{code:02X}")]
    UnexpectedResponse { code: u8 },

    /// No ack push matched the expected tag within the suggested window.
    #[error("ack timed out after {timeout_ms}ms")]
    AckTimeout { timeout_ms: u64 },

    /// Transport is not connected.
    #[error("not connected")]
    NotConnected,

    /// The session has not completed its start handshake.
    #[error("session not started")]
    NotStarted,

    /// `start` was called on a session that already ran its handshake.
    #[error("session already started")]
    AlreadyStarted,

    /// The session disconnected while a request was outstanding. A
    /// disconnected session is not reusable; build a fresh one.
    #[error("disconnected")]
    Disconnected,

    /// Invalid public key format.
    #[error("invalid public key: {reason}")]
    InvalidPublicKey { reason: String },

    /// Invalid coordinates.
    #[error("invalid coordinates: {reason}")]
    InvalidCoordinates { reason: String },
}

/// Frame-specific errors.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Frame payload exceeds maximum size.
    #[error("frame too large: {size} bytes exceeds maximum {max}")]
    TooLarge { size: usize, max: usize },
}

/// Reasons a received frame failed to parse.
///
/// These never surface as `Err` to callers; the parser wraps them into
/// [`Event::ParseFailure`](crate::event::Event::ParseFailure) so malformed
/// frames stay observable without killing the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Zero-length frame.
    #[error("empty frame")]
    Empty,

    /// First byte is not in the closed response-code table.
    #[error("unknown response code 0x{0:02X}")]
    UnknownResponseCode(u8),

    /// Payload shorter than the minimum for its response code.
    #[error("payload too short for 0x{code:02X}: need {expected} bytes, got {actual}")]
    TooShort {
        code: u8,
        expected: usize,
        actual: usize,
    },

    /// A field inside the payload did not decode.
    #[error("malformed payload for 0x{code:02X}: {reason}")]
    Malformed { code: u8, reason: String },
}

/// Result type alias for meshcore-companion operations.
pub type Result<T> = std::result::Result<T, Error>;
