//! Message types for received and sent messages.

use crate::types::contact::KeyPrefix;

/// Text type indicating message format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TextType {
    /// Plain text message.
    #[default]
    Plain = 0,
    /// Command message (CLI command to device).
    Command = 1,
    /// Signed message with signature.
    Signed = 2,
}

impl TextType {
    /// Parses text type from a byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            1 => Self::Command,
            2 => Self::Signed,
            _ => Self::Plain,
        }
    }
}

/// Signal quality attached to v3 message frames.
///
/// The v3 variants prepend one SNR byte and two reserved bytes; there is
/// no RSSI in message frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalQuality {
    /// Signal-to-noise ratio in dB (raw value divided by 4).
    pub snr: f32,
}

/// A received message from a contact (private message).
#[derive(Debug, Clone, PartialEq)]
pub struct ContactMessage {
    /// Public key prefix of the sender.
    pub sender_prefix: KeyPrefix,
    /// Path length.
    pub path_len: i8,
    /// Text type.
    pub text_type: TextType,
    /// Sender's timestamp (Unix seconds).
    pub timestamp: u32,
    /// Message signature (if `text_type` is `Signed`).
    pub signature: Option<[u8; 4]>,
    /// Message text.
    pub text: String,
    /// Signal quality (only in v3 frames).
    pub signal: Option<SignalQuality>,
}

/// A received message from a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMessage {
    /// Channel index.
    pub channel_index: u8,
    /// Path length.
    pub path_len: i8,
    /// Text type.
    pub text_type: TextType,
    /// Sender's timestamp (Unix seconds).
    pub timestamp: u32,
    /// Message text.
    pub text: String,
    /// Signal quality (only in v3 frames).
    pub signal: Option<SignalQuality>,
}

/// Reply to an outbound message, carrying the ack correlation tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageSent {
    /// Whether the message went out as a flood.
    pub is_flood: bool,
    /// 4-byte tag a later ack push will echo.
    pub expected_ack: u32,
    /// Firmware's suggested wait for that ack, in milliseconds.
    pub suggested_timeout_ms: u32,
}

/// Acknowledgment push for a previously sent message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acknowledgement {
    /// Ack code matching the `expected_ack` of an earlier send.
    pub code: u32,
    /// Round-trip time in milliseconds, when the firmware reports it.
    pub round_trip_ms: Option<u32>,
}
