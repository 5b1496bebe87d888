//! Device statistics blocks.
//!
//! The stats command returns one of three families selected by a type
//! byte; remote nodes answer status requests with the larger
//! [`DeviceStatus`] block.

use crate::types::contact::KeyPrefix;

/// Health counters of the local radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreStats {
    /// Supply voltage in millivolts.
    pub battery_mv: u16,
    /// Seconds since boot.
    pub uptime_secs: u32,
    /// Accumulated error flag bits.
    pub error_flags: u16,
    /// Frames currently queued for transmit.
    pub queue_len: u8,
}

/// RF-side counters of the local radio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadioStats {
    /// Measured noise floor in dBm.
    pub noise_floor: i16,
    /// RSSI of the most recent reception, in dBm.
    pub last_rssi: i8,
    /// SNR of the most recent reception, in dB.
    pub last_snr: f32,
    /// Cumulative transmit airtime in seconds.
    pub tx_airtime_secs: u32,
    /// Cumulative receive airtime in seconds.
    pub rx_airtime_secs: u32,
}

/// Traffic counters, split by direction and routing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketStats {
    /// Frames received, any kind.
    pub received: u32,
    /// Frames sent, any kind.
    pub sent: u32,
    /// Flooded frames sent.
    pub sent_flood: u32,
    /// Source-routed frames sent.
    pub sent_direct: u32,
    /// Flooded frames received.
    pub recv_flood: u32,
    /// Source-routed frames received.
    pub recv_direct: u32,
}

/// Remote device status, either pushed (with the sender's key prefix on
/// the wire) or recovered from a binary response (prefix supplied from the
/// originating request).
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceStatus {
    /// Public key prefix of the reporting node.
    pub pubkey_prefix: KeyPrefix,
    /// Battery voltage in millivolts.
    pub battery_mv: u16,
    /// TX queue length.
    pub tx_queue_len: u16,
    /// Noise floor in dBm.
    pub noise_floor: i16,
    /// Last RSSI in dBm.
    pub last_rssi: i16,
    /// Number of packets received.
    pub packets_received: u32,
    /// Number of packets sent.
    pub packets_sent: u32,
    /// Total TX airtime in seconds.
    pub airtime_secs: u32,
    /// Uptime in seconds.
    pub uptime_secs: u32,
    /// Flood packets sent.
    pub sent_flood: u32,
    /// Direct packets sent.
    pub sent_direct: u32,
    /// Flood packets received.
    pub recv_flood: u32,
    /// Direct packets received.
    pub recv_direct: u32,
    /// Full events count.
    pub full_events: u16,
    /// Last SNR in dB.
    pub last_snr: f32,
    /// Direct duplicate count.
    pub direct_dups: u16,
    /// Flood duplicate count.
    pub flood_dups: u16,
    /// RX airtime in seconds (0 when the firmware omits the field).
    pub rx_airtime_secs: u32,
}
