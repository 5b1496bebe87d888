//! Mesh-level diagnostics: traces, path discovery, room-server logins,
//! access control, aggregated telemetry and neighbour tables.

use bytes::Bytes;

use crate::protocol::lpp::LppValue;
use crate::types::contact::KeyPrefix;

/// One hop in a trace result.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceNode {
    /// Repeater hash bytes; `None` marks the destination (all-0xFF hash)
    /// and the trailing origin entry.
    pub hash: Option<Bytes>,
    /// SNR measured at this hop, in dB.
    pub snr: f32,
}

/// Result of a `sendTrace` round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceData {
    /// Tag echoed from the request.
    pub tag: u32,
    /// Auth code echoed from the request.
    pub auth_code: u32,
    /// Raw flags byte; the low 2 bits select the per-hop hash width.
    pub flags: u8,
    /// Hash width in bytes (1, 2, 4 or 8).
    pub hash_size: usize,
    /// Per-hop entries, ending with the local reception entry.
    pub nodes: Vec<TraceNode>,
}

/// Outbound/inbound routes learned from a path discovery exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct PathDiscovery {
    /// Key prefix of the discovered node.
    pub pubkey_prefix: KeyPrefix,
    /// Route towards the node.
    pub out_path: Bytes,
    /// Route back from the node.
    pub in_path: Bytes,
}

/// Permission level granted by a room server, normalized across the legacy
/// and ACL login response forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Permission {
    /// Read-only guest access.
    Guest = 0,
    /// Regular read/write access.
    ReadWrite = 1,
    /// Administrative access.
    Admin = 2,
}

/// Successful room-server login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginInfo {
    /// Key prefix of the server that accepted the login.
    pub server_prefix: KeyPrefix,
    /// Normalized permission level.
    pub permission: Permission,
    /// Server clock at login (extended form only).
    pub server_timestamp: Option<u32>,
    /// Raw ACL permission byte (extended form only).
    pub acl_permissions: Option<u8>,
    /// Firmware version level (extended form only).
    pub firmware_level: Option<u8>,
}

/// One access-control entry of a room server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AclEntry {
    /// Key prefix of the granted client.
    pub key_prefix: KeyPrefix,
    /// Raw permission byte.
    pub permissions: u8,
}

/// Min/max/average aggregate for one sensor channel.
#[derive(Debug, Clone, PartialEq)]
pub struct MmaRecord {
    /// Sensor channel.
    pub channel: u8,
    /// LPP sensor type code.
    pub lpp_type: u8,
    /// Minimum observed value.
    pub min: LppValue,
    /// Maximum observed value.
    pub max: LppValue,
    /// Average value.
    pub avg: LppValue,
}

/// One row of a repeater's neighbour table.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbour {
    /// Key prefix, at the width requested (typically 4 bytes).
    pub prefix: Bytes,
    /// Seconds since the neighbour was last heard.
    pub heard_secs_ago: i32,
    /// SNR of the last reception, in dB.
    pub snr: f32,
}

/// Neighbour-table response.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighbourTable {
    /// Total neighbours known to the responder.
    pub total: i16,
    /// Entries returned in this response.
    pub neighbours: Vec<Neighbour>,
}

/// Decoded discover-response carried inside control data.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoverResponse {
    /// SNR measured at the responding node, in dB.
    pub snr_in: f32,
    /// Tag echoed from the discover request.
    pub tag: u32,
    /// Responder public key: 32 bytes when available, else a prefix.
    pub public_key: Bytes,
}

/// Control-data push payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlData {
    /// SNR of the reception, in dB.
    pub snr: f32,
    /// RSSI of the reception, in dBm.
    pub rssi: i8,
    /// Path length the packet travelled.
    pub path_len: u8,
    /// Raw payload type byte; the upper nibble 0x9 marks discover responses.
    pub payload_type: u8,
    /// Decoded discover response, when the payload type marks one.
    pub discover: Option<DiscoverResponse>,
    /// Raw inner payload.
    pub payload: Bytes,
}

/// Advertisement path for a contact.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvertPath {
    /// When the advertisement was received (Unix seconds).
    pub recv_timestamp: u32,
    /// Path the advertisement travelled.
    pub path: Bytes,
}
