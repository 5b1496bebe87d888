//! Event types delivered by the parser and the session.
//!
//! Every received frame becomes exactly one [`Event`]. Solicited responses
//! resolve command waiters inside the session; pushes and lifecycle events
//! reach subscribers through [`EventStream`].

use bytes::Bytes;
use tokio::sync::broadcast;

use crate::protocol::lpp::Telemetry;
use crate::protocol::response::ResponseCode;
use crate::types::{
    AclEntry, Acknowledgement, AdvertPath, BatteryInfo, ChannelInfo, ChannelMessage, Contact,
    ContactMessage, ControlData, CoreStats, DeviceInfo, DeviceStatus, KeyPrefix, LoginInfo,
    MessageSent, MmaRecord, NeighbourTable, PacketStats, PathDiscovery, PublicKey, RadioStats,
    SelfInfo, TraceData, TuningParams,
};

/// Connection lifecycle states of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport. Terminal once reached after a start.
    Disconnected,
    /// Transport open in progress.
    Connecting,
    /// Transport open, handshake not yet done.
    Connected,
    /// Handshake complete, commands accepted.
    Ready,
}

/// Statistics data variants.
#[derive(Debug, Clone, PartialEq)]
pub enum StatsData {
    /// Core statistics.
    Core(CoreStats),
    /// Radio statistics.
    Radio(RadioStats),
    /// Packet statistics.
    Packets(PacketStats),
}

/// Event types emitted by the parser and the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The session moved to a new connection state.
    ConnectionState(ConnectionState),

    // ---- solicited responses ----
    /// Command completed successfully; some commands attach a small value
    /// payload (e.g. the auto-add configuration byte).
    Ok { data: Bytes },
    /// Command failed; the firmware may attach an error code.
    Error { code: Option<u8> },
    /// Feature is disabled on this device.
    Disabled,
    /// No more messages available.
    NoMoreMessages,
    /// Current device time (Unix seconds).
    CurrentTime(u32),
    /// Self info received.
    SelfInfo(Box<SelfInfo>),
    /// Device info received.
    DeviceInfo(Box<DeviceInfo>),
    /// Battery status received.
    Battery(BatteryInfo),
    /// Statistics response received.
    Stats(StatsData),
    /// Custom variables received (comma-separated `key:value` pairs).
    CustomVars(String),
    /// Tuning parameters received.
    TuningParams(TuningParams),
    /// Channel information received.
    ChannelInfo(Box<ChannelInfo>),
    /// Contact list started (expected contact count).
    ContactsStart { count: u32 },
    /// Contact received.
    Contact(Box<Contact>),
    /// Contact list ended (most recent modification timestamp).
    ContactsEnd { most_recent_lastmod: u32 },
    /// Contact URI received.
    ContactUri(String),
    /// Advertisement path for a contact.
    AdvertPath(AdvertPath),
    /// A contact was deleted.
    ContactDeleted(PublicKey),
    /// Message queued for transmission; carries the ack correlation tag.
    MessageSent(MessageSent),
    /// Private message received.
    ContactMessage(Box<ContactMessage>),
    /// Channel message received.
    ChannelMessage(Box<ChannelMessage>),
    /// Sign operation started; maximum data length follows.
    SignStart { max_length: u32 },
    /// Signature received.
    Signature(Vec<u8>),
    /// Private key received (64 bytes: seed + public key).
    PrivateKey([u8; 64]),

    // ---- pushes ----
    /// Login accepted by a room server.
    LoginSuccess(LoginInfo),
    /// Login rejected by a room server.
    LoginFailed { server_prefix: KeyPrefix },
    /// Advertisement received (bare public key).
    Advertisement(PublicKey),
    /// New contact advertisement received (full contact record).
    NewContact(Box<Contact>),
    /// Path update notification.
    PathUpdate(PublicKey),
    /// Ack received.
    Ack(Acknowledgement),
    /// Messages are waiting on the device.
    MessagesWaiting,
    /// Raw application data received.
    RawData { snr: f32, rssi: i8, payload: Bytes },
    /// Raw RX packet log entry.
    RxLogData { snr: f32, rssi: i8, payload: Bytes },
    /// Remote status response.
    StatusResponse(Box<DeviceStatus>),
    /// Telemetry response (self or remote).
    Telemetry {
        pubkey_prefix: KeyPrefix,
        telemetry: Telemetry,
    },
    /// Binary response whose tag matched no pending request, or whose
    /// request type has no specialized decoder.
    BinaryResponse {
        request_type: u8,
        tag: u32,
        payload: Bytes,
    },
    /// Access control list recovered from a binary response.
    Acl {
        pubkey_prefix: KeyPrefix,
        entries: Vec<AclEntry>,
    },
    /// Min/max/average telemetry recovered from a binary response.
    Mma {
        pubkey_prefix: KeyPrefix,
        records: Vec<MmaRecord>,
    },
    /// Neighbour table recovered from a binary response.
    Neighbours {
        pubkey_prefix: KeyPrefix,
        table: NeighbourTable,
    },
    /// Path discovery response.
    PathDiscoveryResponse(PathDiscovery),
    /// Trace data received.
    TraceData(TraceData),
    /// Control data received.
    ControlData(ControlData),

    // ---- diagnostics ----
    /// A frame failed to parse; carries the raw bytes and the reason.
    ParseFailure { data: Bytes, reason: String },
    /// A slow subscriber missed `count` events; ordering of the delivered
    /// subset is preserved.
    EventsLost { count: u64 },
}

impl Event {
    /// Returns the wire response code this event was parsed from, if any.
    #[must_use]
    pub fn response_code(&self) -> Option<ResponseCode> {
        match self {
            Self::Ok { .. } => Some(ResponseCode::Ok),
            Self::Error { .. } => Some(ResponseCode::Error),
            Self::Disabled => Some(ResponseCode::Disabled),
            Self::NoMoreMessages => Some(ResponseCode::NoMoreMsgs),
            Self::CurrentTime(_) => Some(ResponseCode::CurrentTime),
            Self::SelfInfo(_) => Some(ResponseCode::SelfInfo),
            Self::DeviceInfo(_) => Some(ResponseCode::DeviceInfo),
            Self::Battery(_) => Some(ResponseCode::Battery),
            Self::Stats(_) => Some(ResponseCode::Stats),
            Self::CustomVars(_) => Some(ResponseCode::CustomVars),
            Self::TuningParams(_) => Some(ResponseCode::TuningParams),
            Self::ChannelInfo(_) => Some(ResponseCode::ChannelInfo),
            Self::ContactsStart { .. } => Some(ResponseCode::ContactsStart),
            Self::Contact(_) => Some(ResponseCode::Contact),
            Self::ContactsEnd { .. } => Some(ResponseCode::ContactsEnd),
            Self::ContactUri(_) => Some(ResponseCode::ContactUri),
            Self::AdvertPath(_) => Some(ResponseCode::AdvertPath),
            Self::ContactDeleted(_) => Some(ResponseCode::ContactDeleted),
            Self::MessageSent(_) => Some(ResponseCode::MsgSent),
            Self::ContactMessage(msg) => {
                if msg.signal.is_some() {
                    Some(ResponseCode::ContactMsgRecvV3)
                } else {
                    Some(ResponseCode::ContactMsgRecv)
                }
            }
            Self::ChannelMessage(msg) => {
                if msg.signal.is_some() {
                    Some(ResponseCode::ChannelMsgRecvV3)
                } else {
                    Some(ResponseCode::ChannelMsgRecv)
                }
            }
            Self::SignStart { .. } => Some(ResponseCode::SignStart),
            Self::Signature(_) => Some(ResponseCode::Signature),
            Self::PrivateKey(_) => Some(ResponseCode::PrivateKey),
            Self::LoginSuccess(_) => Some(ResponseCode::LoginSuccess),
            Self::LoginFailed { .. } => Some(ResponseCode::LoginFailed),
            Self::Advertisement(_) => Some(ResponseCode::Advertisement),
            Self::NewContact(_) => Some(ResponseCode::NewContact),
            Self::PathUpdate(_) => Some(ResponseCode::PathUpdate),
            Self::Ack(_) => Some(ResponseCode::Ack),
            Self::MessagesWaiting => Some(ResponseCode::MessagesWaiting),
            Self::RawData { .. } => Some(ResponseCode::RawData),
            Self::RxLogData { .. } => Some(ResponseCode::RxLogData),
            Self::StatusResponse(_) => Some(ResponseCode::StatusResponse),
            Self::Telemetry { .. } => Some(ResponseCode::TelemetryResponse),
            Self::BinaryResponse { .. }
            | Self::Acl { .. }
            | Self::Mma { .. }
            | Self::Neighbours { .. } => Some(ResponseCode::BinaryResponse),
            Self::PathDiscoveryResponse(_) => Some(ResponseCode::PathDiscoveryResponse),
            Self::TraceData(_) => Some(ResponseCode::TraceData),
            Self::ControlData(_) => Some(ResponseCode::ControlData),
            Self::ConnectionState(_) | Self::ParseFailure { .. } | Self::EventsLost { .. } => None,
        }
    }

    /// Returns true for unsolicited push events.
    #[must_use]
    pub fn is_push(&self) -> bool {
        self.response_code().is_some_and(|code| code.is_push())
    }
}

/// A subscription to the session's push and lifecycle events.
///
/// Backed by a bounded broadcast queue; when a subscriber falls behind, the
/// oldest events are dropped and the gap surfaces as
/// [`Event::EventsLost`].
pub struct EventStream {
    receiver: broadcast::Receiver<Event>,
}

impl EventStream {
    pub(crate) fn new(receiver: broadcast::Receiver<Event>) -> Self {
        Self { receiver }
    }

    /// Receives the next event.
    ///
    /// Returns `None` once the session has disconnected and the queue has
    /// drained.
    pub async fn recv(&mut self) -> Option<Event> {
        match self.receiver.recv().await {
            Ok(event) => Some(event),
            Err(broadcast::error::RecvError::Lagged(count)) => Some(Event::EventsLost { count }),
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }

    /// Returns the next already-buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<Event> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(broadcast::error::TryRecvError::Lagged(count)) => {
                Some(Event::EventsLost { count })
            }
            Err(
                broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed,
            ) => None,
        }
    }
}
