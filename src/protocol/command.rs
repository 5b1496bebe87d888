//! Command opcodes for the `MeshCore` companion protocol.
//!
//! Commands are sent to the radio to perform actions or request data.
//! Each command starts with an opcode byte, optionally followed by parameters.

/// Command opcodes sent to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandOpcode {
    /// Initialize the session, returns self info.
    AppStart = 0x01,
    /// Send a private message or remote command (followed by subtype).
    SendMessage = 0x02,
    /// Send a channel message.
    SendChannelMsg = 0x03,
    /// Get contact list.
    GetContacts = 0x04,
    /// Get current device time.
    GetTime = 0x05,
    /// Set device time.
    SetTime = 0x06,
    /// Send advertisement.
    SendAdvert = 0x07,
    /// Set device name.
    SetName = 0x08,
    /// Add or update a contact.
    UpdateContact = 0x09,
    /// Get next waiting message.
    GetMessage = 0x0A,
    /// Set radio parameters.
    SetRadio = 0x0B,
    /// Set TX power.
    SetTxPower = 0x0C,
    /// Reset path for a contact.
    ResetPath = 0x0D,
    /// Set device coordinates.
    SetCoords = 0x0E,
    /// Remove a contact.
    RemoveContact = 0x0F,
    /// Share contact (generate URI).
    ShareContact = 0x10,
    /// Export contact.
    ExportContact = 0x11,
    /// Import contact.
    ImportContact = 0x12,
    /// Reboot device (guarded).
    Reboot = 0x13,
    /// Get battery status.
    GetBattery = 0x14,
    /// Set tuning parameters.
    SetTuning = 0x15,
    /// Query device info.
    DeviceQuery = 0x16,
    /// Export private key.
    ExportPrivateKey = 0x17,
    /// Import private key.
    ImportPrivateKey = 0x18,
    /// Send login request to a room server.
    SendLogin = 0x1A,
    /// Send status request.
    SendStatusReq = 0x1B,
    /// Check connection to a node.
    HasConnection = 0x1C,
    /// Send logout.
    SendLogout = 0x1D,
    /// Get a single contact by key.
    GetContactByKey = 0x1E,
    /// Get channel info.
    GetChannel = 0x1F,
    /// Set channel.
    SetChannel = 0x20,
    /// Start signature.
    SignStart = 0x21,
    /// Sign data chunk.
    SignData = 0x22,
    /// Finish signature.
    SignFinish = 0x23,
    /// Send trace path request.
    SendTrace = 0x24,
    /// Set device PIN.
    SetDevicePin = 0x25,
    /// Set other parameters (`manual_add`, telemetry modes, etc.).
    SetOtherParams = 0x26,
    /// Get telemetry (self or remote).
    GetTelemetry = 0x27,
    /// Get custom variables.
    GetCustomVars = 0x28,
    /// Set custom variable.
    SetCustomVar = 0x29,
    /// Get advertisement path for a contact.
    GetAdvertPath = 0x2A,
    /// Get tuning parameters.
    GetTuningParams = 0x2B,
    /// Binary request.
    BinaryReq = 0x32,
    /// Factory reset (guarded).
    FactoryReset = 0x33,
    /// Path discovery.
    PathDiscovery = 0x34,
    /// Set flood scope.
    SetFloodScope = 0x36,
    /// Send control data.
    SendControlData = 0x37,
    /// Get statistics.
    GetStats = 0x38,
    /// Set auto-add configuration.
    SetAutoAddConfig = 0x3A,
    /// Get auto-add configuration.
    GetAutoAddConfig = 0x3B,
}

impl From<CommandOpcode> for u8 {
    fn from(cmd: CommandOpcode) -> Self {
        cmd as Self
    }
}

/// Message send subtypes (used with the `SendMessage` command).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    /// Private text message to a contact.
    Text = 0x00,
    /// Structured command to a contact.
    Command = 0x01,
}

impl From<MessageKind> for u8 {
    fn from(msg: MessageKind) -> Self {
        msg as Self
    }
}

/// Binary request types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BinaryReqType {
    /// Request device status.
    Status = 0x01,
    /// Keep-alive ping/heartbeat.
    KeepAlive = 0x02,
    /// Request telemetry data (Cayenne LPP format).
    Telemetry = 0x03,
    /// Request min/max/avg measurements.
    Mma = 0x04,
    /// Request access control list.
    Acl = 0x05,
    /// Request neighbours list.
    Neighbours = 0x06,
}

impl BinaryReqType {
    /// Returns true if this request type expects a response.
    #[must_use]
    pub const fn expects_response(&self) -> bool {
        !matches!(self, Self::KeepAlive)
    }

    /// Maps a raw byte back to a request type.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Status),
            0x02 => Some(Self::KeepAlive),
            0x03 => Some(Self::Telemetry),
            0x04 => Some(Self::Mma),
            0x05 => Some(Self::Acl),
            0x06 => Some(Self::Neighbours),
            _ => None,
        }
    }
}

impl From<BinaryReqType> for u8 {
    fn from(req: BinaryReqType) -> Self {
        req as Self
    }
}

/// Statistics types for the `GetStats` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StatsType {
    /// Core statistics (battery, uptime, errors, queue).
    Core = 0x00,
    /// Radio statistics (noise floor, RSSI, airtime).
    Radio = 0x01,
    /// Packet statistics (sent/received counts).
    Packets = 0x02,
}

impl StatsType {
    /// Parses a stats type from a byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Core),
            0x01 => Some(Self::Radio),
            0x02 => Some(Self::Packets),
            _ => None,
        }
    }
}

impl From<StatsType> for u8 {
    fn from(stats: StatsType) -> Self {
        stats as Self
    }
}

/// Control data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ControlDataType {
    /// Node discovery request.
    NodeDiscoverReq = 0x80,
}

impl From<ControlDataType> for u8 {
    fn from(ctrl: ControlDataType) -> Self {
        ctrl as Self
    }
}
