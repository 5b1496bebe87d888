//! Response and push-notification codes.
//!
//! The first byte of every received frame is a response code. Codes below
//! 0x80 answer a command; codes at 0x80 and above are unsolicited pushes.
//! The table is closed: bytes outside it fail parsing.

/// Response codes received from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResponseCode {
    // Command responses (0x00-0x19)
    /// Command executed successfully.
    Ok = 0x00,
    /// Command failed with error.
    Error = 0x01,
    /// Start of contact list.
    ContactsStart = 0x02,
    /// Contact data.
    Contact = 0x03,
    /// End of contact list.
    ContactsEnd = 0x04,
    /// Self device information.
    SelfInfo = 0x05,
    /// Message was queued for sending (with ack tag).
    MsgSent = 0x06,
    /// Received a contact message.
    ContactMsgRecv = 0x07,
    /// Received a channel message.
    ChannelMsgRecv = 0x08,
    /// Current device time.
    CurrentTime = 0x09,
    /// No more messages available.
    NoMoreMsgs = 0x0A,
    /// Contact URI/share data.
    ContactUri = 0x0B,
    /// Battery status.
    Battery = 0x0C,
    /// Device information.
    DeviceInfo = 0x0D,
    /// Private key export.
    PrivateKey = 0x0E,
    /// Feature is disabled.
    Disabled = 0x0F,
    /// Contact message with SNR (v3).
    ContactMsgRecvV3 = 0x10,
    /// Channel message with SNR (v3).
    ChannelMsgRecvV3 = 0x11,
    /// Channel information.
    ChannelInfo = 0x12,
    /// Signature start.
    SignStart = 0x13,
    /// Signature data.
    Signature = 0x14,
    /// Custom variables.
    CustomVars = 0x15,
    /// Advertisement path for a contact.
    AdvertPath = 0x16,
    /// Tuning parameters.
    TuningParams = 0x17,
    /// Statistics response.
    Stats = 0x18,
    /// A contact was deleted (carries its key).
    ContactDeleted = 0x19,

    // Push notifications (0x80+)
    /// Advertisement from another device.
    Advertisement = 0x80,
    /// Path update notification.
    PathUpdate = 0x81,
    /// Acknowledgment received.
    Ack = 0x82,
    /// Messages are waiting.
    MessagesWaiting = 0x83,
    /// Raw data received.
    RawData = 0x84,
    /// Login successful.
    LoginSuccess = 0x85,
    /// Login failed.
    LoginFailed = 0x86,
    /// Status response.
    StatusResponse = 0x87,
    /// RX log data.
    RxLogData = 0x88,
    /// Trace data.
    TraceData = 0x89,
    /// New contact advertisement push.
    NewContact = 0x8A,
    /// Telemetry response.
    TelemetryResponse = 0x8B,
    /// Binary response.
    BinaryResponse = 0x8C,
    /// Path discovery response.
    PathDiscoveryResponse = 0x8D,
    /// Control data.
    ControlData = 0x8E,
}

/// Handler families the parser dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseCategory {
    /// Payload-free or trivially small confirmations.
    Simple,
    /// Local device state and configuration.
    Device,
    /// Contact list traffic.
    Contact,
    /// Message traffic and send confirmations.
    Message,
    /// Unsolicited pushes.
    Push,
    /// Room-server login outcomes.
    Login,
    /// Signing workflow.
    Signing,
    /// Everything else.
    Misc,
}

impl ResponseCode {
    /// Attempts to parse a response code from a byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Ok),
            0x01 => Some(Self::Error),
            0x02 => Some(Self::ContactsStart),
            0x03 => Some(Self::Contact),
            0x04 => Some(Self::ContactsEnd),
            0x05 => Some(Self::SelfInfo),
            0x06 => Some(Self::MsgSent),
            0x07 => Some(Self::ContactMsgRecv),
            0x08 => Some(Self::ChannelMsgRecv),
            0x09 => Some(Self::CurrentTime),
            0x0A => Some(Self::NoMoreMsgs),
            0x0B => Some(Self::ContactUri),
            0x0C => Some(Self::Battery),
            0x0D => Some(Self::DeviceInfo),
            0x0E => Some(Self::PrivateKey),
            0x0F => Some(Self::Disabled),
            0x10 => Some(Self::ContactMsgRecvV3),
            0x11 => Some(Self::ChannelMsgRecvV3),
            0x12 => Some(Self::ChannelInfo),
            0x13 => Some(Self::SignStart),
            0x14 => Some(Self::Signature),
            0x15 => Some(Self::CustomVars),
            0x16 => Some(Self::AdvertPath),
            0x17 => Some(Self::TuningParams),
            0x18 => Some(Self::Stats),
            0x19 => Some(Self::ContactDeleted),
            0x80 => Some(Self::Advertisement),
            0x81 => Some(Self::PathUpdate),
            0x82 => Some(Self::Ack),
            0x83 => Some(Self::MessagesWaiting),
            0x84 => Some(Self::RawData),
            0x85 => Some(Self::LoginSuccess),
            0x86 => Some(Self::LoginFailed),
            0x87 => Some(Self::StatusResponse),
            0x88 => Some(Self::RxLogData),
            0x89 => Some(Self::TraceData),
            0x8A => Some(Self::NewContact),
            0x8B => Some(Self::TelemetryResponse),
            0x8C => Some(Self::BinaryResponse),
            0x8D => Some(Self::PathDiscoveryResponse),
            0x8E => Some(Self::ControlData),
            _ => None,
        }
    }

    /// Returns true if this is a push notification (unsolicited message).
    #[must_use]
    pub const fn is_push(&self) -> bool {
        (*self as u8) >= 0x80
    }

    /// Returns true if this is a response to a command.
    #[must_use]
    pub const fn is_response(&self) -> bool {
        !self.is_push()
    }

    /// Returns the handler family for this code.
    #[must_use]
    pub const fn category(&self) -> ResponseCategory {
        match self {
            Self::Ok | Self::Error | Self::Disabled | Self::NoMoreMsgs => ResponseCategory::Simple,
            Self::SelfInfo
            | Self::DeviceInfo
            | Self::Battery
            | Self::Stats
            | Self::CustomVars
            | Self::TuningParams
            | Self::ChannelInfo => ResponseCategory::Device,
            Self::ContactsStart
            | Self::Contact
            | Self::ContactsEnd
            | Self::ContactUri
            | Self::AdvertPath
            | Self::ContactDeleted => ResponseCategory::Contact,
            Self::MsgSent
            | Self::ContactMsgRecv
            | Self::ContactMsgRecvV3
            | Self::ChannelMsgRecv
            | Self::ChannelMsgRecvV3 => ResponseCategory::Message,
            Self::LoginSuccess | Self::LoginFailed => ResponseCategory::Login,
            Self::SignStart | Self::Signature => ResponseCategory::Signing,
            Self::CurrentTime | Self::PrivateKey => ResponseCategory::Misc,
            Self::Advertisement
            | Self::PathUpdate
            | Self::Ack
            | Self::MessagesWaiting
            | Self::RawData
            | Self::StatusResponse
            | Self::RxLogData
            | Self::TraceData
            | Self::NewContact
            | Self::TelemetryResponse
            | Self::BinaryResponse
            | Self::PathDiscoveryResponse
            | Self::ControlData => ResponseCategory::Push,
        }
    }
}

impl From<ResponseCode> for u8 {
    fn from(code: ResponseCode) -> Self {
        code as Self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_code_from_byte() {
        assert_eq!(ResponseCode::from_byte(0x00), Some(ResponseCode::Ok));
        assert_eq!(
            ResponseCode::from_byte(0x19),
            Some(ResponseCode::ContactDeleted)
        );
        assert_eq!(
            ResponseCode::from_byte(0x80),
            Some(ResponseCode::Advertisement)
        );
        assert_eq!(
            ResponseCode::from_byte(0x8E),
            Some(ResponseCode::ControlData)
        );
        assert_eq!(ResponseCode::from_byte(0x1A), None);
        assert_eq!(ResponseCode::from_byte(0x8F), None);
        assert_eq!(ResponseCode::from_byte(0xFF), None);
    }

    #[test]
    fn test_is_push() {
        assert!(!ResponseCode::Ok.is_push());
        assert!(!ResponseCode::SelfInfo.is_push());
        assert!(ResponseCode::Advertisement.is_push());
        assert!(ResponseCode::Ack.is_push());
        assert!(ResponseCode::ControlData.is_push());
    }

    #[test]
    fn test_category_routing() {
        assert_eq!(ResponseCode::Ok.category(), ResponseCategory::Simple);
        assert_eq!(ResponseCode::SelfInfo.category(), ResponseCategory::Device);
        assert_eq!(ResponseCode::Contact.category(), ResponseCategory::Contact);
        assert_eq!(ResponseCode::MsgSent.category(), ResponseCategory::Message);
        assert_eq!(
            ResponseCode::LoginSuccess.category(),
            ResponseCategory::Login
        );
        assert_eq!(
            ResponseCode::SignStart.category(),
            ResponseCategory::Signing
        );
        assert_eq!(
            ResponseCode::CurrentTime.category(),
            ResponseCategory::Misc
        );
        assert_eq!(ResponseCode::Ack.category(), ResponseCategory::Push);
    }

    #[test]
    fn test_push_codes_get_push_or_login_category() {
        for byte in 0x80..=0xFFu8 {
            if let Some(code) = ResponseCode::from_byte(byte) {
                assert!(code.is_push());
                assert!(matches!(
                    code.category(),
                    ResponseCategory::Push | ResponseCategory::Login
                ));
            }
        }
    }
}
