//! Command frame construction.
//!
//! Each function returns the exact byte sequence for one command:
//! `[opcode][payload]`. Builders are total — oversized variable-length
//! fields are truncated to their declared maximum and short fixed-width
//! fields are zero-padded.

use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::command::{BinaryReqType, CommandOpcode, MessageKind, StatsType};
use crate::types::contact::{Contact, MAX_NAME_LEN, MAX_PATH_LEN, PublicKey};
use crate::types::device::{AutoAddConfig, TelemetryModes};

/// Coordinate scaling factor (degrees are stored as microdegrees).
const COORD_SCALE: f64 = 1_000_000.0;

/// Maximum client identifier length in the start handshake.
pub const MAX_CLIENT_ID_LEN: usize = 5;

/// Channel secret length.
pub const CHANNEL_SECRET_LEN: usize = 16;

fn encode_coord(value: Option<f64>) -> i32 {
    value.map_or(0, |v| (v * COORD_SCALE).round() as i32)
}

/// Writes a string as a fixed-width field: truncated to `width` bytes and
/// zero-padded.
fn put_fixed_str(buf: &mut BytesMut, s: &str, width: usize) {
    let bytes = s.as_bytes();
    let len = bytes.len().min(width);
    buf.put_slice(&bytes[..len]);
    buf.put_bytes(0, width - len);
}

/// Start handshake: protocol marker, six reserved spaces, then up to five
/// bytes of client identifier.
#[must_use]
pub fn app_start(client_id: &str) -> Bytes {
    let id = client_id.as_bytes();
    let id_len = id.len().min(MAX_CLIENT_ID_LEN);

    let mut buf = BytesMut::with_capacity(8 + id_len);
    buf.put_u8(CommandOpcode::AppStart as u8);
    buf.put_u8(0x03);
    buf.put_bytes(b' ', 6);
    buf.put_slice(&id[..id_len]);
    buf.freeze()
}

/// Private text message to the first six key bytes of `destination`.
#[must_use]
pub fn send_message(destination: &PublicKey, text: &str, attempt: u8, timestamp: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(14 + text.len());
    buf.put_u8(CommandOpcode::SendMessage as u8);
    buf.put_u8(MessageKind::Text as u8);
    buf.put_u8(attempt);
    buf.put_u32_le(timestamp);
    buf.put_slice(destination.prefix().as_bytes());
    buf.put_slice(text.as_bytes());
    buf.freeze()
}

/// Structured command to a contact; shares the opcode with text messages,
/// distinguished by the subtype byte.
#[must_use]
pub fn send_command(destination: &PublicKey, command: &str, timestamp: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(14 + command.len());
    buf.put_u8(CommandOpcode::SendMessage as u8);
    buf.put_u8(MessageKind::Command as u8);
    buf.put_u8(0x00);
    buf.put_u32_le(timestamp);
    buf.put_slice(destination.prefix().as_bytes());
    buf.put_slice(command.as_bytes());
    buf.freeze()
}

/// Channel broadcast message.
#[must_use]
pub fn send_channel_message(channel: u8, text: &str, timestamp: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(8 + text.len());
    buf.put_u8(CommandOpcode::SendChannelMsg as u8);
    buf.put_u8(0x00);
    buf.put_u8(channel);
    buf.put_u32_le(timestamp);
    buf.put_slice(text.as_bytes());
    buf.freeze()
}

/// Contact list request, optionally restricted to contacts modified after
/// `since`.
#[must_use]
pub fn get_contacts(since: Option<u32>) -> Bytes {
    match since {
        Some(ts) => {
            let mut buf = BytesMut::with_capacity(5);
            buf.put_u8(CommandOpcode::GetContacts as u8);
            buf.put_u32_le(ts);
            buf.freeze()
        }
        None => Bytes::from_static(&[CommandOpcode::GetContacts as u8]),
    }
}

#[must_use]
pub fn get_time() -> Bytes {
    Bytes::from_static(&[CommandOpcode::GetTime as u8])
}

#[must_use]
pub fn set_time(timestamp: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(5);
    buf.put_u8(CommandOpcode::SetTime as u8);
    buf.put_u32_le(timestamp);
    buf.freeze()
}

/// Advertisement, optionally flooded.
#[must_use]
pub fn send_advert(flood: bool) -> Bytes {
    if flood {
        Bytes::from_static(&[CommandOpcode::SendAdvert as u8, 0x01])
    } else {
        Bytes::from_static(&[CommandOpcode::SendAdvert as u8])
    }
}

#[must_use]
pub fn set_name(name: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(1 + name.len());
    buf.put_u8(CommandOpcode::SetName as u8);
    buf.put_slice(name.as_bytes());
    buf.freeze()
}

/// Serializes the full 147-byte contact record.
#[must_use]
pub fn update_contact(contact: &Contact) -> Bytes {
    let mut buf = BytesMut::with_capacity(148);
    buf.put_u8(CommandOpcode::UpdateContact as u8);
    buf.put_slice(contact.public_key.as_bytes());
    buf.put_u8(contact.device_type as u8);
    buf.put_u8(contact.flags.as_byte());
    buf.put_i8(contact.out_path_len);

    let path_len = contact.out_path.len().min(MAX_PATH_LEN);
    buf.put_slice(&contact.out_path[..path_len]);
    buf.put_bytes(0, MAX_PATH_LEN - path_len);

    put_fixed_str(&mut buf, &contact.name, MAX_NAME_LEN);

    buf.put_u32_le(contact.last_advert);
    buf.put_i32_le(encode_coord(contact.latitude));
    buf.put_i32_le(encode_coord(contact.longitude));
    buf.put_u32_le(contact.last_modified);
    buf.freeze()
}

#[must_use]
pub fn get_message() -> Bytes {
    Bytes::from_static(&[CommandOpcode::GetMessage as u8])
}

/// Radio parameters: frequency in kHz, bandwidth in Hz, spreading factor,
/// coding rate.
#[must_use]
pub fn set_radio(freq_khz: u32, bw_hz: u32, sf: u8, cr: u8) -> Bytes {
    let mut buf = BytesMut::with_capacity(11);
    buf.put_u8(CommandOpcode::SetRadio as u8);
    buf.put_u32_le(freq_khz);
    buf.put_u32_le(bw_hz);
    buf.put_u8(sf);
    buf.put_u8(cr);
    buf.freeze()
}

#[must_use]
pub fn set_tx_power(dbm: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(5);
    buf.put_u8(CommandOpcode::SetTxPower as u8);
    buf.put_u32_le(dbm);
    buf.freeze()
}

#[must_use]
pub fn reset_path(public_key: &PublicKey) -> Bytes {
    key_command(CommandOpcode::ResetPath, public_key)
}

/// Device coordinates in degrees, scaled to microdegrees, with a four-byte
/// altitude placeholder.
#[must_use]
pub fn set_coords(latitude: f64, longitude: f64) -> Bytes {
    let mut buf = BytesMut::with_capacity(13);
    buf.put_u8(CommandOpcode::SetCoords as u8);
    buf.put_i32_le((latitude * COORD_SCALE).round() as i32);
    buf.put_i32_le((longitude * COORD_SCALE).round() as i32);
    buf.put_bytes(0, 4);
    buf.freeze()
}

#[must_use]
pub fn remove_contact(public_key: &PublicKey) -> Bytes {
    key_command(CommandOpcode::RemoveContact, public_key)
}

#[must_use]
pub fn share_contact(public_key: &PublicKey) -> Bytes {
    key_command(CommandOpcode::ShareContact, public_key)
}

/// Contact export; exports self when no key is given.
#[must_use]
pub fn export_contact(public_key: Option<&PublicKey>) -> Bytes {
    match public_key {
        Some(key) => key_command(CommandOpcode::ExportContact, key),
        None => Bytes::from_static(&[CommandOpcode::ExportContact as u8]),
    }
}

#[must_use]
pub fn import_contact(card_data: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(1 + card_data.len());
    buf.put_u8(CommandOpcode::ImportContact as u8);
    buf.put_slice(card_data);
    buf.freeze()
}

/// Reboot, guarded by a fixed confirmation string.
#[must_use]
pub fn reboot() -> Bytes {
    Bytes::from_static(b"\x13reboot")
}

/// Factory reset, guarded by a fixed confirmation string.
#[must_use]
pub fn factory_reset() -> Bytes {
    Bytes::from_static(b"\x33reset")
}

#[must_use]
pub fn get_battery() -> Bytes {
    Bytes::from_static(&[CommandOpcode::GetBattery as u8])
}

/// Tuning parameters with two reserved trailing bytes.
#[must_use]
pub fn set_tuning(rx_delay: u32, airtime_factor: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(11);
    buf.put_u8(CommandOpcode::SetTuning as u8);
    buf.put_u32_le(rx_delay);
    buf.put_u32_le(airtime_factor);
    buf.put_bytes(0, 2);
    buf.freeze()
}

#[must_use]
pub fn get_tuning_params() -> Bytes {
    Bytes::from_static(&[CommandOpcode::GetTuningParams as u8])
}

/// Device query; sub-type 0x03 requests full info.
#[must_use]
pub fn device_query() -> Bytes {
    Bytes::from_static(&[CommandOpcode::DeviceQuery as u8, 0x03])
}

#[must_use]
pub fn export_private_key() -> Bytes {
    Bytes::from_static(&[CommandOpcode::ExportPrivateKey as u8])
}

#[must_use]
pub fn import_private_key(key: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(1 + key.len());
    buf.put_u8(CommandOpcode::ImportPrivateKey as u8);
    buf.put_slice(key);
    buf.freeze()
}

/// Room-server login with the full destination key and a UTF-8 password.
#[must_use]
pub fn send_login(destination: &PublicKey, password: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(33 + password.len());
    buf.put_u8(CommandOpcode::SendLogin as u8);
    buf.put_slice(destination.as_bytes());
    buf.put_slice(password.as_bytes());
    buf.freeze()
}

#[must_use]
pub fn send_logout(destination: &PublicKey) -> Bytes {
    key_command(CommandOpcode::SendLogout, destination)
}

#[must_use]
pub fn send_status_request(destination: &PublicKey) -> Bytes {
    key_command(CommandOpcode::SendStatusReq, destination)
}

#[must_use]
pub fn has_connection(destination: &PublicKey) -> Bytes {
    key_command(CommandOpcode::HasConnection, destination)
}

#[must_use]
pub fn get_contact_by_key(public_key: &PublicKey) -> Bytes {
    key_command(CommandOpcode::GetContactByKey, public_key)
}

#[must_use]
pub fn get_channel(index: u8) -> Bytes {
    Bytes::from(vec![CommandOpcode::GetChannel as u8, index])
}

/// Channel configuration: 32-byte zero-padded name, secret clamped to 16
/// bytes (zero-padded when shorter).
#[must_use]
pub fn set_channel(index: u8, name: &str, secret: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(50);
    buf.put_u8(CommandOpcode::SetChannel as u8);
    buf.put_u8(index);
    put_fixed_str(&mut buf, name, MAX_NAME_LEN);

    let secret_len = secret.len().min(CHANNEL_SECRET_LEN);
    buf.put_slice(&secret[..secret_len]);
    buf.put_bytes(0, CHANNEL_SECRET_LEN - secret_len);
    buf.freeze()
}

#[must_use]
pub fn sign_start() -> Bytes {
    Bytes::from_static(&[CommandOpcode::SignStart as u8])
}

#[must_use]
pub fn sign_data(chunk: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(1 + chunk.len());
    buf.put_u8(CommandOpcode::SignData as u8);
    buf.put_slice(chunk);
    buf.freeze()
}

#[must_use]
pub fn sign_finish() -> Bytes {
    Bytes::from_static(&[CommandOpcode::SignFinish as u8])
}

/// Trace request along an optional explicit repeater path.
#[must_use]
pub fn send_trace(tag: u32, auth_code: u32, flags: u8, path: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(10 + path.len());
    buf.put_u8(CommandOpcode::SendTrace as u8);
    buf.put_u32_le(tag);
    buf.put_u32_le(auth_code);
    buf.put_u8(flags);
    buf.put_slice(path);
    buf.freeze()
}

#[must_use]
pub fn set_device_pin(pin: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(5);
    buf.put_u8(CommandOpcode::SetDevicePin as u8);
    buf.put_u32_le(pin);
    buf.freeze()
}

/// Miscellaneous parameters. The telemetry permission triple is packed into
/// a single byte; the multi-ack byte is appended only when supplied.
#[must_use]
pub fn set_other_params(
    manual_add_contacts: bool,
    telemetry_modes: TelemetryModes,
    advert_loc_policy: u8,
    multi_acks: Option<u8>,
) -> Bytes {
    let mut buf = BytesMut::with_capacity(5);
    buf.put_u8(CommandOpcode::SetOtherParams as u8);
    buf.put_u8(u8::from(manual_add_contacts));
    buf.put_u8(telemetry_modes.to_byte());
    buf.put_u8(advert_loc_policy);
    if let Some(acks) = multi_acks {
        buf.put_u8(acks);
    }
    buf.freeze()
}

/// Telemetry request: three reserved bytes, then an optional remote key
/// (self telemetry when omitted).
#[must_use]
pub fn get_telemetry(destination: Option<&PublicKey>) -> Bytes {
    let mut buf = BytesMut::with_capacity(36);
    buf.put_u8(CommandOpcode::GetTelemetry as u8);
    buf.put_bytes(0, 3);
    if let Some(key) = destination {
        buf.put_slice(key.as_bytes());
    }
    buf.freeze()
}

#[must_use]
pub fn get_custom_vars() -> Bytes {
    Bytes::from_static(&[CommandOpcode::GetCustomVars as u8])
}

/// Custom variable assignment as a `key:value` string.
#[must_use]
pub fn set_custom_var(key: &str, value: &str) -> Bytes {
    let kv = format!("{key}:{value}");
    let mut buf = BytesMut::with_capacity(1 + kv.len());
    buf.put_u8(CommandOpcode::SetCustomVar as u8);
    buf.put_slice(kv.as_bytes());
    buf.freeze()
}

/// Advertisement path request: reserved byte, then the contact key.
#[must_use]
pub fn get_advert_path(public_key: &PublicKey) -> Bytes {
    let mut buf = BytesMut::with_capacity(34);
    buf.put_u8(CommandOpcode::GetAdvertPath as u8);
    buf.put_u8(0x00);
    buf.put_slice(public_key.as_bytes());
    buf.freeze()
}

/// Binary request towards a remote node.
#[must_use]
pub fn binary_request(
    destination: &PublicKey,
    request_type: BinaryReqType,
    payload: &[u8],
) -> Bytes {
    let mut buf = BytesMut::with_capacity(34 + payload.len());
    buf.put_u8(CommandOpcode::BinaryReq as u8);
    buf.put_slice(destination.as_bytes());
    buf.put_u8(request_type as u8);
    buf.put_slice(payload);
    buf.freeze()
}

/// Path discovery request: reserved byte, then the target key.
#[must_use]
pub fn path_discovery(destination: &PublicKey) -> Bytes {
    let mut buf = BytesMut::with_capacity(34);
    buf.put_u8(CommandOpcode::PathDiscovery as u8);
    buf.put_u8(0x00);
    buf.put_slice(destination.as_bytes());
    buf.freeze()
}

/// Flood scope: reserved byte, then a 16-byte scope key (all zeros clears
/// the scope).
#[must_use]
pub fn set_flood_scope(scope_key: &[u8; 16]) -> Bytes {
    let mut buf = BytesMut::with_capacity(18);
    buf.put_u8(CommandOpcode::SetFloodScope as u8);
    buf.put_u8(0x00);
    buf.put_slice(scope_key);
    buf.freeze()
}

/// Raw control data frame.
#[must_use]
pub fn send_control_data(control_type: u8, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(2 + payload.len());
    buf.put_u8(CommandOpcode::SendControlData as u8);
    buf.put_u8(control_type);
    buf.put_slice(payload);
    buf.freeze()
}

#[must_use]
pub fn get_stats(stats_type: StatsType) -> Bytes {
    Bytes::from(vec![CommandOpcode::GetStats as u8, stats_type as u8])
}

#[must_use]
pub fn set_auto_add_config(config: AutoAddConfig) -> Bytes {
    Bytes::from(vec![
        CommandOpcode::SetAutoAddConfig as u8,
        config.as_byte(),
    ])
}

#[must_use]
pub fn get_auto_add_config() -> Bytes {
    Bytes::from_static(&[CommandOpcode::GetAutoAddConfig as u8])
}

fn key_command(opcode: CommandOpcode, public_key: &PublicKey) -> Bytes {
    let mut buf = BytesMut::with_capacity(33);
    buf.put_u8(opcode as u8);
    buf.put_slice(public_key.as_bytes());
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::contact::{ContactFlags, ContactType};

    fn key(fill: u8) -> PublicKey {
        PublicKey::new([fill; 32])
    }

    #[test]
    fn test_app_start_layout() {
        let frame = app_start("MCore");
        assert_eq!(
            frame.as_ref(),
            &[
                0x01, 0x03, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, b'M', b'C', b'o', b'r', b'e'
            ]
        );
    }

    #[test]
    fn test_app_start_truncates_client_id() {
        let frame = app_start("toolongid");
        assert_eq!(frame.len(), 13);
        assert_eq!(&frame[8..], b"toolo");
    }

    #[test]
    fn test_send_message_layout() {
        let mut key_bytes = [0u8; 32];
        key_bytes[..6].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]);
        let dest = PublicKey::new(key_bytes);

        let frame = send_message(&dest, "hi", 0, 1_700_000_000);
        assert_eq!(frame[0], 0x02);
        assert_eq!(frame[1], 0x00); // text
        assert_eq!(frame[2], 0x00); // attempt
        assert_eq!(&frame[3..7], &1_700_000_000u32.to_le_bytes());
        assert_eq!(&frame[7..13], &[0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]);
        assert_eq!(&frame[13..], b"hi");
    }

    #[test]
    fn test_send_command_subtype() {
        let frame = send_command(&key(0xAA), "status", 42);
        assert_eq!(frame[0], 0x02);
        assert_eq!(frame[1], 0x01); // command subtype
        assert_eq!(frame[2], 0x00); // reserved attempt slot
    }

    #[test]
    fn test_send_channel_message_layout() {
        let frame = send_channel_message(2, "Hello", 1_234_567_890);
        assert_eq!(frame[0], 0x03);
        assert_eq!(frame[1], 0x00);
        assert_eq!(frame[2], 2);
        assert_eq!(&frame[3..7], &1_234_567_890u32.to_le_bytes());
        assert_eq!(&frame[7..], b"Hello");
    }

    #[test]
    fn test_update_contact_record() {
        let contact = Contact {
            public_key: key(0xAA),
            device_type: ContactType::Chat,
            flags: ContactFlags::default(),
            out_path_len: -1,
            out_path: bytes::Bytes::new(),
            name: "Alice".into(),
            last_advert: 1_700_000_000,
            latitude: Some(37.7749),
            longitude: Some(-122.4194),
            last_modified: 1_700_000_001,
        };

        let frame = update_contact(&contact);
        assert_eq!(frame.len(), 148);
        assert_eq!(frame[0], 0x09);
        assert_eq!(&frame[1..33], &[0xAA; 32]);
        assert_eq!(frame[33], 1); // type
        assert_eq!(frame[34], 0); // flags
        assert_eq!(frame[35] as i8, -1); // flood
        assert_eq!(&frame[36..100], &[0u8; 64]); // path buffer
        assert_eq!(&frame[100..105], b"Alice");
        assert_eq!(&frame[105..132], &[0u8; 27]); // name padding
        assert_eq!(&frame[132..136], &1_700_000_000u32.to_le_bytes());
        assert_eq!(&frame[136..140], &37_774_900i32.to_le_bytes());
        assert_eq!(&frame[140..144], &(-122_419_400i32).to_le_bytes());
        assert_eq!(&frame[144..148], &1_700_000_001u32.to_le_bytes());
    }

    #[test]
    fn test_update_contact_truncates_name_and_path() {
        let contact = Contact {
            public_key: key(0x01),
            device_type: ContactType::Repeater,
            flags: ContactFlags::default(),
            out_path_len: 2,
            out_path: bytes::Bytes::from(vec![0x11; 100]),
            name: "x".repeat(50),
            last_advert: 0,
            latitude: None,
            longitude: None,
            last_modified: 0,
        };

        let frame = update_contact(&contact);
        assert_eq!(frame.len(), 148);
        assert_eq!(&frame[36..100], &[0x11; 64][..]);
        assert_eq!(&frame[100..132], "x".repeat(32).as_bytes());
    }

    #[test]
    fn test_set_coords_altitude_placeholder() {
        let frame = set_coords(51.5, -1.278);
        assert_eq!(frame[0], 0x0E);
        assert_eq!(&frame[1..5], &51_500_000i32.to_le_bytes());
        assert_eq!(&frame[5..9], &(-1_278_000i32).to_le_bytes());
        assert_eq!(&frame[9..13], &[0u8; 4]);
    }

    #[test]
    fn test_guarded_commands() {
        assert_eq!(reboot().as_ref(), b"\x13reboot");
        assert_eq!(factory_reset().as_ref(), b"\x33reset");
    }

    #[test]
    fn test_set_channel_padding_and_truncation() {
        let frame = set_channel(1, "Public", &[0xAB; 20]);
        assert_eq!(frame.len(), 50);
        assert_eq!(frame[0], 0x20);
        assert_eq!(frame[1], 1);
        assert_eq!(&frame[2..8], b"Public");
        assert_eq!(&frame[8..34], &[0u8; 26]);
        assert_eq!(&frame[34..50], &[0xAB; 16]);
    }

    #[test]
    fn test_set_channel_short_secret_padded() {
        let frame = set_channel(0, "", &[0x01, 0x02]);
        assert_eq!(frame.len(), 50);
        assert_eq!(&frame[34..36], &[0x01, 0x02]);
        assert_eq!(&frame[36..50], &[0u8; 14]);
    }

    #[test]
    fn test_set_other_params_packing() {
        let modes = TelemetryModes {
            env: 0b10,
            loc: 0b01,
            base: 0b11,
        };
        let frame = set_other_params(true, modes, 1, None);
        assert_eq!(frame.as_ref(), &[0x26, 0x01, 0b0010_0111, 0x01]);

        let frame = set_other_params(false, modes, 0, Some(2));
        assert_eq!(frame.as_ref(), &[0x26, 0x00, 0b0010_0111, 0x00, 0x02]);
    }

    #[test]
    fn test_get_telemetry_forms() {
        assert_eq!(get_telemetry(None).as_ref(), &[0x27, 0x00, 0x00, 0x00]);

        let frame = get_telemetry(Some(&key(0x7F)));
        assert_eq!(frame.len(), 36);
        assert_eq!(&frame[..4], &[0x27, 0x00, 0x00, 0x00]);
        assert_eq!(&frame[4..], &[0x7F; 32]);
    }

    #[test]
    fn test_binary_request_layout() {
        let frame = binary_request(&key(0x55), BinaryReqType::Status, &[0xAA, 0xBB]);
        assert_eq!(frame[0], 0x32);
        assert_eq!(&frame[1..33], &[0x55; 32]);
        assert_eq!(frame[33], 0x01);
        assert_eq!(&frame[34..], &[0xAA, 0xBB]);
    }

    #[test]
    fn test_send_trace_layout() {
        let frame = send_trace(42, 99, 0x01, &[0x11, 0x22]);
        assert_eq!(frame[0], 0x24);
        assert_eq!(&frame[1..5], &42u32.to_le_bytes());
        assert_eq!(&frame[5..9], &99u32.to_le_bytes());
        assert_eq!(frame[9], 0x01);
        assert_eq!(&frame[10..], &[0x11, 0x22]);
    }

    #[test]
    fn test_path_discovery_and_flood_scope() {
        let frame = path_discovery(&key(0x42));
        assert_eq!(frame[0], 0x34);
        assert_eq!(frame[1], 0x00);
        assert_eq!(&frame[2..], &[0x42; 32]);

        let frame = set_flood_scope(&[0x10; 16]);
        assert_eq!(frame[0], 0x36);
        assert_eq!(frame[1], 0x00);
        assert_eq!(&frame[2..], &[0x10; 16]);
    }

    #[test]
    fn test_get_contacts_forms() {
        assert_eq!(get_contacts(None).as_ref(), &[0x04]);
        let frame = get_contacts(Some(7));
        assert_eq!(frame[0], 0x04);
        assert_eq!(&frame[1..], &7u32.to_le_bytes());
    }

    #[test]
    fn test_set_tuning_reserved_bytes() {
        let frame = set_tuning(250, 100);
        assert_eq!(frame.len(), 11);
        assert_eq!(&frame[1..5], &250u32.to_le_bytes());
        assert_eq!(&frame[5..9], &100u32.to_le_bytes());
        assert_eq!(&frame[9..], &[0, 0]);
    }

    #[test]
    fn test_auto_add_config_commands() {
        let frame = set_auto_add_config(AutoAddConfig::from_byte(0x0A));
        assert_eq!(frame.as_ref(), &[0x3A, 0x0A]);
        assert_eq!(get_auto_add_config().as_ref(), &[0x3B]);
    }

    #[test]
    fn test_set_custom_var() {
        assert_eq!(set_custom_var("rx", "5").as_ref(), b"\x29rx:5");
    }
}
