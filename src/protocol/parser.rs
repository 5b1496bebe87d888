//! Received-frame parsing.
//!
//! [`parse_frame`] turns raw frame bytes into exactly one [`Event`] and
//! never panics: malformed input becomes [`Event::ParseFailure`] carrying
//! the original bytes and a diagnostic reason. Dispatch runs through the
//! response code's category, and every handler validates its minimum
//! length before extracting fields.

use bytes::{Buf, Bytes};

use crate::error::ProtocolError;
use crate::event::{Event, StatsData};
use crate::protocol::command::BinaryReqType;
use crate::protocol::lpp::{LppType, Telemetry};
use crate::protocol::response::{ResponseCategory, ResponseCode};
use crate::types::{
    AclEntry, Acknowledgement, AdvertPath, BatteryInfo, ChannelInfo, ChannelMessage, Contact,
    ContactFlags, ContactMessage, ContactType, ControlData, CoreStats, DeviceInfo, DeviceStatus,
    DiscoverResponse, KeyPrefix, LoginInfo, MessageSent, MmaRecord, Neighbour, NeighbourTable,
    PacketStats, PathDiscovery, Permission, PublicKey, RadioStats, SelfInfo, SignalQuality,
    StorageInfo, TextType, TraceData, TraceNode, TuningParams,
    contact::PUBLIC_KEY_PREFIX_LEN,
    device::{RadioConfig, TelemetryModes},
};

/// Coordinate scaling factor (microdegrees per degree).
const COORD_SCALE: f64 = 1_000_000.0;

/// SNR scaling factor (raw value is SNR multiplied by 4).
const SNR_SCALE: f32 = 4.0;

/// Parses one received frame into an event.
///
/// Total over all inputs: anything that does not decode yields
/// [`Event::ParseFailure`].
#[must_use]
pub fn parse_frame(frame: &[u8]) -> Event {
    match try_parse(frame) {
        Ok(event) => event,
        Err(err) => {
            tracing::warn!("dropping malformed frame: {err}");
            Event::ParseFailure {
                data: Bytes::copy_from_slice(frame),
                reason: err.to_string(),
            }
        }
    }
}

fn try_parse(frame: &[u8]) -> Result<Event, ProtocolError> {
    let Some((&first, data)) = frame.split_first() else {
        return Err(ProtocolError::Empty);
    };
    let code =
        ResponseCode::from_byte(first).ok_or(ProtocolError::UnknownResponseCode(first))?;

    match code.category() {
        ResponseCategory::Simple => parse_simple(code, data),
        ResponseCategory::Device => parse_device(code, data),
        ResponseCategory::Contact => parse_contact_category(code, data),
        ResponseCategory::Message => parse_message(code, data),
        ResponseCategory::Login => parse_login(code, data),
        ResponseCategory::Signing => parse_signing(code, data),
        ResponseCategory::Misc => parse_misc(code, data),
        ResponseCategory::Push => parse_push(code, data),
    }
}

fn require(code: ResponseCode, data: &[u8], min: usize) -> Result<(), ProtocolError> {
    if data.len() < min {
        return Err(ProtocolError::TooShort {
            code: code as u8,
            expected: min,
            actual: data.len(),
        });
    }
    Ok(())
}

/// Decodes UTF-8 with replacement characters; invalid sequences are logged
/// but never fail the frame.
fn lossy_utf8(data: &[u8], what: &str) -> String {
    if std::str::from_utf8(data).is_err() {
        tracing::warn!("invalid UTF-8 in {what}, using replacement characters");
    }
    String::from_utf8_lossy(data).into_owned()
}

/// Reads a fixed-width string field: up to the first NUL, trailing spaces
/// trimmed.
fn parse_padded_str(data: &[u8], width: usize) -> String {
    let window = &data[..width.min(data.len())];
    let end = window.iter().position(|&b| b == 0).unwrap_or(window.len());
    let s = lossy_utf8(&window[..end], "string field");
    s.trim_end_matches(' ').to_owned()
}

/// Coordinates use 0 as a "not set" sentinel; (0.0, 0.0) is not
/// representable.
fn parse_coord(value: i32) -> Option<f64> {
    if value == 0 {
        None
    } else {
        Some(f64::from(value) / COORD_SCALE)
    }
}

fn snr_from_raw(raw: i8) -> f32 {
    f32::from(raw) / SNR_SCALE
}

/// Copies a full public key out of a length-checked buffer.
fn read_key(data: &[u8]) -> PublicKey {
    let mut key = [0u8; 32];
    key.copy_from_slice(&data[..32]);
    PublicKey::new(key)
}

// ==================== category handlers ====================

fn parse_simple(code: ResponseCode, data: &[u8]) -> Result<Event, ProtocolError> {
    Ok(match code {
        ResponseCode::Ok => Event::Ok {
            data: Bytes::copy_from_slice(data),
        },
        ResponseCode::Error => Event::Error {
            code: data.first().copied(),
        },
        ResponseCode::Disabled => Event::Disabled,
        ResponseCode::NoMoreMsgs => Event::NoMoreMessages,
        _ => unreachable!("non-simple code routed to simple handler"),
    })
}

fn parse_device(code: ResponseCode, data: &[u8]) -> Result<Event, ProtocolError> {
    match code {
        ResponseCode::SelfInfo => Ok(Event::SelfInfo(Box::new(parse_self_info(data)?))),
        ResponseCode::DeviceInfo => Ok(Event::DeviceInfo(Box::new(parse_device_info(data)?))),
        ResponseCode::Battery => Ok(Event::Battery(parse_battery(data)?)),
        ResponseCode::Stats => parse_stats(data),
        ResponseCode::CustomVars => Ok(Event::CustomVars(lossy_utf8(data, "custom vars"))),
        ResponseCode::TuningParams => {
            require(code, data, 8)?;
            let mut cursor = std::io::Cursor::new(data);
            Ok(Event::TuningParams(TuningParams {
                rx_delay_base: cursor.get_u32_le(),
                airtime_factor: cursor.get_u32_le(),
            }))
        }
        ResponseCode::ChannelInfo => Ok(Event::ChannelInfo(Box::new(parse_channel_info(data)?))),
        _ => unreachable!("non-device code routed to device handler"),
    }
}

fn parse_contact_category(code: ResponseCode, data: &[u8]) -> Result<Event, ProtocolError> {
    match code {
        ResponseCode::ContactsStart => {
            require(code, data, 4)?;
            Ok(Event::ContactsStart {
                count: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            })
        }
        ResponseCode::Contact => Ok(Event::Contact(Box::new(parse_contact(data)?))),
        ResponseCode::ContactsEnd => {
            require(code, data, 4)?;
            Ok(Event::ContactsEnd {
                most_recent_lastmod: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            })
        }
        ResponseCode::ContactUri => {
            let hex = hex::encode(data);
            Ok(Event::ContactUri(format!("meshcore://{hex}")))
        }
        ResponseCode::AdvertPath => {
            require(code, data, 5)?;
            let recv_timestamp = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
            let path_len = data[4] as usize;
            require(code, data, 5 + path_len)?;
            Ok(Event::AdvertPath(AdvertPath {
                recv_timestamp,
                path: Bytes::copy_from_slice(&data[5..5 + path_len]),
            }))
        }
        ResponseCode::ContactDeleted => {
            require(code, data, 32)?;
            Ok(Event::ContactDeleted(read_key(data)))
        }
        _ => unreachable!("non-contact code routed to contact handler"),
    }
}

fn parse_message(code: ResponseCode, data: &[u8]) -> Result<Event, ProtocolError> {
    match code {
        ResponseCode::MsgSent => {
            require(code, data, 9)?;
            Ok(Event::MessageSent(MessageSent {
                is_flood: data[0] != 0,
                expected_ack: u32::from_le_bytes([data[1], data[2], data[3], data[4]]),
                suggested_timeout_ms: u32::from_le_bytes([data[5], data[6], data[7], data[8]]),
            }))
        }
        ResponseCode::ContactMsgRecv => Ok(Event::ContactMessage(Box::new(
            parse_contact_message(data, false)?,
        ))),
        ResponseCode::ContactMsgRecvV3 => Ok(Event::ContactMessage(Box::new(
            parse_contact_message(data, true)?,
        ))),
        ResponseCode::ChannelMsgRecv => Ok(Event::ChannelMessage(Box::new(
            parse_channel_message(data, false)?,
        ))),
        ResponseCode::ChannelMsgRecvV3 => Ok(Event::ChannelMessage(Box::new(
            parse_channel_message(data, true)?,
        ))),
        _ => unreachable!("non-message code routed to message handler"),
    }
}

fn parse_login(code: ResponseCode, data: &[u8]) -> Result<Event, ProtocolError> {
    match code {
        ResponseCode::LoginSuccess => Ok(Event::LoginSuccess(parse_login_success(data)?)),
        ResponseCode::LoginFailed => {
            require(code, data, 7)?;
            Ok(Event::LoginFailed {
                server_prefix: KeyPrefix::from_slice(&data[1..7]),
            })
        }
        _ => unreachable!("non-login code routed to login handler"),
    }
}

fn parse_signing(code: ResponseCode, data: &[u8]) -> Result<Event, ProtocolError> {
    match code {
        ResponseCode::SignStart => {
            require(code, data, 5)?;
            Ok(Event::SignStart {
                max_length: u32::from_le_bytes([data[1], data[2], data[3], data[4]]),
            })
        }
        ResponseCode::Signature => {
            require(code, data, 1)?;
            Ok(Event::Signature(data.to_vec()))
        }
        _ => unreachable!("non-signing code routed to signing handler"),
    }
}

fn parse_misc(code: ResponseCode, data: &[u8]) -> Result<Event, ProtocolError> {
    match code {
        ResponseCode::CurrentTime => {
            require(code, data, 4)?;
            Ok(Event::CurrentTime(u32::from_le_bytes([
                data[0], data[1], data[2], data[3],
            ])))
        }
        ResponseCode::PrivateKey => {
            require(code, data, 64)?;
            let mut key = [0u8; 64];
            key.copy_from_slice(&data[..64]);
            Ok(Event::PrivateKey(key))
        }
        _ => unreachable!("non-misc code routed to misc handler"),
    }
}

#[allow(clippy::too_many_lines)]
fn parse_push(code: ResponseCode, data: &[u8]) -> Result<Event, ProtocolError> {
    match code {
        ResponseCode::Advertisement => {
            require(code, data, 32)?;
            Ok(Event::Advertisement(read_key(data)))
        }
        ResponseCode::PathUpdate => {
            require(code, data, 32)?;
            Ok(Event::PathUpdate(read_key(data)))
        }
        ResponseCode::Ack => {
            require(code, data, 4)?;
            let round_trip_ms = if data.len() >= 8 {
                Some(u32::from_le_bytes([data[4], data[5], data[6], data[7]]))
            } else {
                None
            };
            Ok(Event::Ack(Acknowledgement {
                code: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
                round_trip_ms,
            }))
        }
        ResponseCode::MessagesWaiting => Ok(Event::MessagesWaiting),
        ResponseCode::RawData => {
            require(code, data, 3)?;
            Ok(Event::RawData {
                snr: snr_from_raw(data[0] as i8),
                rssi: data[1] as i8,
                payload: Bytes::copy_from_slice(&data[3..]),
            })
        }
        ResponseCode::RxLogData => {
            require(code, data, 2)?;
            Ok(Event::RxLogData {
                snr: snr_from_raw(data[0] as i8),
                rssi: data[1] as i8,
                payload: Bytes::copy_from_slice(&data[2..]),
            })
        }
        ResponseCode::StatusResponse => {
            require(code, data, 58)?;
            let prefix = KeyPrefix::from_slice(&data[1..7]);
            Ok(Event::StatusResponse(Box::new(parse_status_block(
                prefix,
                &data[7..],
            )?)))
        }
        ResponseCode::TraceData => Ok(Event::TraceData(parse_trace_data(data)?)),
        ResponseCode::NewContact => Ok(Event::NewContact(Box::new(parse_contact(data)?))),
        ResponseCode::TelemetryResponse => {
            require(code, data, 7)?;
            Ok(Event::Telemetry {
                pubkey_prefix: KeyPrefix::from_slice(&data[1..7]),
                telemetry: Telemetry::from_lpp(&data[7..]),
            })
        }
        ResponseCode::BinaryResponse => {
            require(code, data, 5)?;
            Ok(Event::BinaryResponse {
                request_type: data[0],
                tag: u32::from_le_bytes([data[1], data[2], data[3], data[4]]),
                payload: Bytes::copy_from_slice(&data[5..]),
            })
        }
        ResponseCode::PathDiscoveryResponse => {
            Ok(Event::PathDiscoveryResponse(parse_path_discovery(data)?))
        }
        ResponseCode::ControlData => Ok(Event::ControlData(parse_control_data(data)?)),
        _ => unreachable!("non-push code routed to push handler"),
    }
}

// ==================== record parsers ====================

/// Parses self info.
///
/// Format:
/// ```text
/// [adv_type:1] [tx_power:1] [max_tx_power:1] [pubkey:32] [lat:4LE] [lon:4LE]
/// [multi_acks:1] [adv_loc_policy:1] [telemetry_modes:1] [manual_add:1]
/// [freq_khz:4LE] [bw_hz:4LE] [sf:1] [cr:1] [name:...]
/// ```
pub fn parse_self_info(data: &[u8]) -> Result<SelfInfo, ProtocolError> {
    require(ResponseCode::SelfInfo, data, 57)?;

    let mut cursor = std::io::Cursor::new(data);

    let advert_type = cursor.get_u8();
    let tx_power = cursor.get_u8();
    let max_tx_power = cursor.get_u8();

    let mut pubkey_bytes = [0u8; 32];
    cursor.copy_to_slice(&mut pubkey_bytes);
    let public_key = PublicKey::new(pubkey_bytes);

    let lat_raw = cursor.get_i32_le();
    let lon_raw = cursor.get_i32_le();

    let multi_acks = cursor.get_u8();
    let advert_loc_policy = cursor.get_u8();
    let telemetry_byte = cursor.get_u8();
    let manual_add = cursor.get_u8();

    let freq_raw = cursor.get_u32_le();
    let bw_raw = cursor.get_u32_le();
    let sf = cursor.get_u8();
    let cr = cursor.get_u8();

    let name_start = cursor.position() as usize;
    let name = parse_padded_str(&data[name_start..], 32);

    Ok(SelfInfo {
        advert_type,
        tx_power,
        max_tx_power,
        public_key,
        latitude: parse_coord(lat_raw),
        longitude: parse_coord(lon_raw),
        multi_acks,
        advert_loc_policy,
        telemetry_modes: TelemetryModes::from_byte(telemetry_byte),
        manual_add_contacts: manual_add != 0,
        radio: RadioConfig {
            frequency_mhz: f64::from(freq_raw) / 1000.0,
            bandwidth_khz: f64::from(bw_raw) / 1000.0,
            spreading_factor: sf,
            coding_rate: cr,
        },
        name,
    })
}

/// Parses device info.
///
/// Firmware version 3+ adds capacity, BLE PIN and identification strings;
/// older firmware reports only the version byte.
pub fn parse_device_info(data: &[u8]) -> Result<DeviceInfo, ProtocolError> {
    require(ResponseCode::DeviceInfo, data, 1)?;

    let firmware_version = data[0];

    if firmware_version >= 3 && data.len() >= 79 {
        let mut cursor = std::io::Cursor::new(&data[1..]);

        let max_contacts = u16::from(cursor.get_u8()) * 2;
        let max_channels = cursor.get_u8();
        let ble_pin = cursor.get_u32_le();

        Ok(DeviceInfo {
            firmware_version,
            max_contacts: Some(max_contacts),
            max_channels: Some(max_channels),
            ble_pin: Some(ble_pin),
            build: Some(parse_padded_str(&data[7..19], 12)),
            model: Some(parse_padded_str(&data[19..59], 40)),
            version: Some(parse_padded_str(&data[59..79], 20)),
        })
    } else {
        Ok(DeviceInfo {
            firmware_version,
            max_contacts: None,
            max_channels: None,
            ble_pin: None,
            build: None,
            model: None,
            version: None,
        })
    }
}

/// Parses a 147-byte contact record.
///
/// Format:
/// ```text
/// [pubkey:32] [type:1] [flags:1] [path_len:1signed] [path:64]
/// [name:32] [last_advert:4LE] [lat:4LE] [lon:4LE] [lastmod:4LE]
/// ```
pub fn parse_contact(data: &[u8]) -> Result<Contact, ProtocolError> {
    require(ResponseCode::Contact, data, 147)?;

    let mut cursor = std::io::Cursor::new(data);

    let mut pubkey_bytes = [0u8; 32];
    cursor.copy_to_slice(&mut pubkey_bytes);
    let public_key = PublicKey::new(pubkey_bytes);

    let device_type = ContactType::from_byte(cursor.get_u8());
    let flags = ContactFlags::from_byte(cursor.get_u8());
    let out_path_len = cursor.get_i8();

    let mut path_bytes = [0u8; 64];
    cursor.copy_to_slice(&mut path_bytes);
    let path_len = usize::try_from(out_path_len).unwrap_or(0).min(64);
    let out_path = Bytes::copy_from_slice(&path_bytes[..path_len]);

    let name = parse_padded_str(&data[99..131], 32);

    cursor.set_position(131);
    let last_advert = cursor.get_u32_le();
    let lat_raw = cursor.get_i32_le();
    let lon_raw = cursor.get_i32_le();
    let last_modified = cursor.get_u32_le();

    Ok(Contact {
        public_key,
        device_type,
        flags,
        out_path_len,
        out_path,
        name,
        last_advert,
        latitude: parse_coord(lat_raw),
        longitude: parse_coord(lon_raw),
        last_modified,
    })
}

/// Parses a private message.
///
/// The v3 form prepends a signed SNR byte and two reserved bytes. Signed
/// text (type 2) carries four signature bytes before the payload.
pub fn parse_contact_message(data: &[u8], v3: bool) -> Result<ContactMessage, ProtocolError> {
    let code = if v3 {
        ResponseCode::ContactMsgRecvV3
    } else {
        ResponseCode::ContactMsgRecv
    };
    require(code, data, if v3 { 15 } else { 12 })?;

    let mut cursor = std::io::Cursor::new(data);

    let signal = if v3 {
        let snr_raw = cursor.get_i8();
        cursor.advance(2);
        Some(SignalQuality {
            snr: snr_from_raw(snr_raw),
        })
    } else {
        None
    };

    let mut prefix = [0u8; PUBLIC_KEY_PREFIX_LEN];
    cursor.copy_to_slice(&mut prefix);

    let path_len = cursor.get_i8();
    let text_type = TextType::from_byte(cursor.get_u8());
    let timestamp = cursor.get_u32_le();

    let text_start = cursor.position() as usize;
    let (signature, text) = if text_type == TextType::Signed && data.len() >= text_start + 4 {
        let mut sig = [0u8; 4];
        sig.copy_from_slice(&data[text_start..text_start + 4]);
        (
            Some(sig),
            lossy_utf8(&data[text_start + 4..], "message text"),
        )
    } else {
        (None, lossy_utf8(&data[text_start..], "message text"))
    };

    Ok(ContactMessage {
        sender_prefix: KeyPrefix::from_slice(&prefix),
        path_len,
        text_type,
        timestamp,
        signature,
        text,
        signal,
    })
}

/// Parses a channel message; v3 handling matches [`parse_contact_message`].
pub fn parse_channel_message(data: &[u8], v3: bool) -> Result<ChannelMessage, ProtocolError> {
    let code = if v3 {
        ResponseCode::ChannelMsgRecvV3
    } else {
        ResponseCode::ChannelMsgRecv
    };
    require(code, data, if v3 { 11 } else { 8 })?;

    let mut cursor = std::io::Cursor::new(data);

    let signal = if v3 {
        let snr_raw = cursor.get_i8();
        cursor.advance(2);
        Some(SignalQuality {
            snr: snr_from_raw(snr_raw),
        })
    } else {
        None
    };

    let channel_index = cursor.get_u8();
    let path_len = cursor.get_i8();
    let text_type = TextType::from_byte(cursor.get_u8());
    let timestamp = cursor.get_u32_le();

    let text_start = cursor.position() as usize;
    let text = lossy_utf8(&data[text_start..], "channel text");

    Ok(ChannelMessage {
        channel_index,
        path_len,
        text_type,
        timestamp,
        text,
        signal,
    })
}

/// Parses battery status; storage usage is appended by newer firmware.
pub fn parse_battery(data: &[u8]) -> Result<BatteryInfo, ProtocolError> {
    require(ResponseCode::Battery, data, 2)?;

    let millivolts = u16::from_le_bytes([data[0], data[1]]);
    let storage = if data.len() >= 10 {
        Some(StorageInfo {
            used_kb: u32::from_le_bytes([data[2], data[3], data[4], data[5]]),
            total_kb: u32::from_le_bytes([data[6], data[7], data[8], data[9]]),
        })
    } else {
        None
    };

    Ok(BatteryInfo {
        millivolts,
        storage,
    })
}

/// Parses channel info.
///
/// The 32-byte name window is NUL-terminated; the firmware leaves
/// uninitialized bytes after the terminator, which are discarded.
pub fn parse_channel_info(data: &[u8]) -> Result<ChannelInfo, ProtocolError> {
    require(ResponseCode::ChannelInfo, data, 49)?;

    let index = data[0];
    let name = parse_padded_str(&data[1..33], 32);

    let mut secret = [0u8; 16];
    secret.copy_from_slice(&data[33..49]);

    Ok(ChannelInfo {
        index,
        name,
        secret,
    })
}

fn parse_stats(data: &[u8]) -> Result<Event, ProtocolError> {
    require(ResponseCode::Stats, data, 1)?;
    let stats_type = data[0];
    let block = &data[1..];

    let stats = match stats_type {
        0x00 => StatsData::Core(parse_core_stats(block)?),
        0x01 => StatsData::Radio(parse_radio_stats(block)?),
        0x02 => StatsData::Packets(parse_packet_stats(block)?),
        other => {
            return Err(ProtocolError::Malformed {
                code: ResponseCode::Stats as u8,
                reason: format!("unknown stats type 0x{other:02X}"),
            });
        }
    };
    Ok(Event::Stats(stats))
}

/// Parses core statistics: `[battery_mv:2LE] [uptime:4LE] [error_flags:2LE] [queue:1]`.
pub fn parse_core_stats(data: &[u8]) -> Result<CoreStats, ProtocolError> {
    require(ResponseCode::Stats, data, 9)?;

    let mut cursor = std::io::Cursor::new(data);
    Ok(CoreStats {
        battery_mv: cursor.get_u16_le(),
        uptime_secs: cursor.get_u32_le(),
        error_flags: cursor.get_u16_le(),
        queue_len: cursor.get_u8(),
    })
}

/// Parses radio statistics:
/// `[noise_floor:2LEsigned] [rssi:1signed] [snr:1signed/4] [tx_air:4LE] [rx_air:4LE]`.
pub fn parse_radio_stats(data: &[u8]) -> Result<RadioStats, ProtocolError> {
    require(ResponseCode::Stats, data, 12)?;

    let mut cursor = std::io::Cursor::new(data);
    let noise_floor = cursor.get_i16_le();
    let last_rssi = cursor.get_i8();
    let last_snr = snr_from_raw(cursor.get_i8());
    Ok(RadioStats {
        noise_floor,
        last_rssi,
        last_snr,
        tx_airtime_secs: cursor.get_u32_le(),
        rx_airtime_secs: cursor.get_u32_le(),
    })
}

/// Parses packet statistics: six u32 LE counters.
pub fn parse_packet_stats(data: &[u8]) -> Result<PacketStats, ProtocolError> {
    require(ResponseCode::Stats, data, 24)?;

    let mut cursor = std::io::Cursor::new(data);
    Ok(PacketStats {
        received: cursor.get_u32_le(),
        sent: cursor.get_u32_le(),
        sent_flood: cursor.get_u32_le(),
        sent_direct: cursor.get_u32_le(),
        recv_flood: cursor.get_u32_le(),
        recv_direct: cursor.get_u32_le(),
    })
}

/// Parses a remote status block (without the key prefix header; the caller
/// supplies the prefix, either from the push header or from the
/// originating binary request).
///
/// The block is 48 bytes, with an optional trailing `rxAirtime` u32
/// accepted when 52 or more bytes are present.
pub fn parse_status_block(
    pubkey_prefix: KeyPrefix,
    data: &[u8],
) -> Result<DeviceStatus, ProtocolError> {
    require(ResponseCode::StatusResponse, data, 48)?;

    let mut cursor = std::io::Cursor::new(data);

    let battery_mv = cursor.get_u16_le();
    let tx_queue_len = cursor.get_u16_le();
    let noise_floor = cursor.get_i16_le();
    let last_rssi = cursor.get_i16_le();
    let packets_received = cursor.get_u32_le();
    let packets_sent = cursor.get_u32_le();
    let airtime_secs = cursor.get_u32_le();
    let uptime_secs = cursor.get_u32_le();
    let sent_flood = cursor.get_u32_le();
    let sent_direct = cursor.get_u32_le();
    let recv_flood = cursor.get_u32_le();
    let recv_direct = cursor.get_u32_le();
    let full_events = cursor.get_u16_le();
    let last_snr = f32::from(cursor.get_i16_le()) / SNR_SCALE;
    let direct_dups = cursor.get_u16_le();
    let flood_dups = cursor.get_u16_le();
    let rx_airtime_secs = if data.len() >= 52 { cursor.get_u32_le() } else { 0 };

    Ok(DeviceStatus {
        pubkey_prefix,
        battery_mv,
        tx_queue_len,
        noise_floor,
        last_rssi,
        packets_received,
        packets_sent,
        airtime_secs,
        uptime_secs,
        sent_flood,
        sent_direct,
        recv_flood,
        recv_direct,
        full_events,
        last_snr,
        direct_dups,
        flood_dups,
        rx_airtime_secs,
    })
}

/// Parses trace data.
///
/// Format:
/// ```text
/// [reserved:1] [path_hash_len:1] [flags:1] [tag:4LE] [auth:4LE]
/// [hashes: path_hash_len] [snr per hop] [final_snr:1]
/// ```
/// The flags' low 2 bits select the per-hop hash width (1/2/4/8 bytes);
/// a hop hash of all 0xFF marks the destination.
pub fn parse_trace_data(data: &[u8]) -> Result<TraceData, ProtocolError> {
    let code = ResponseCode::TraceData;
    require(code, data, 11)?;

    let hash_total = data[1] as usize;
    let flags = data[2];
    let tag = u32::from_le_bytes([data[3], data[4], data[5], data[6]]);
    let auth_code = u32::from_le_bytes([data[7], data[8], data[9], data[10]]);

    let hash_size = 1usize << (flags & 0x03);
    let hop_count = hash_total / hash_size;

    require(code, data, 11 + hash_total + hop_count + 1)?;

    let hashes = &data[11..11 + hash_total];
    let snrs = &data[11 + hash_total..11 + hash_total + hop_count];
    let final_snr = data[11 + hash_total + hop_count] as i8;

    let mut nodes = Vec::with_capacity(hop_count + 1);
    for hop in 0..hop_count {
        let hash = &hashes[hop * hash_size..(hop + 1) * hash_size];
        nodes.push(TraceNode {
            hash: if hash.iter().all(|&b| b == 0xFF) {
                None
            } else {
                Some(Bytes::copy_from_slice(hash))
            },
            snr: snr_from_raw(snrs[hop] as i8),
        });
    }
    nodes.push(TraceNode {
        hash: None,
        snr: snr_from_raw(final_snr),
    });

    Ok(TraceData {
        tag,
        auth_code,
        flags,
        hash_size,
        nodes,
    })
}

/// Parses a path discovery response:
/// `[reserved:1] [prefix:6] [out_len:1] [out...] [in_len:1] [in...]`.
pub fn parse_path_discovery(data: &[u8]) -> Result<PathDiscovery, ProtocolError> {
    let code = ResponseCode::PathDiscoveryResponse;
    require(code, data, 9)?;

    let pubkey_prefix = KeyPrefix::from_slice(&data[1..7]);
    let out_len = data[7] as usize;
    require(code, data, 9 + out_len)?;
    let out_path = Bytes::copy_from_slice(&data[8..8 + out_len]);

    let in_len = data[8 + out_len] as usize;
    require(code, data, 9 + out_len + in_len)?;
    let in_path = Bytes::copy_from_slice(&data[9 + out_len..9 + out_len + in_len]);

    Ok(PathDiscovery {
        pubkey_prefix,
        out_path,
        in_path,
    })
}

/// Parses a login-success push.
///
/// Legacy firmware sends `[perm:1] [prefix:6]`; newer firmware appends
/// `[timestamp:4LE] [acl_perm:1] [fw_level:1]`. Legacy and ACL permission
/// bytes have different meanings and are normalized to one scalar.
pub fn parse_login_success(data: &[u8]) -> Result<LoginInfo, ProtocolError> {
    require(ResponseCode::LoginSuccess, data, 7)?;

    let legacy_perm = data[0];
    let server_prefix = KeyPrefix::from_slice(&data[1..7]);

    if data.len() >= 13 {
        let server_timestamp = u32::from_le_bytes([data[7], data[8], data[9], data[10]]);
        let acl_permissions = data[11];
        let firmware_level = data[12];
        let permission = if acl_permissions & 0x01 != 0 {
            Permission::Admin
        } else {
            Permission::ReadWrite
        };
        Ok(LoginInfo {
            server_prefix,
            permission,
            server_timestamp: Some(server_timestamp),
            acl_permissions: Some(acl_permissions),
            firmware_level: Some(firmware_level),
        })
    } else {
        let permission = if legacy_perm != 0 {
            Permission::Admin
        } else {
            Permission::Guest
        };
        Ok(LoginInfo {
            server_prefix,
            permission,
            server_timestamp: None,
            acl_permissions: None,
            firmware_level: None,
        })
    }
}

/// Parses a control-data push:
/// `[snr:1signed/4] [rssi:1signed] [path_len:1] [payload_type:1] [payload...]`.
///
/// An upper payload-type nibble of 0x9 marks a discover response, decoded
/// in place.
pub fn parse_control_data(data: &[u8]) -> Result<ControlData, ProtocolError> {
    require(ResponseCode::ControlData, data, 4)?;

    let snr = snr_from_raw(data[0] as i8);
    let rssi = data[1] as i8;
    let path_len = data[2];
    let payload_type = data[3];
    let payload = Bytes::copy_from_slice(&data[4..]);

    let discover = if payload_type >> 4 == 0x9 {
        parse_discover_response(&payload)
    } else {
        None
    };

    Ok(ControlData {
        snr,
        rssi,
        path_len,
        payload_type,
        discover,
        payload,
    })
}

/// Discover response inside control data:
/// `[snr_in:1signed/4] [tag:4LE] [pubkey: 32, 8, or whatever remains]`.
fn parse_discover_response(payload: &[u8]) -> Option<DiscoverResponse> {
    if payload.len() < 5 {
        tracing::debug!("discover response payload too short: {}", payload.len());
        return None;
    }

    let snr_in = snr_from_raw(payload[0] as i8);
    let tag = u32::from_le_bytes([payload[1], payload[2], payload[3], payload[4]]);

    let key_bytes = &payload[5..];
    let public_key = if key_bytes.len() >= 32 {
        Bytes::copy_from_slice(&key_bytes[..32])
    } else if key_bytes.len() >= 8 {
        Bytes::copy_from_slice(&key_bytes[..8])
    } else {
        Bytes::copy_from_slice(key_bytes)
    };

    Some(DiscoverResponse {
        snr_in,
        tag,
        public_key,
    })
}

// ==================== binary response payloads ====================

/// Re-parses a binary response payload once the originating request's
/// context (key prefix, request type, neighbour prefix width) has been
/// recovered from its tag.
pub fn parse_binary_payload(
    request_type: BinaryReqType,
    pubkey_prefix: KeyPrefix,
    neighbour_prefix_len: usize,
    payload: &[u8],
) -> Result<Event, ProtocolError> {
    match request_type {
        BinaryReqType::Status => Ok(Event::StatusResponse(Box::new(parse_status_block(
            pubkey_prefix,
            payload,
        )?))),
        BinaryReqType::Telemetry => Ok(Event::Telemetry {
            pubkey_prefix,
            telemetry: Telemetry::from_lpp(payload),
        }),
        BinaryReqType::Acl => Ok(Event::Acl {
            pubkey_prefix,
            entries: parse_acl(payload),
        }),
        BinaryReqType::Mma => Ok(Event::Mma {
            pubkey_prefix,
            records: parse_mma(payload),
        }),
        BinaryReqType::Neighbours => Ok(Event::Neighbours {
            pubkey_prefix,
            table: parse_neighbours(payload, neighbour_prefix_len)?,
        }),
        BinaryReqType::KeepAlive => Err(ProtocolError::Malformed {
            code: ResponseCode::BinaryResponse as u8,
            reason: "keep-alive requests have no response payload".into(),
        }),
    }
}

/// Parses ACL entries: repeating `[key_prefix:6][permissions:1]` records.
/// All-zero prefixes are unused table slots and are skipped.
#[must_use]
pub fn parse_acl(payload: &[u8]) -> Vec<AclEntry> {
    payload
        .chunks_exact(7)
        .filter(|record| record[..6].iter().any(|&b| b != 0))
        .map(|record| AclEntry {
            key_prefix: KeyPrefix::from_slice(&record[..6]),
            permissions: record[6],
        })
        .collect()
}

/// Parses min/max/avg records: `[channel:1][type:1][min][max][avg]` where
/// each value is the LPP type's width, big-endian. An unknown type code
/// terminates decoding.
#[must_use]
pub fn parse_mma(payload: &[u8]) -> Vec<MmaRecord> {
    let mut records = Vec::new();
    let mut pos = 0;

    while pos + 2 <= payload.len() {
        let channel = payload[pos];
        let Some(lpp_type) = LppType::from_byte(payload[pos + 1]) else {
            tracing::debug!(
                "unknown LPP type 0x{:02X} in MMA record, stopping",
                payload[pos + 1]
            );
            break;
        };
        pos += 2;

        let size = lpp_type.data_size();
        if pos + 3 * size > payload.len() {
            break;
        }

        records.push(MmaRecord {
            channel,
            lpp_type: lpp_type as u8,
            min: lpp_type.decode_value(&payload[pos..pos + size]),
            max: lpp_type.decode_value(&payload[pos + size..pos + 2 * size]),
            avg: lpp_type.decode_value(&payload[pos + 2 * size..pos + 3 * size]),
        });
        pos += 3 * size;
    }

    records
}

/// Parses a neighbour table:
/// `[total:2LEsigned] [returned:2LEsigned]` then `returned` records of
/// `[prefix:N] [seconds_ago:4LEsigned] [snr:1signed/4]`, `N` chosen by the
/// originating request.
pub fn parse_neighbours(
    payload: &[u8],
    prefix_len: usize,
) -> Result<NeighbourTable, ProtocolError> {
    let code = ResponseCode::BinaryResponse;
    require(code, payload, 4)?;

    let total = i16::from_le_bytes([payload[0], payload[1]]);
    let returned = i16::from_le_bytes([payload[2], payload[3]]);

    let record_size = prefix_len + 5;
    let count = usize::try_from(returned).unwrap_or(0);
    require(code, payload, 4 + count * record_size)?;

    let mut neighbours = Vec::with_capacity(count);
    for i in 0..count {
        let record = &payload[4 + i * record_size..4 + (i + 1) * record_size];
        neighbours.push(Neighbour {
            prefix: Bytes::copy_from_slice(&record[..prefix_len]),
            heard_secs_ago: i32::from_le_bytes([
                record[prefix_len],
                record[prefix_len + 1],
                record[prefix_len + 2],
                record[prefix_len + 3],
            ]),
            snr: snr_from_raw(record[prefix_len + 4] as i8),
        });
    }

    Ok(NeighbourTable { total, neighbours })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::builder;
    use crate::protocol::lpp::LppValue;

    fn frame(code: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![code];
        out.extend_from_slice(payload);
        out
    }

    fn self_info_payload(name: &str) -> Vec<u8> {
        let mut data = Vec::new();
        data.push(1); // advert_type
        data.push(22); // tx_power
        data.push(30); // max_tx_power
        data.extend_from_slice(&[0xAB; 32]); // pubkey
        data.extend_from_slice(&51_500_000i32.to_le_bytes()); // lat
        data.extend_from_slice(&(-1_278_000i32).to_le_bytes()); // lon
        data.push(1); // multi_acks
        data.push(0); // advert_loc_policy
        data.push(0b0010_0111); // telemetry modes
        data.push(1); // manual_add
        data.extend_from_slice(&868_000u32.to_le_bytes()); // freq kHz
        data.extend_from_slice(&250_000u32.to_le_bytes()); // bw Hz
        data.push(11); // sf
        data.push(5); // cr
        data.extend_from_slice(name.as_bytes());
        data
    }

    #[test]
    fn test_parse_empty_frame() {
        let event = parse_frame(&[]);
        assert!(matches!(event, Event::ParseFailure { ref reason, .. } if reason == "empty frame"));
    }

    #[test]
    fn test_parse_unknown_code() {
        let event = parse_frame(&[0x7F, 0x01]);
        let Event::ParseFailure { data, reason } = event else {
            panic!("expected parse failure");
        };
        assert_eq!(data.as_ref(), &[0x7F, 0x01]);
        assert_eq!(reason, "unknown response code 0x7F");
    }

    #[test]
    fn test_parse_self_info_fields() {
        let event = parse_frame(&frame(0x05, &self_info_payload("TestNode")));
        let Event::SelfInfo(info) = event else {
            panic!("expected self info");
        };
        assert_eq!(info.public_key.as_bytes(), &[0xAB; 32]);
        assert_eq!(info.name, "TestNode");
        assert_eq!(info.tx_power, 22);
        assert!((info.latitude.unwrap() - 51.5).abs() < 1e-9);
        assert!((info.longitude.unwrap() + 1.278).abs() < 1e-9);
        assert_eq!(info.telemetry_modes.env, 0b10);
        assert_eq!(info.telemetry_modes.loc, 0b01);
        assert_eq!(info.telemetry_modes.base, 0b11);
        assert!(info.manual_add_contacts);
        assert!((info.radio.frequency_mhz - 868.0).abs() < 1e-9);
        assert_eq!(info.radio.spreading_factor, 11);
    }

    #[test]
    fn test_parse_self_info_empty_name() {
        let event = parse_frame(&frame(0x05, &self_info_payload("")));
        let Event::SelfInfo(info) = event else {
            panic!("expected self info");
        };
        assert_eq!(info.name, "");
    }

    #[test]
    fn test_contact_roundtrip_with_builder() {
        let contact = Contact {
            public_key: PublicKey::new([0xAA; 32]),
            device_type: ContactType::Chat,
            flags: ContactFlags::default(),
            out_path_len: -1,
            out_path: Bytes::new(),
            name: "Alice".into(),
            last_advert: 1_700_000_000,
            latitude: Some(37.7749),
            longitude: Some(-122.4194),
            last_modified: 1_700_000_001,
        };

        let built = builder::update_contact(&contact);
        assert_eq!(built.len(), 148);
        assert_eq!(built[0], 0x09);

        // The record after the opcode is exactly what a contact response
        // carries.
        let event = parse_frame(&frame(0x03, &built[1..]));
        let Event::Contact(parsed) = event else {
            panic!("expected contact");
        };
        assert_eq!(*parsed, contact);
        assert_eq!(parsed.out_path_len, -1);
        assert!(parsed.is_flood());
    }

    #[test]
    fn test_parse_message_sent() {
        let mut payload = vec![0x01]; // flood
        payload.extend_from_slice(&[0x01, 0x02, 0x03, 0x04]); // ack tag
        payload.extend_from_slice(&5000u32.to_le_bytes()); // timeout
        let event = parse_frame(&frame(0x06, &payload));
        assert_eq!(
            event,
            Event::MessageSent(MessageSent {
                is_flood: true,
                expected_ack: u32::from_le_bytes([0x01, 0x02, 0x03, 0x04]),
                suggested_timeout_ms: 5000,
            })
        );
    }

    #[test]
    fn test_parse_ack_forms() {
        let event = parse_frame(&frame(0x82, &[0x01, 0x02, 0x03, 0x04]));
        assert_eq!(
            event,
            Event::Ack(Acknowledgement {
                code: u32::from_le_bytes([0x01, 0x02, 0x03, 0x04]),
                round_trip_ms: None,
            })
        );

        let mut payload = vec![0x01, 0x02, 0x03, 0x04];
        payload.extend_from_slice(&1234u32.to_le_bytes());
        let event = parse_frame(&frame(0x82, &payload));
        assert_eq!(
            event,
            Event::Ack(Acknowledgement {
                code: u32::from_le_bytes([0x01, 0x02, 0x03, 0x04]),
                round_trip_ms: Some(1234),
            })
        );
    }

    #[test]
    fn test_parse_contact_message_v1_and_v3() {
        let mut v1 = Vec::new();
        v1.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]);
        v1.push(0); // path_len
        v1.push(0); // plain
        v1.extend_from_slice(&1_700_000_000u32.to_le_bytes());
        v1.extend_from_slice(b"hello");

        let Event::ContactMessage(msg) = parse_frame(&frame(0x07, &v1)) else {
            panic!("expected contact message");
        };
        assert_eq!(msg.text, "hello");
        assert_eq!(msg.timestamp, 1_700_000_000);
        assert!(msg.signal.is_none());
        assert!(msg.signature.is_none());

        // v3 prepends snr + two reserved bytes
        let mut v3 = vec![20u8, 0, 0]; // snr 5.0
        v3.extend_from_slice(&v1);
        let Event::ContactMessage(msg) = parse_frame(&frame(0x10, &v3)) else {
            panic!("expected contact message");
        };
        assert_eq!(msg.text, "hello");
        assert_eq!(msg.signal, Some(SignalQuality { snr: 5.0 }));
    }

    #[test]
    fn test_parse_signed_contact_message() {
        let mut data = Vec::new();
        data.extend_from_slice(&[0u8; 6]);
        data.push(0);
        data.push(2); // signed
        data.extend_from_slice(&7u32.to_le_bytes());
        data.extend_from_slice(&[0x11, 0x22, 0x33, 0x44]); // signature
        data.extend_from_slice(b"signed text");

        let Event::ContactMessage(msg) = parse_frame(&frame(0x07, &data)) else {
            panic!("expected contact message");
        };
        assert_eq!(msg.text_type, TextType::Signed);
        assert_eq!(msg.signature, Some([0x11, 0x22, 0x33, 0x44]));
        assert_eq!(msg.text, "signed text");
    }

    #[test]
    fn test_parse_channel_message() {
        let mut data = Vec::new();
        data.push(2); // channel
        data.push(0); // path_len
        data.push(0); // plain
        data.extend_from_slice(&1_234_567_890u32.to_le_bytes());
        data.extend_from_slice(b"Hi");

        let Event::ChannelMessage(msg) = parse_frame(&frame(0x08, &data)) else {
            panic!("expected channel message");
        };
        assert_eq!(msg.channel_index, 2);
        assert_eq!(msg.text, "Hi");
    }

    #[test]
    fn test_parse_lossy_utf8_does_not_drop_frame() {
        let mut data = Vec::new();
        data.push(0);
        data.push(0);
        data.push(0);
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&[0x68, 0xFF, 0x69]); // h <invalid> i

        let Event::ChannelMessage(msg) = parse_frame(&frame(0x08, &data)) else {
            panic!("expected channel message");
        };
        assert_eq!(msg.text, "h\u{FFFD}i");
    }

    fn status_block_48() -> Vec<u8> {
        let mut block = Vec::new();
        block.extend_from_slice(&4100u16.to_le_bytes()); // battery
        block.extend_from_slice(&3u16.to_le_bytes()); // tx queue
        block.extend_from_slice(&(-105i16).to_le_bytes()); // noise floor
        block.extend_from_slice(&(-88i16).to_le_bytes()); // rssi
        for counter in [100u32, 50, 7, 3600, 10, 20, 30, 40] {
            block.extend_from_slice(&counter.to_le_bytes());
        }
        block.extend_from_slice(&2u16.to_le_bytes()); // full events
        block.extend_from_slice(&20i16.to_le_bytes()); // snr*4 = 5.0
        block.extend_from_slice(&1u16.to_le_bytes()); // direct dups
        block.extend_from_slice(&4u16.to_le_bytes()); // flood dups
        block
    }

    #[test]
    fn test_parse_status_push_58_bytes() {
        let mut payload = vec![0x00];
        payload.extend_from_slice(&[0xAB, 0xCD, 0xEF, 0x01, 0x23, 0x45]);
        payload.extend_from_slice(&status_block_48());
        payload.extend_from_slice(&[0x00, 0x00, 0x00]); // pad block to 51
        assert_eq!(payload.len(), 58);

        let Event::StatusResponse(status) = parse_frame(&frame(0x87, &payload)) else {
            panic!("expected status response");
        };
        assert_eq!(
            status.pubkey_prefix.as_bytes(),
            &[0xAB, 0xCD, 0xEF, 0x01, 0x23, 0x45]
        );
        assert_eq!(status.battery_mv, 4100);
        assert_eq!(status.noise_floor, -105);
        assert_eq!(status.last_snr, 5.0);
        assert_eq!(status.rx_airtime_secs, 0);
    }

    #[test]
    fn test_status_block_binary_form_matches_push() {
        let prefix = KeyPrefix::from_slice(&[0xAB, 0xCD, 0xEF, 0x01, 0x23, 0x45]);

        let mut push_payload = vec![0x00];
        push_payload.extend_from_slice(prefix.as_bytes());
        let mut block = status_block_48();
        block.extend_from_slice(&[0, 0, 0]);
        push_payload.extend_from_slice(&block);

        let Event::StatusResponse(pushed) = parse_frame(&frame(0x87, &push_payload)) else {
            panic!("expected status response");
        };

        let from_binary = parse_status_block(prefix, &status_block_48()).unwrap();
        assert_eq!(*pushed, from_binary);
    }

    #[test]
    fn test_status_block_with_rx_airtime() {
        let mut block = status_block_48();
        block.extend_from_slice(&777u32.to_le_bytes());
        let status = parse_status_block(KeyPrefix::default(), &block).unwrap();
        assert_eq!(status.rx_airtime_secs, 777);
    }

    #[test]
    fn test_status_block_too_short() {
        let err = parse_status_block(KeyPrefix::default(), &status_block_48()[..40]);
        assert!(err.is_err());
    }

    #[test]
    fn test_parse_trace_data_two_byte_hashes() {
        let mut payload = vec![0x00]; // reserved
        payload.push(6); // total hash bytes
        payload.push(0x01); // 2-byte hashes
        payload.extend_from_slice(&42u32.to_le_bytes());
        payload.extend_from_slice(&99u32.to_le_bytes());
        payload.extend_from_slice(&[0x11, 0x22, 0x33, 0x44, 0xFF, 0xFF]); // hashes
        payload.extend_from_slice(&[0x10, 0x08, 0x04]); // per-hop snr
        payload.push(0x02); // final snr

        let Event::TraceData(trace) = parse_frame(&frame(0x89, &payload)) else {
            panic!("expected trace data");
        };
        assert_eq!(trace.tag, 42);
        assert_eq!(trace.auth_code, 99);
        assert_eq!(trace.hash_size, 2);
        assert_eq!(trace.nodes.len(), 4);

        assert_eq!(
            trace.nodes[0].hash.as_deref(),
            Some(&[0x11u8, 0x22][..])
        );
        assert_eq!(trace.nodes[0].snr, 4.0);
        assert_eq!(trace.nodes[1].hash.as_deref(), Some(&[0x33u8, 0x44][..]));
        assert_eq!(trace.nodes[1].snr, 2.0);
        // all-0xFF hash is the destination marker
        assert_eq!(trace.nodes[2].hash, None);
        assert_eq!(trace.nodes[2].snr, 1.0);
        // trailing entry carries the final reception snr
        assert_eq!(trace.nodes[3].hash, None);
        assert_eq!(trace.nodes[3].snr, 0.5);
    }

    #[test]
    fn test_parse_trace_data_truncated() {
        let mut payload = vec![0x00, 6, 0x01];
        payload.extend_from_slice(&42u32.to_le_bytes());
        payload.extend_from_slice(&99u32.to_le_bytes());
        payload.extend_from_slice(&[0x11, 0x22]); // not enough hash bytes
        assert!(matches!(
            parse_frame(&frame(0x89, &payload)),
            Event::ParseFailure { .. }
        ));
    }

    #[test]
    fn test_parse_path_discovery() {
        let mut payload = vec![0x00];
        payload.extend_from_slice(&[1, 2, 3, 4, 5, 6]);
        payload.push(2);
        payload.extend_from_slice(&[0xA1, 0xA2]);
        payload.push(3);
        payload.extend_from_slice(&[0xB1, 0xB2, 0xB3]);

        let Event::PathDiscoveryResponse(path) = parse_frame(&frame(0x8D, &payload)) else {
            panic!("expected path discovery");
        };
        assert_eq!(path.pubkey_prefix.as_bytes(), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(path.out_path.as_ref(), &[0xA1, 0xA2]);
        assert_eq!(path.in_path.as_ref(), &[0xB1, 0xB2, 0xB3]);
    }

    #[test]
    fn test_parse_login_success_legacy() {
        let mut payload = vec![0x01];
        payload.extend_from_slice(&[9, 8, 7, 6, 5, 4]);
        let Event::LoginSuccess(info) = parse_frame(&frame(0x85, &payload)) else {
            panic!("expected login success");
        };
        assert_eq!(info.permission, Permission::Admin);
        assert_eq!(info.server_timestamp, None);

        payload[0] = 0x00;
        let Event::LoginSuccess(info) = parse_frame(&frame(0x85, &payload)) else {
            panic!("expected login success");
        };
        assert_eq!(info.permission, Permission::Guest);
    }

    #[test]
    fn test_parse_login_success_extended() {
        let mut payload = vec![0x00];
        payload.extend_from_slice(&[9, 8, 7, 6, 5, 4]);
        payload.extend_from_slice(&1_700_000_000u32.to_le_bytes());
        payload.push(0x01); // acl: admin bit
        payload.push(7); // fw level

        let Event::LoginSuccess(info) = parse_frame(&frame(0x85, &payload)) else {
            panic!("expected login success");
        };
        assert_eq!(info.permission, Permission::Admin);
        assert_eq!(info.server_timestamp, Some(1_700_000_000));
        assert_eq!(info.acl_permissions, Some(0x01));
        assert_eq!(info.firmware_level, Some(7));

        payload[11] = 0x02; // acl without admin bit
        let Event::LoginSuccess(info) = parse_frame(&frame(0x85, &payload)) else {
            panic!("expected login success");
        };
        assert_eq!(info.permission, Permission::ReadWrite);
    }

    #[test]
    fn test_parse_channel_info_discards_after_nul() {
        let mut payload = vec![0u8; 49];
        payload[0] = 1;
        payload[1..7].copy_from_slice(b"Public");
        // firmware garbage after the terminator
        payload[8..12].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        payload[33..49]
            .copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16]);

        let Event::ChannelInfo(channel) = parse_frame(&frame(0x12, &payload)) else {
            panic!("expected channel info");
        };
        assert_eq!(channel.index, 1);
        assert_eq!(channel.name, "Public");
        assert_eq!(channel.secret[15], 16);
    }

    #[test]
    fn test_parse_control_data_discover() {
        let mut payload = vec![8u8, (-90i8) as u8, 2, 0x91]; // snr 2.0, discover marker
        payload.push(12); // inner snr 3.0
        payload.extend_from_slice(&0xCAFE_BABEu32.to_le_bytes());
        payload.extend_from_slice(&[0x77; 8]); // 8-byte key prefix

        let Event::ControlData(ctrl) = parse_frame(&frame(0x8E, &payload)) else {
            panic!("expected control data");
        };
        assert_eq!(ctrl.snr, 2.0);
        assert_eq!(ctrl.rssi, -90);
        assert_eq!(ctrl.payload_type, 0x91);
        let discover = ctrl.discover.expect("discover response");
        assert_eq!(discover.snr_in, 3.0);
        assert_eq!(discover.tag, 0xCAFE_BABE);
        assert_eq!(discover.public_key.len(), 8);
    }

    #[test]
    fn test_parse_control_data_full_key_preferred() {
        let mut payload = vec![0u8, 0, 0, 0x90];
        payload.push(0);
        payload.extend_from_slice(&1u32.to_le_bytes());
        payload.extend_from_slice(&[0x55; 40]);

        let Event::ControlData(ctrl) = parse_frame(&frame(0x8E, &payload)) else {
            panic!("expected control data");
        };
        assert_eq!(ctrl.discover.unwrap().public_key.len(), 32);
    }

    #[test]
    fn test_parse_control_data_non_discover() {
        let payload = [4u8, 0, 1, 0x10, 0xAA, 0xBB];
        let Event::ControlData(ctrl) = parse_frame(&frame(0x8E, &payload)) else {
            panic!("expected control data");
        };
        assert!(ctrl.discover.is_none());
        assert_eq!(ctrl.payload.as_ref(), &[0xAA, 0xBB]);
    }

    #[test]
    fn test_parse_binary_response_wrapper() {
        let mut payload = vec![0x01]; // status request type
        payload.extend_from_slice(&7u32.to_le_bytes());
        payload.extend_from_slice(&[0xAA, 0xBB]);

        let event = parse_frame(&frame(0x8C, &payload));
        assert_eq!(
            event,
            Event::BinaryResponse {
                request_type: 0x01,
                tag: 7,
                payload: Bytes::from_static(&[0xAA, 0xBB]),
            }
        );
    }

    #[test]
    fn test_parse_acl_skips_empty_slots() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&[1, 2, 3, 4, 5, 6, 0x03]);
        payload.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0x00]); // unused slot
        payload.extend_from_slice(&[9, 9, 9, 9, 9, 9, 0x01]);
        payload.extend_from_slice(&[0xFF, 0xFF]); // trailing partial record

        let entries = parse_acl(&payload);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key_prefix.as_bytes(), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(entries[0].permissions, 0x03);
        assert_eq!(entries[1].permissions, 0x01);
    }

    #[test]
    fn test_parse_mma_big_endian() {
        // Temperature channel: min -1.0, max 25.0, avg 12.0 (x10, BE i16)
        let mut payload = vec![1u8, 103];
        for value in [-10i16, 250, 120] {
            payload.extend_from_slice(&value.to_be_bytes());
        }
        // Voltage channel: min 3.50, max 4.20, avg 3.85 (x100, BE u16)
        payload.extend_from_slice(&[2u8, 116]);
        for value in [350u16, 420, 385] {
            payload.extend_from_slice(&value.to_be_bytes());
        }

        let records = parse_mma(&payload);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].min, LppValue::Float(-1.0));
        assert_eq!(records[0].max, LppValue::Float(25.0));
        assert_eq!(records[0].avg, LppValue::Float(12.0));
        assert_eq!(records[1].avg, LppValue::Float(3.85));
    }

    #[test]
    fn test_parse_neighbours() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&9i16.to_le_bytes()); // total
        payload.extend_from_slice(&2i16.to_le_bytes()); // returned
        payload.extend_from_slice(&[0x10, 0x11, 0x12, 0x13]);
        payload.extend_from_slice(&60i32.to_le_bytes());
        payload.push(16); // snr 4.0
        payload.extend_from_slice(&[0x20, 0x21, 0x22, 0x23]);
        payload.extend_from_slice(&(-5i32).to_le_bytes());
        payload.push((-8i8) as u8); // snr -2.0

        let table = parse_neighbours(&payload, 4).unwrap();
        assert_eq!(table.total, 9);
        assert_eq!(table.neighbours.len(), 2);
        assert_eq!(table.neighbours[0].prefix.as_ref(), &[0x10, 0x11, 0x12, 0x13]);
        assert_eq!(table.neighbours[0].heard_secs_ago, 60);
        assert_eq!(table.neighbours[0].snr, 4.0);
        assert_eq!(table.neighbours[1].snr, -2.0);
    }

    #[test]
    fn test_parse_neighbours_truncated_records() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&1i16.to_le_bytes());
        payload.extend_from_slice(&2i16.to_le_bytes());
        payload.extend_from_slice(&[0u8; 9]); // room for one record only
        assert!(parse_neighbours(&payload, 4).is_err());
    }

    #[test]
    fn test_parse_binary_payload_status() {
        let prefix = KeyPrefix::from_slice(&[1, 2, 3, 4, 5, 6]);
        let event =
            parse_binary_payload(BinaryReqType::Status, prefix, 4, &status_block_48()).unwrap();
        let Event::StatusResponse(status) = event else {
            panic!("expected status");
        };
        assert_eq!(status.pubkey_prefix, prefix);
    }

    #[test]
    fn test_parse_binary_payload_telemetry() {
        let prefix = KeyPrefix::default();
        let event = parse_binary_payload(
            BinaryReqType::Telemetry,
            prefix,
            4,
            &[0x01, 0x67, 0x00, 0xFA],
        )
        .unwrap();
        let Event::Telemetry { telemetry, .. } = event else {
            panic!("expected telemetry");
        };
        assert_eq!(telemetry.temperature(), Some(25.0));
    }

    #[test]
    fn test_parse_telemetry_push() {
        let mut payload = vec![0x00];
        payload.extend_from_slice(&[1, 2, 3, 4, 5, 6]);
        payload.extend_from_slice(&[0x01, 0x67, 0x00, 0xFA]);

        let Event::Telemetry {
            pubkey_prefix,
            telemetry,
        } = parse_frame(&frame(0x8B, &payload))
        else {
            panic!("expected telemetry");
        };
        assert_eq!(pubkey_prefix.as_bytes(), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(telemetry.temperature(), Some(25.0));
    }

    #[test]
    fn test_parse_battery_forms() {
        let event = parse_frame(&frame(0x0C, &3540u16.to_le_bytes()));
        assert_eq!(
            event,
            Event::Battery(BatteryInfo {
                millivolts: 3540,
                storage: None
            })
        );

        let mut payload = 3540u16.to_le_bytes().to_vec();
        payload.extend_from_slice(&1024u32.to_le_bytes());
        payload.extend_from_slice(&4096u32.to_le_bytes());
        let event = parse_frame(&frame(0x0C, &payload));
        assert_eq!(
            event,
            Event::Battery(BatteryInfo {
                millivolts: 3540,
                storage: Some(StorageInfo {
                    used_kb: 1024,
                    total_kb: 4096
                })
            })
        );
    }

    #[test]
    fn test_parse_stats_variants() {
        let mut payload = vec![0x00];
        payload.extend_from_slice(&4200u16.to_le_bytes());
        payload.extend_from_slice(&3600u32.to_le_bytes());
        payload.extend_from_slice(&5u16.to_le_bytes());
        payload.push(10);
        let Event::Stats(StatsData::Core(core)) = parse_frame(&frame(0x18, &payload)) else {
            panic!("expected core stats");
        };
        assert_eq!(core.battery_mv, 4200);
        assert_eq!(core.queue_len, 10);

        let mut payload = vec![0x01];
        payload.extend_from_slice(&(-100i16).to_le_bytes());
        payload.push((-80i8) as u8);
        payload.push(40);
        payload.extend_from_slice(&1000u32.to_le_bytes());
        payload.extend_from_slice(&2000u32.to_le_bytes());
        let Event::Stats(StatsData::Radio(radio)) = parse_frame(&frame(0x18, &payload)) else {
            panic!("expected radio stats");
        };
        assert_eq!(radio.noise_floor, -100);
        assert_eq!(radio.last_rssi, -80);
        assert_eq!(radio.last_snr, 10.0);

        let mut payload = vec![0x02];
        for counter in [100u32, 50, 20, 30, 40, 60] {
            payload.extend_from_slice(&counter.to_le_bytes());
        }
        let Event::Stats(StatsData::Packets(packets)) = parse_frame(&frame(0x18, &payload)) else {
            panic!("expected packet stats");
        };
        assert_eq!(packets.received, 100);
        assert_eq!(packets.recv_direct, 60);

        assert!(matches!(
            parse_frame(&frame(0x18, &[0x09, 0, 0])),
            Event::ParseFailure { .. }
        ));
    }

    #[test]
    fn test_parse_advert_path() {
        let mut payload = 1_700_000_000u32.to_le_bytes().to_vec();
        payload.push(3);
        payload.extend_from_slice(&[0xA1, 0xA2, 0xA3]);
        let Event::AdvertPath(path) = parse_frame(&frame(0x16, &payload)) else {
            panic!("expected advert path");
        };
        assert_eq!(path.recv_timestamp, 1_700_000_000);
        assert_eq!(path.path.as_ref(), &[0xA1, 0xA2, 0xA3]);
    }

    #[test]
    fn test_parse_contact_deleted() {
        let Event::ContactDeleted(key) = parse_frame(&frame(0x19, &[0x5A; 32])) else {
            panic!("expected contact deleted");
        };
        assert_eq!(key.as_bytes(), &[0x5A; 32]);
    }

    #[test]
    fn test_endian_boundary_le_fields() {
        for value in [
            0u32,
            1,
            0x7F,
            0x80,
            0xFF,
            0x100,
            0x7FFF_FFFF,
            0x8000_0000,
            0xFFFF_FFFF,
        ] {
            let event = parse_frame(&frame(0x09, &value.to_le_bytes()));
            assert_eq!(event, Event::CurrentTime(value), "value={value:#x}");
        }
    }

    #[test]
    fn test_min_length_enforced_for_every_code() {
        // One below each code's minimum must produce a parse failure, never
        // a panic or a bogus event.
        let cases: &[(u8, usize)] = &[
            (0x02, 4),  // contactsStart
            (0x03, 147),
            (0x04, 4),
            (0x05, 57),
            (0x06, 9),
            (0x07, 12),
            (0x08, 8),
            (0x09, 4),
            (0x0C, 2),
            (0x0E, 64),
            (0x10, 15),
            (0x11, 11),
            (0x12, 49),
            (0x13, 5),
            (0x14, 1),
            (0x16, 5),
            (0x17, 8),
            (0x19, 32),
            (0x80, 32),
            (0x81, 32),
            (0x82, 4),
            (0x84, 3),
            (0x85, 7),
            (0x86, 7),
            (0x87, 58),
            (0x88, 2),
            (0x89, 11),
            (0x8A, 147),
            (0x8B, 7),
            (0x8C, 5),
            (0x8D, 9),
            (0x8E, 4),
        ];

        for &(code, min) in cases {
            for len in 0..min {
                let event = parse_frame(&frame(code, &vec![0u8; len]));
                assert!(
                    matches!(event, Event::ParseFailure { .. }),
                    "code 0x{code:02X} with {len} bytes must fail"
                );
            }
        }
    }

    #[test]
    fn test_parse_is_deterministic() {
        let payload = self_info_payload("Node");
        let input = frame(0x05, &payload);
        assert_eq!(parse_frame(&input), parse_frame(&input));
    }

    #[test]
    fn test_random_input_never_panics() {
        // Deterministic xorshift sweep over frames of length 0..=256.
        let mut state = 0x2545_F491_4F6C_DD1Du64;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        };

        for len in 0..=256usize {
            for _ in 0..8 {
                let input: Vec<u8> = (0..len).map(|_| (next() & 0xFF) as u8).collect();
                let _ = parse_frame(&input);
            }
        }
    }
}
