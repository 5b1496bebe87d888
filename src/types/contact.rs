//! Node identity and contact records.
//!
//! Every node on the mesh is addressed by a 32-byte public key; most
//! frames carry only its leading 6 bytes. Contacts are the radio's stored
//! view of peers it has heard advertise.

use bytes::Bytes;

/// Width of a full node identity key.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Width of the truncated key used to address nodes inside frames.
pub const PUBLIC_KEY_PREFIX_LEN: usize = 6;

/// Capacity of the source-route buffer in a contact record.
pub const MAX_PATH_LEN: usize = 64;

/// Capacity of the name field in a contact record.
pub const MAX_NAME_LEN: usize = 32;

/// Out-path length that selects flood routing.
pub const FLOOD_PATH_LEN: i8 = -1;

/// A node identity: the 32-byte public key the mesh knows a node by.
///
/// Renders as 64 lowercase hex characters; [`prefix`](Self::prefix) yields
/// the truncated form frames address nodes with.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    /// Wraps a full key.
    #[must_use]
    pub const fn new(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Copies a key out of a buffer; `None` unless exactly 32 bytes.
    #[must_use]
    pub fn try_from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; PUBLIC_KEY_LEN]>::try_from(bytes).ok().map(Self)
    }

    /// Parses the 64-character hex form.
    ///
    /// # Errors
    ///
    /// Returns an error when the input is not hex or not 64 characters.
    pub fn parse(hex: &str) -> Result<Self, hex::FromHexError> {
        let mut key = [0u8; PUBLIC_KEY_LEN];
        hex::decode_to_slice(hex, &mut key)?;
        Ok(Self(key))
    }

    /// The truncated form used to address this node inside frames.
    #[must_use]
    pub fn prefix(&self) -> KeyPrefix {
        KeyPrefix::from_slice(&self.0)
    }

    /// Full key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }
}

impl From<[u8; PUBLIC_KEY_LEN]> for PublicKey {
    fn from(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // full keys drown out log lines; the prefix identifies the node
        write!(
            f,
            "PublicKey({}..)",
            hex::encode(&self.0[..PUBLIC_KEY_PREFIX_LEN])
        )
    }
}

/// The 6-byte key prefix the wire protocol addresses nodes with.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct KeyPrefix([u8; PUBLIC_KEY_PREFIX_LEN]);

impl KeyPrefix {
    /// Wraps an exact prefix.
    #[must_use]
    pub const fn new(bytes: [u8; PUBLIC_KEY_PREFIX_LEN]) -> Self {
        Self(bytes)
    }

    /// Copies the leading 6 bytes of a buffer.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is shorter than 6 bytes.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut prefix = [0u8; PUBLIC_KEY_PREFIX_LEN];
        prefix.copy_from_slice(&bytes[..PUBLIC_KEY_PREFIX_LEN]);
        Self(prefix)
    }

    /// Prefix bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The 12-character hex form.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Debug for KeyPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyPrefix({})", self.to_hex())
    }
}

impl std::fmt::Display for KeyPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<&PublicKey> for KeyPrefix {
    fn from(key: &PublicKey) -> Self {
        key.prefix()
    }
}

/// Option bits stored with a contact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContactFlags(u8);

impl ContactFlags {
    /// Messages from this contact are accepted without confirmation.
    pub const TRUSTED: Self = Self(0x01);

    /// Kept out of the device's own contact listings.
    pub const HIDDEN: Self = Self(0x02);

    /// Wraps the raw flag byte of a contact record.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    /// The raw flag byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self.0
    }

    /// True when every bit of `flag` is set.
    #[must_use]
    pub const fn has(self, flag: Self) -> bool {
        (self.0 & flag.0) == flag.0
    }

    /// Union of the two flag sets.
    #[must_use]
    pub const fn with(self, flag: Self) -> Self {
        Self(self.0 | flag.0)
    }
}

/// What kind of node a contact is, taken from its advertisement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ContactType {
    /// Not advertised or not a recognized kind.
    #[default]
    None = 0,
    /// A companion/chat node.
    Chat = 1,
    /// A repeater.
    Repeater = 2,
    /// A room server.
    RoomServer = 3,
    /// A standalone sensor.
    Sensor = 4,
}

impl ContactType {
    /// Maps an advertisement type byte to a contact kind.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            1 => Self::Chat,
            2 => Self::Repeater,
            3 => Self::RoomServer,
            4 => Self::Sensor,
            _ => Self::None,
        }
    }
}

/// One contact record as the radio stores it.
///
/// The wire form is a fixed 147-byte record; `out_path` keeps only the
/// used prefix of the 64-byte route buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    /// Identity key.
    pub public_key: PublicKey,
    /// Node kind from the last advertisement.
    pub device_type: ContactType,
    /// Option bits.
    pub flags: ContactFlags,
    /// Signed route length; [`FLOOD_PATH_LEN`] selects flooding.
    pub out_path_len: i8,
    /// Repeater hashes of the outbound route.
    pub out_path: Bytes,
    /// Display name from the advertisement.
    pub name: String,
    /// When the node last advertised (Unix seconds).
    pub last_advert: u32,
    /// Advertised latitude, when the node shares a position.
    pub latitude: Option<f64>,
    /// Advertised longitude, when the node shares a position.
    pub longitude: Option<f64>,
    /// When this record last changed on the radio.
    pub last_modified: u32,
}

impl Contact {
    /// True when packets to this contact are flooded instead of routed.
    #[must_use]
    pub const fn is_flood(&self) -> bool {
        self.out_path_len < 0
    }

    /// Repeater hops on the stored route; `None` under flooding.
    #[must_use]
    pub fn hops(&self) -> Option<usize> {
        usize::try_from(self.out_path_len).ok()
    }

    /// Advertised position, when both coordinates are set.
    #[must_use]
    pub fn position(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(path_len: i8) -> Contact {
        Contact {
            public_key: PublicKey::new([0x42; 32]),
            device_type: ContactType::Repeater,
            flags: ContactFlags::default(),
            out_path_len: path_len,
            out_path: Bytes::new(),
            name: "r1".into(),
            last_advert: 0,
            latitude: None,
            longitude: None,
            last_modified: 0,
        }
    }

    #[test]
    fn test_key_hex_display_roundtrip() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xDE;
        bytes[31] = 0x01;
        let key = PublicKey::new(bytes);

        let hex = key.to_string();
        assert_eq!(hex.len(), 64);
        assert!(hex.starts_with("de"));
        assert!(hex.ends_with("01"));
        assert_eq!(PublicKey::parse(&hex).unwrap(), key);
    }

    #[test]
    fn test_key_parse_rejects_bad_input() {
        assert!(PublicKey::parse("deadbeef").is_err());
        assert!(PublicKey::parse(&"zz".repeat(32)).is_err());
        assert!(PublicKey::try_from_slice(&[0u8; 31]).is_none());
        assert!(PublicKey::try_from_slice(&[0u8; 33]).is_none());
        assert!(PublicKey::try_from_slice(&[0u8; 32]).is_some());
    }

    #[test]
    fn test_prefix_is_leading_six_bytes() {
        let mut bytes = [0u8; 32];
        bytes[..6].copy_from_slice(&[0xAB, 0xCD, 0xEF, 0x01, 0x23, 0x45]);
        bytes[6] = 0x99; // not part of the prefix

        let prefix = PublicKey::new(bytes).prefix();
        assert_eq!(prefix.as_bytes(), &[0xAB, 0xCD, 0xEF, 0x01, 0x23, 0x45]);
        assert_eq!(prefix.to_hex(), "abcdef012345");
        assert_eq!(KeyPrefix::from(&PublicKey::new(bytes)), prefix);
    }

    #[test]
    fn test_debug_forms_stay_short() {
        let key = PublicKey::new([0xAB; 32]);
        assert_eq!(format!("{key:?}"), "PublicKey(abababababab..)");
        assert_eq!(format!("{:?}", key.prefix()), "KeyPrefix(abababababab)");
    }

    #[test]
    fn test_flag_sets_combine() {
        let flags = ContactFlags::TRUSTED.with(ContactFlags::HIDDEN);
        assert_eq!(flags.as_byte(), 0x03);
        assert!(flags.has(ContactFlags::TRUSTED));
        assert!(flags.has(ContactFlags::HIDDEN));

        assert!(!ContactFlags::default().has(ContactFlags::TRUSTED));
        assert_eq!(ContactFlags::from_byte(0x02), ContactFlags::HIDDEN);
    }

    #[test]
    fn test_contact_type_table() {
        assert_eq!(ContactType::from_byte(0), ContactType::None);
        assert_eq!(ContactType::from_byte(1), ContactType::Chat);
        assert_eq!(ContactType::from_byte(2), ContactType::Repeater);
        assert_eq!(ContactType::from_byte(3), ContactType::RoomServer);
        assert_eq!(ContactType::from_byte(4), ContactType::Sensor);
        assert_eq!(ContactType::from_byte(0xEE), ContactType::None);
    }

    #[test]
    fn test_routing_mode() {
        let flooded = contact(FLOOD_PATH_LEN);
        assert!(flooded.is_flood());
        assert_eq!(flooded.hops(), None);

        let routed = contact(3);
        assert!(!routed.is_flood());
        assert_eq!(routed.hops(), Some(3));
    }

    #[test]
    fn test_position_requires_both_coordinates() {
        let mut c = contact(0);
        assert_eq!(c.position(), None);

        c.latitude = Some(51.5);
        assert_eq!(c.position(), None);

        c.longitude = Some(-1.278);
        assert_eq!(c.position(), Some((51.5, -1.278)));
    }
}
