//! Cayenne LPP (Low Power Payload) decoding.
//!
//! Telemetry payloads are a repeating sequence of
//! `[channel:1][type:1][value: data_size bytes]`. The type table is closed
//! and every numeric field is big-endian, unlike the rest of the protocol.

/// Cayenne LPP sensor types with fixed on-wire widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LppType {
    /// Digital input (1 byte).
    DigitalInput = 0,
    /// Digital output (1 byte).
    DigitalOutput = 1,
    /// Analog input (2 bytes, 0.01 signed).
    AnalogInput = 2,
    /// Analog output (2 bytes, 0.01 signed).
    AnalogOutput = 3,
    /// Generic 4-byte sensor value.
    GenericSensor = 100,
    /// Illuminance in lux (2 bytes).
    Luminosity = 101,
    /// Presence (1 byte).
    Presence = 102,
    /// Temperature in Celsius (2 bytes, 0.1 signed).
    Temperature = 103,
    /// Relative humidity in % (1 byte, 0.5 unsigned).
    Humidity = 104,
    /// Accelerometer in G (6 bytes, 0.001 signed per axis).
    Accelerometer = 113,
    /// Barometric pressure in hPa (2 bytes, 0.1 unsigned).
    Barometer = 115,
    /// Voltage in V (2 bytes, 0.01 unsigned).
    Voltage = 116,
    /// Current in A (2 bytes, 0.001 unsigned).
    Current = 117,
    /// Frequency in Hz (4 bytes).
    Frequency = 118,
    /// Percentage 0-100 (1 byte).
    Percentage = 120,
    /// Altitude in m (2 bytes, 0.01 signed).
    Altitude = 121,
    /// Concentration in ppm (2 bytes).
    Concentration = 125,
    /// Power in W (2 bytes).
    Power = 128,
    /// Distance in m (4 bytes, 0.001 unsigned).
    Distance = 130,
    /// Energy in kWh (4 bytes, 0.001 unsigned).
    Energy = 131,
    /// Direction in degrees (2 bytes).
    Direction = 132,
    /// Unix timestamp (4 bytes).
    UnixTime = 133,
    /// Gyrometer in degrees/s (6 bytes, 0.01 signed per axis).
    Gyrometer = 134,
    /// RGB colour (3 bytes).
    Colour = 135,
    /// GPS location (9 bytes: lat 3, lon 3, alt 3, signed).
    Gps = 136,
    /// Switch state (1 byte).
    Switch = 142,
}

impl LppType {
    /// Maps a raw byte back to an LPP type.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::DigitalInput),
            1 => Some(Self::DigitalOutput),
            2 => Some(Self::AnalogInput),
            3 => Some(Self::AnalogOutput),
            100 => Some(Self::GenericSensor),
            101 => Some(Self::Luminosity),
            102 => Some(Self::Presence),
            103 => Some(Self::Temperature),
            104 => Some(Self::Humidity),
            113 => Some(Self::Accelerometer),
            115 => Some(Self::Barometer),
            116 => Some(Self::Voltage),
            117 => Some(Self::Current),
            118 => Some(Self::Frequency),
            120 => Some(Self::Percentage),
            121 => Some(Self::Altitude),
            125 => Some(Self::Concentration),
            128 => Some(Self::Power),
            130 => Some(Self::Distance),
            131 => Some(Self::Energy),
            132 => Some(Self::Direction),
            133 => Some(Self::UnixTime),
            134 => Some(Self::Gyrometer),
            135 => Some(Self::Colour),
            136 => Some(Self::Gps),
            142 => Some(Self::Switch),
            _ => None,
        }
    }

    /// On-wire width of the value field in bytes.
    #[must_use]
    pub const fn data_size(&self) -> usize {
        match self {
            Self::DigitalInput
            | Self::DigitalOutput
            | Self::Presence
            | Self::Humidity
            | Self::Percentage
            | Self::Switch => 1,
            Self::AnalogInput
            | Self::AnalogOutput
            | Self::Luminosity
            | Self::Temperature
            | Self::Barometer
            | Self::Voltage
            | Self::Current
            | Self::Altitude
            | Self::Concentration
            | Self::Power
            | Self::Direction => 2,
            Self::Colour => 3,
            Self::GenericSensor
            | Self::Frequency
            | Self::Distance
            | Self::Energy
            | Self::UnixTime => 4,
            Self::Accelerometer | Self::Gyrometer => 6,
            Self::Gps => 9,
        }
    }

    /// Decodes a value field of exactly `data_size` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `data` is shorter than `data_size`; callers check first.
    #[must_use]
    pub fn decode_value(&self, data: &[u8]) -> LppValue {
        match self {
            Self::DigitalInput | Self::DigitalOutput | Self::Presence | Self::Switch => {
                LppValue::Digital(data[0] != 0)
            }
            Self::Humidity => LppValue::Float(f64::from(data[0]) / 2.0),
            Self::Percentage => LppValue::Integer(i64::from(data[0])),
            Self::AnalogInput | Self::AnalogOutput => {
                LppValue::Float(f64::from(be_i16(data)) / 100.0)
            }
            Self::Temperature => LppValue::Float(f64::from(be_i16(data)) / 10.0),
            Self::Altitude => LppValue::Float(f64::from(be_i16(data)) / 100.0),
            Self::Barometer => LppValue::Float(f64::from(be_u16(data)) / 10.0),
            Self::Voltage => LppValue::Float(f64::from(be_u16(data)) / 100.0),
            Self::Current => LppValue::Float(f64::from(be_u16(data)) / 1000.0),
            Self::Luminosity | Self::Concentration | Self::Power | Self::Direction => {
                LppValue::Integer(i64::from(be_u16(data)))
            }
            Self::GenericSensor | Self::Frequency => LppValue::Integer(i64::from(be_u32(data))),
            Self::Distance | Self::Energy => LppValue::Float(f64::from(be_u32(data)) / 1000.0),
            Self::UnixTime => LppValue::Timestamp(be_u32(data)),
            Self::Accelerometer => LppValue::Vector3 {
                x: f64::from(be_i16(&data[0..2])) / 1000.0,
                y: f64::from(be_i16(&data[2..4])) / 1000.0,
                z: f64::from(be_i16(&data[4..6])) / 1000.0,
            },
            Self::Gyrometer => LppValue::Vector3 {
                x: f64::from(be_i16(&data[0..2])) / 100.0,
                y: f64::from(be_i16(&data[2..4])) / 100.0,
                z: f64::from(be_i16(&data[4..6])) / 100.0,
            },
            Self::Colour => LppValue::Rgb {
                r: data[0],
                g: data[1],
                b: data[2],
            },
            Self::Gps => LppValue::Gps {
                latitude: f64::from(be_i24(&data[0..3])) / 10000.0,
                longitude: f64::from(be_i24(&data[3..6])) / 10000.0,
                altitude: f64::from(be_i24(&data[6..9])) / 100.0,
            },
        }
    }
}

fn be_u16(data: &[u8]) -> u16 {
    u16::from_be_bytes([data[0], data[1]])
}

fn be_i16(data: &[u8]) -> i16 {
    i16::from_be_bytes([data[0], data[1]])
}

fn be_u32(data: &[u8]) -> u32 {
    u32::from_be_bytes([data[0], data[1], data[2], data[3]])
}

/// Sign-extends a 24-bit big-endian value to 32 bits.
fn be_i24(data: &[u8]) -> i32 {
    let fill = if data[0] & 0x80 != 0 { 0xFF } else { 0x00 };
    i32::from_be_bytes([fill, data[0], data[1], data[2]])
}

/// A decoded sensor value.
#[derive(Debug, Clone, PartialEq)]
pub enum LppValue {
    /// Boolean state (digital I/O, presence, switch).
    Digital(bool),
    /// Integral reading (lux, Hz, W, degrees, ppm, %, raw sensor).
    Integer(i64),
    /// Scaled reading (temperature, voltage, pressure, ...).
    Float(f64),
    /// Three-axis reading (accelerometer, gyrometer).
    Vector3 { x: f64, y: f64, z: f64 },
    /// GPS fix.
    Gps {
        latitude: f64,
        longitude: f64,
        altitude: f64,
    },
    /// RGB colour.
    Rgb { r: u8, g: u8, b: u8 },
    /// Seconds since the Unix epoch.
    Timestamp(u32),
}

/// A telemetry reading with channel and type info.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryReading {
    /// Channel number.
    pub channel: u8,
    /// LPP sensor type.
    pub lpp_type: LppType,
    /// Decoded value.
    pub value: LppValue,
}

/// Decodes an LPP stream into readings.
///
/// An unknown type code or a truncated value field terminates decoding;
/// everything decoded up to that point is returned.
#[must_use]
pub fn decode_stream(data: &[u8]) -> Vec<TelemetryReading> {
    let mut readings = Vec::new();
    let mut pos = 0;

    while pos + 2 <= data.len() {
        let channel = data[pos];
        let Some(lpp_type) = LppType::from_byte(data[pos + 1]) else {
            tracing::debug!(
                "unknown LPP type 0x{:02X} at offset {pos}, stopping",
                data[pos + 1]
            );
            break;
        };
        pos += 2;

        let size = lpp_type.data_size();
        if pos + size > data.len() {
            break;
        }

        readings.push(TelemetryReading {
            channel,
            lpp_type,
            value: lpp_type.decode_value(&data[pos..pos + size]),
        });
        pos += size;
    }

    readings
}

/// A decoded telemetry response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Telemetry {
    /// All readings in wire order.
    pub readings: Vec<TelemetryReading>,
}

impl Telemetry {
    /// Decodes an LPP payload.
    #[must_use]
    pub fn from_lpp(data: &[u8]) -> Self {
        Self {
            readings: decode_stream(data),
        }
    }

    /// Gets the first temperature reading.
    #[must_use]
    pub fn temperature(&self) -> Option<f64> {
        self.readings.iter().find_map(|r| {
            if r.lpp_type == LppType::Temperature {
                if let LppValue::Float(t) = r.value {
                    return Some(t);
                }
            }
            None
        })
    }

    /// Gets the first voltage reading.
    #[must_use]
    pub fn voltage(&self) -> Option<f64> {
        self.readings.iter().find_map(|r| {
            if r.lpp_type == LppType::Voltage {
                if let LppValue::Float(v) = r.value {
                    return Some(v);
                }
            }
            None
        })
    }

    /// Gets the first GPS reading.
    #[must_use]
    pub fn gps(&self) -> Option<(f64, f64, f64)> {
        self.readings.iter().find_map(|r| {
            if let LppValue::Gps {
                latitude,
                longitude,
                altitude,
            } = r.value
            {
                Some((latitude, longitude, altitude))
            } else {
                None
            }
        })
    }
}
