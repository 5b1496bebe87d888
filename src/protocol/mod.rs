//! Protocol definitions for `MeshCore` companion-radio communication.
//!
//! This module contains the low-level protocol pieces:
//! - Command opcodes and frame construction
//! - Response codes with category routing
//! - Length-prefix framing for byte-stream transports
//! - Received-frame parsing
//! - Cayenne LPP telemetry decoding

pub mod builder;
pub mod command;
pub mod frame;
pub mod lpp;
pub mod parser;
pub mod response;

pub use command::{BinaryReqType, CommandOpcode, ControlDataType, MessageKind, StatsType};
pub use frame::{FrameDecoder, MAX_FRAME_SIZE, encode as encode_frame};
pub use lpp::{LppType, LppValue, Telemetry, TelemetryReading};
pub use parser::parse_frame;
pub use response::{ResponseCategory, ResponseCode};
