//! # meshcore-companion
//!
//! An async Rust client for the `MeshCore` companion-radio wire protocol.
//!
//! The crate speaks the binary, length-framed, request/response plus
//! asynchronous-push protocol that a host application uses to drive a LoRa
//! mesh radio over a datagram-preserving link (serial, TCP, BLE).
//!
//! ## Quick Start
//!
//! ```no_run
//! use meshcore_companion::{Session, SessionConfig, SerialTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), meshcore_companion::Error> {
//!     let transport = SerialTransport::with_port("/dev/ttyUSB0");
//!     let session = Session::start(transport, SessionConfig::default()).await?;
//!
//!     println!("Connected to: {}", session.self_info().name);
//!     println!("Public key: {}", session.self_info().public_key);
//!
//!     // Unsolicited pushes (advertisements, messages, acks, ...) arrive
//!     // on the event stream.
//!     let mut events = session.events();
//!     tokio::spawn(async move {
//!         while let Some(event) = events.recv().await {
//!             println!("push: {event:?}");
//!         }
//!     });
//!
//!     let battery = session.get_battery().await?;
//!     println!("Battery: {}mV", battery.millivolts);
//!
//!     session.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`protocol`] - Wire codec: command builders, response parsing,
//!   length-prefix framing, Cayenne LPP telemetry
//! - [`types`] - Data structures (contacts, devices, messages, statistics)
//! - [`transport`] - The byte-transport abstraction and the serial driver
//! - [`event`] - The event sum type and subscriber streams
//! - [`session`] - The session core: single-in-flight commands, ack
//!   correlation, push demultiplexing

pub mod error;
pub mod event;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use error::{Error, FrameError, ProtocolError, Result};
pub use event::{ConnectionState, Event, EventStream, StatsData};
pub use protocol::{
    BinaryReqType, CommandOpcode, LppType, LppValue, MessageKind, ResponseCategory, ResponseCode,
    StatsType, Telemetry, TelemetryReading,
};
pub use session::{Session, SessionConfig};
pub use transport::{SerialTransport, Transport, serial::list_ports};
pub use types::{
    Acknowledgement, AutoAddConfig, BatteryInfo, ChannelInfo, ChannelMessage, Contact,
    ContactFlags, ContactMessage, ContactType, CoreStats, DeviceInfo, DeviceStatus, KeyPrefix,
    LoginInfo, MessageSent, PacketStats, PathDiscovery, Permission, PublicKey, RadioConfig,
    RadioStats, SelfInfo, SignalQuality, TextType, TraceData, TraceNode, TuningParams,
};
