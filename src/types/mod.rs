//! Data types for `MeshCore` entities.
//!
//! This module contains the core data structures used throughout the library:
//! - Contacts and public keys
//! - Device information and channels
//! - Messages and acknowledgements
//! - Statistics and mesh diagnostics

pub mod contact;
pub mod device;
pub mod message;
pub mod net;
pub mod stats;

pub use contact::{Contact, ContactFlags, ContactType, KeyPrefix, PublicKey};
pub use device::{
    AutoAddConfig, BatteryInfo, ChannelInfo, DeviceInfo, RadioConfig, SelfInfo, StorageInfo,
    TelemetryModes, TuningParams,
};
pub use message::{
    Acknowledgement, ChannelMessage, ContactMessage, MessageSent, SignalQuality, TextType,
};
pub use net::{
    AclEntry, AdvertPath, ControlData, DiscoverResponse, LoginInfo, MmaRecord, Neighbour,
    NeighbourTable, PathDiscovery, Permission, TraceData, TraceNode,
};
pub use stats::{CoreStats, DeviceStatus, PacketStats, RadioStats};
