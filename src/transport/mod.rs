//! Transport layer for `MeshCore` communication.
//!
//! The session consumes this abstraction and never touches concrete I/O.
//! Stream transports (serial, TCP) yield arbitrary byte chunks and are
//! wrapped with the length-prefix frame codec; datagram transports (BLE
//! notify) preserve frame boundaries and bypass it.

pub mod serial;

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::Result;

/// Incoming byte chunks from a transport. Ends on EOF; yields an error and
/// then ends when the link fails.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Trait for transport implementations.
pub trait Transport: Send + Sync + 'static {
    /// Connects to the device.
    fn connect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Takes the incoming byte-chunk stream.
    ///
    /// Can only be called once per connection; the session's receive loop
    /// owns the result.
    ///
    /// # Errors
    ///
    /// Returns an error if not connected or the stream was already taken.
    fn incoming(&mut self) -> Result<ByteStream>;

    /// Writes one outbound buffer; may suspend.
    fn send(&self, data: Bytes) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Closes the transport. Idempotent.
    fn close(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Returns true if connected.
    fn is_connected(&self) -> bool;

    /// Whether reads/writes already carry whole frames. Stream transports
    /// return false and get the length-prefix codec applied by the session.
    fn preserves_frame_boundaries(&self) -> bool {
        false
    }
}

pub use serial::SerialTransport;
