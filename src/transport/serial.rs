//! Serial/USB transport implementation.
//!
//! Byte-stream transport for `MeshCore` radios connected via USB. Chunks
//! read from the port are handed to the session as-is; the session applies
//! the frame codec.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use crate::error::{Error, Result};
use crate::transport::{ByteStream, Transport};

/// Default baud rate for `MeshCore` devices.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default connection delay.
pub const DEFAULT_CONNECTION_DELAY: Duration = Duration::from_millis(300);

/// Configuration for serial transport.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Serial port path (e.g., "/dev/ttyUSB0" or "COM3").
    pub port: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Delay after connection before sending commands.
    pub connection_delay: Duration,
}

impl SerialConfig {
    /// Creates a new serial configuration with default settings.
    #[must_use]
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            connection_delay: DEFAULT_CONNECTION_DELAY,
        }
    }

    /// Sets the baud rate.
    #[must_use]
    pub const fn baud_rate(mut self, rate: u32) -> Self {
        self.baud_rate = rate;
        self
    }

    /// Sets the connection delay.
    #[must_use]
    pub const fn connection_delay(mut self, delay: Duration) -> Self {
        self.connection_delay = delay;
        self
    }
}

/// Serial transport for `MeshCore` communication.
///
/// The stream is split after connect: the write half stays behind a lock
/// for outbound frames, the read half is handed out as a chunk stream.
pub struct SerialTransport {
    config: SerialConfig,
    writer: Arc<Mutex<Option<WriteHalf<SerialStream>>>>,
    reader: Option<ReadHalf<SerialStream>>,
    connected: Arc<AtomicBool>,
}

impl SerialTransport {
    /// Creates a new serial transport with the given configuration.
    #[must_use]
    pub fn new(config: SerialConfig) -> Self {
        Self {
            config,
            writer: Arc::new(Mutex::new(None)),
            reader: None,
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Creates a new serial transport for the given port with default
    /// settings.
    #[must_use]
    pub fn with_port(port: impl Into<String>) -> Self {
        Self::new(SerialConfig::new(port))
    }
}

impl Transport for SerialTransport {
    fn connect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            if self.connected.load(Ordering::SeqCst) {
                return Ok(());
            }

            tracing::info!("connecting to serial port: {}", self.config.port);

            let mut stream = tokio_serial::new(&self.config.port, self.config.baud_rate)
                .open_native_async()
                .map_err(Error::Serial)?;

            // RTS must stay low for the radio's boot strap pins
            if let Err(e) = tokio_serial::SerialPort::write_request_to_send(&mut stream, false) {
                tracing::warn!("failed to set RTS: {}", e);
            }

            // Wait for device to be ready
            tokio::time::sleep(self.config.connection_delay).await;

            // Drain any stale data from the device buffer; some devices send
            // data shortly after the port opens.
            let mut buf = [0u8; 1024];
            let mut total_drained = 0usize;
            let drain_deadline = tokio::time::Instant::now() + Duration::from_millis(500);
            while tokio::time::Instant::now() < drain_deadline {
                match tokio::time::timeout(Duration::from_millis(20), stream.read(&mut buf)).await
                {
                    Ok(Ok(n)) if n > 0 => {
                        total_drained += n;
                    }
                    _ => {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
            if total_drained > 0 {
                tracing::debug!("drained {} stale bytes from buffer", total_drained);
            }

            let (reader, writer) = tokio::io::split(stream);
            self.reader = Some(reader);
            *self.writer.lock().await = Some(writer);
            self.connected.store(true, Ordering::SeqCst);

            tracing::info!("connected to serial port");
            Ok(())
        })
    }

    fn incoming(&mut self) -> Result<ByteStream> {
        let reader = self.reader.take().ok_or(Error::NotConnected)?;
        let connected = Arc::clone(&self.connected);

        Ok(Box::pin(futures::stream::unfold(
            Some(reader),
            move |state| {
                let connected = Arc::clone(&connected);
                async move {
                    let mut reader = state?;
                    let mut buf = vec![0u8; 1024];
                    match reader.read(&mut buf).await {
                        Ok(0) => {
                            tracing::debug!("serial port closed");
                            connected.store(false, Ordering::SeqCst);
                            None
                        }
                        Ok(n) => {
                            buf.truncate(n);
                            Some((Ok(Bytes::from(buf)), Some(reader)))
                        }
                        Err(e) => {
                            tracing::error!("serial read error: {}", e);
                            connected.store(false, Ordering::SeqCst);
                            Some((Err(Error::Receive(e)), None))
                        }
                    }
                }
            },
        )))
    }

    fn send(&self, data: Bytes) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let writer = Arc::clone(&self.writer);
        Box::pin(async move {
            let mut guard = writer.lock().await;
            let writer = guard.as_mut().ok_or(Error::NotConnected)?;

            tracing::trace!("sending {} bytes", data.len());
            writer.write_all(&data).await.map_err(Error::Send)?;
            writer.flush().await.map_err(Error::Send)?;
            Ok(())
        })
    }

    fn close(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let writer = Arc::clone(&self.writer);
        let connected = Arc::clone(&self.connected);
        Box::pin(async move {
            if writer.lock().await.take().is_some() {
                tracing::info!("disconnecting from serial port");
            }
            connected.store(false, Ordering::SeqCst);
            Ok(())
        })
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Lists available serial ports.
///
/// # Errors
///
/// Returns an error if the port list cannot be retrieved.
pub fn list_ports() -> Result<Vec<String>> {
    let ports = tokio_serial::available_ports().map_err(Error::Serial)?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}
