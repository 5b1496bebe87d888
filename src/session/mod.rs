//! Session layer: owns the transport, multiplexes commands against pushes.
//!
//! One [`Session`] drives one radio. Commands are serialized (exactly one
//! in flight), replies resolve oneshot waiters registered in the pending
//! table, and unsolicited pushes fan out to [`EventStream`] subscribers in
//! wire order. A session that disconnects is finished; callers construct a
//! fresh one to reconnect.

mod pending;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::event::{ConnectionState, Event, EventStream, StatsData};
use crate::protocol::command::{BinaryReqType, ControlDataType, StatsType};
use crate::protocol::lpp::Telemetry;
use crate::protocol::parser::{self, parse_frame};
use crate::protocol::response::ResponseCode;
use crate::protocol::{FrameDecoder, builder, encode_frame};
use crate::session::pending::{BinaryRequestInfo, Pending};
use crate::transport::{ByteStream, Transport};
use crate::types::{
    Acknowledgement, AdvertPath, AutoAddConfig, BatteryInfo, ChannelInfo, Contact, CoreStats,
    DeviceInfo, MessageSent, PacketStats, PublicKey, RadioStats, SelfInfo, TelemetryModes,
    TuningParams,
};

const OK_OR_ERR: &[ResponseCode] = &[ResponseCode::Ok, ResponseCode::Error];

/// Gets the current Unix timestamp as a u32.
fn current_timestamp() -> u32 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| u32::try_from(d.as_secs()).unwrap_or(u32::MAX))
        .unwrap_or(0)
}

/// Session tunables.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Client identifier sent in the start handshake (at most 5 bytes).
    pub client_id: String,
    /// How long to wait for a solicited response.
    pub command_timeout: Duration,
    /// How long to wait for the transport to open.
    pub connect_timeout: Duration,
    /// How long a single outbound write may take.
    pub send_timeout: Duration,
    /// Push-event queue capacity per subscriber; on overflow the oldest
    /// events are dropped and surfaced as [`Event::EventsLost`].
    pub event_capacity: usize,
    /// How long a binary request context stays correlatable.
    pub binary_context_ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            client_id: "mccli".into(),
            command_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            send_timeout: Duration::from_secs(5),
            event_capacity: 256,
            binary_context_ttl: Duration::from_secs(30),
        }
    }
}

struct Shared {
    config: SessionConfig,
    transport: Arc<dyn Transport>,
    framed: bool,
    pending: Pending,
    /// Serializes whole command round trips: exactly one in flight,
    /// concurrent callers queue here.
    command_gate: Mutex<()>,
    /// Serializes raw outbound writes.
    write_lock: Mutex<()>,
    events: StdMutex<Option<broadcast::Sender<Event>>>,
    state: StdMutex<ConnectionState>,
    next_tag: AtomicU32,
}

impl Shared {
    fn state(&self) -> ConnectionState {
        *self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn set_state(&self, new: ConnectionState) {
        {
            let mut state = self
                .state
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if *state == new {
                return;
            }
            *state = new;
        }
        self.dispatch(Event::ConnectionState(new));
    }

    fn dispatch(&self, event: Event) {
        let guard = self
            .events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(sender) = guard.as_ref() {
            // No receivers is fine
            let _ = sender.send(event);
        }
    }

    fn subscribe(&self) -> EventStream {
        let guard = self
            .events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match guard.as_ref() {
            Some(sender) => EventStream::new(sender.subscribe()),
            None => {
                // Already disconnected: hand out a stream that ends at once.
                let (sender, receiver) = broadcast::channel(1);
                drop(sender);
                EventStream::new(receiver)
            }
        }
    }

    /// Terminal transition: fails every waiter and ends the event streams.
    fn shutdown(&self) {
        if self.state() == ConnectionState::Disconnected {
            return;
        }
        self.pending.fail_all();
        self.set_state(ConnectionState::Disconnected);
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
    }

    fn next_tag(&self) -> u32 {
        self.next_tag.fetch_add(1, Ordering::SeqCst)
    }

    async fn write_frame(&self, payload: Bytes) -> Result<()> {
        if self.state() == ConnectionState::Disconnected {
            return Err(Error::Disconnected);
        }
        let frame = if self.framed {
            encode_frame(&payload)
        } else {
            payload
        };
        let _write = self.write_lock.lock().await;
        let timeout = self.config.send_timeout;
        match tokio::time::timeout(timeout, self.transport.send(frame)).await {
            Ok(result) => result,
            Err(_) => Err(Error::SendTimeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    /// Sends a command and suspends until a response with an expected code,
    /// a transport failure, or the command timeout.
    async fn send_and_await(
        &self,
        payload: Bytes,
        expected: &[ResponseCode],
        binary: Option<BinaryRequestInfo>,
    ) -> Result<Event> {
        let _gate = self.command_gate.lock().await;
        if self.state() == ConnectionState::Disconnected {
            return Err(Error::Disconnected);
        }

        let (_guard, receiver) = self.pending.register_command(expected.to_vec(), binary);
        self.write_frame(payload).await?;

        let timeout = self.config.command_timeout;
        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(event)) => Ok(event),
            Ok(Err(_)) => Err(Error::Disconnected),
            Err(_) => Err(Error::Timeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    /// Sends a command whose reply arrives as a push; still holds the
    /// command gate so ordering guarantees are preserved.
    async fn send_and_await_push<F>(&self, payload: Bytes, matcher: F) -> Result<Event>
    where
        F: Fn(&Event) -> bool,
    {
        let _gate = self.command_gate.lock().await;
        if self.state() == ConnectionState::Disconnected {
            return Err(Error::Disconnected);
        }

        let mut events = self.subscribe();
        self.write_frame(payload).await?;

        let timeout = self.config.command_timeout;
        let wait = async {
            loop {
                match events.recv().await {
                    Some(event) if matcher(&event) => return Ok(event),
                    Some(_) => {}
                    None => return Err(Error::Disconnected),
                }
            }
        };
        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    /// Routes one parsed event per the demultiplexing rules.
    fn route(&self, event: Event) {
        let Some(code) = event.response_code() else {
            // Parse failures never resolve waiters.
            self.dispatch(event);
            return;
        };

        if code.is_push() {
            match &event {
                Event::Ack(ack) => {
                    if self.pending.resolve_ack(ack) {
                        tracing::trace!("ack 0x{:08X} resolved its waiter", ack.code);
                    }
                }
                Event::BinaryResponse {
                    request_type,
                    tag,
                    payload,
                } => {
                    if let Some(info) = self.pending.take_binary(*tag) {
                        let request_type = BinaryReqType::from_byte(*request_type)
                            .unwrap_or(info.request_type);
                        match parser::parse_binary_payload(
                            request_type,
                            info.pubkey_prefix,
                            info.neighbour_prefix_len,
                            payload,
                        ) {
                            Ok(enriched) => {
                                self.dispatch(enriched);
                                return;
                            }
                            Err(err) => {
                                tracing::warn!(
                                    "binary response for tag {tag} failed to decode: {err}"
                                );
                            }
                        }
                    } else {
                        tracing::debug!("binary response with unknown tag {tag}, delivering raw");
                    }
                }
                _ => {}
            }
            // Pushes never satisfy command waiters; a resolved ack is also
            // delivered to subscribers.
            self.dispatch(event);
        } else if !self.pending.resolve_command(code, &event) {
            tracing::debug!(
                "out-of-order response 0x{:02X} routed to subscribers",
                code as u8
            );
            self.dispatch(event);
        }
    }
}

async fn receive_loop(shared: Arc<Shared>, mut incoming: ByteStream, framed: bool) {
    let mut decoder = FrameDecoder::new();

    'outer: while let Some(chunk) = incoming.next().await {
        match chunk {
            Ok(chunk) => {
                if framed {
                    decoder.feed(&chunk);
                    loop {
                        match decoder.decode() {
                            Ok(Some(frame)) => shared.route(parse_frame(&frame)),
                            Ok(None) => break,
                            Err(err) => {
                                // Over-long frame: the stream is out of sync,
                                // nothing downstream can be trusted.
                                tracing::error!("fatal frame error, closing session: {err}");
                                break 'outer;
                            }
                        }
                    }
                } else {
                    shared.route(parse_frame(&chunk));
                }
            }
            Err(err) => {
                tracing::warn!("transport receive failed: {err}");
                break;
            }
        }
    }

    let _ = shared.transport.close().await;
    shared.shutdown();
}

fn unexpected(event: &Event) -> Error {
    Error::UnexpectedResponse {
        code: event.response_code().map_or(0xFF, |code| code as u8),
    }
}

fn ok_or_err(event: Event) -> Result<()> {
    match event {
        Event::Ok { .. } => Ok(()),
        Event::Error { code } => Err(Error::Firmware { code }),
        other => Err(unexpected(&other)),
    }
}

/// An established companion-radio session.
pub struct Session {
    shared: Arc<Shared>,
    self_info: SelfInfo,
    reader: JoinHandle<()>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("self_info", &self.self_info)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Opens the transport, starts the receive loop and runs the start
    /// handshake. Returns once the session is ready for commands.
    pub async fn start<T: Transport>(mut transport: T, config: SessionConfig) -> Result<Self> {
        let connect_timeout = config.connect_timeout;
        match tokio::time::timeout(connect_timeout, transport.connect()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::ConnectTimeout {
                    timeout_ms: u64::try_from(connect_timeout.as_millis()).unwrap_or(u64::MAX),
                });
            }
        }

        let incoming = transport.incoming()?;
        let framed = !transport.preserves_frame_boundaries();
        let transport: Arc<dyn Transport> = Arc::new(transport);

        let (events_tx, _) = broadcast::channel(config.event_capacity.max(1));
        let binary_ttl = config.binary_context_ttl;
        let shared = Arc::new(Shared {
            config,
            transport,
            framed,
            pending: Pending::new(binary_ttl),
            command_gate: Mutex::new(()),
            write_lock: Mutex::new(()),
            events: StdMutex::new(Some(events_tx)),
            state: StdMutex::new(ConnectionState::Connecting),
            next_tag: AtomicU32::new(1),
        });
        shared.set_state(ConnectionState::Connected);

        let reader = tokio::spawn(receive_loop(Arc::clone(&shared), incoming, framed));

        let handshake = shared
            .send_and_await(
                builder::app_start(&shared.config.client_id),
                &[ResponseCode::SelfInfo, ResponseCode::Error],
                None,
            )
            .await;

        let self_info = match handshake {
            Ok(Event::SelfInfo(info)) => *info,
            Ok(Event::Error { code }) => {
                let _ = shared.transport.close().await;
                shared.shutdown();
                reader.abort();
                return Err(Error::Firmware { code });
            }
            Ok(other) => {
                let _ = shared.transport.close().await;
                shared.shutdown();
                reader.abort();
                return Err(unexpected(&other));
            }
            Err(err) => {
                let _ = shared.transport.close().await;
                shared.shutdown();
                reader.abort();
                return Err(err);
            }
        };

        shared.set_state(ConnectionState::Ready);
        tracing::info!("session ready: {}", self_info.name);

        Ok(Self {
            shared,
            self_info,
            reader,
        })
    }

    /// Device info captured during the start handshake.
    #[must_use]
    pub const fn self_info(&self) -> &SelfInfo {
        &self.self_info
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Returns true while the transport is up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.transport.is_connected()
            && self.shared.state() != ConnectionState::Disconnected
    }

    /// Subscribes to push and lifecycle events. The stream ends when the
    /// session reaches `Disconnected`.
    #[must_use]
    pub fn events(&self) -> EventStream {
        self.shared.subscribe()
    }

    /// Closes the transport and finishes the session.
    pub async fn close(&self) {
        let _ = self.shared.transport.close().await;
        self.shared.shutdown();
        self.reader.abort();
    }

    // ==================== Device Commands ====================

    /// Gets the current device time.
    pub async fn get_time(&self) -> Result<u32> {
        let event = self
            .shared
            .send_and_await(
                builder::get_time(),
                &[ResponseCode::CurrentTime, ResponseCode::Error],
                None,
            )
            .await?;
        match event {
            Event::CurrentTime(time) => Ok(time),
            Event::Error { code } => Err(Error::Firmware { code }),
            other => Err(unexpected(&other)),
        }
    }

    /// Sets the device time.
    pub async fn set_time(&self, timestamp: u32) -> Result<()> {
        ok_or_err(
            self.shared
                .send_and_await(builder::set_time(timestamp), OK_OR_ERR, None)
                .await?,
        )
    }

    /// Sets the device time to the current system time.
    pub async fn sync_time(&self) -> Result<()> {
        self.set_time(current_timestamp()).await
    }

    /// Gets the battery status.
    pub async fn get_battery(&self) -> Result<BatteryInfo> {
        let event = self
            .shared
            .send_and_await(
                builder::get_battery(),
                &[ResponseCode::Battery, ResponseCode::Error],
                None,
            )
            .await?;
        match event {
            Event::Battery(battery) => Ok(battery),
            Event::Error { code } => Err(Error::Firmware { code }),
            other => Err(unexpected(&other)),
        }
    }

    /// Queries device information.
    pub async fn device_query(&self) -> Result<DeviceInfo> {
        let event = self
            .shared
            .send_and_await(
                builder::device_query(),
                &[ResponseCode::DeviceInfo, ResponseCode::Error],
                None,
            )
            .await?;
        match event {
            Event::DeviceInfo(info) => Ok(*info),
            Event::Error { code } => Err(Error::Firmware { code }),
            other => Err(unexpected(&other)),
        }
    }

    /// Sends an advertisement; floods the mesh when `flood` is set.
    pub async fn send_advert(&self, flood: bool) -> Result<()> {
        ok_or_err(
            self.shared
                .send_and_await(builder::send_advert(flood), OK_OR_ERR, None)
                .await?,
        )
    }

    /// Sets the device name.
    pub async fn set_name(&self, name: &str) -> Result<()> {
        ok_or_err(
            self.shared
                .send_and_await(builder::set_name(name), OK_OR_ERR, None)
                .await?,
        )
    }

    /// Sets the device coordinates in decimal degrees.
    ///
    /// The wire format uses 0 as "no coordinate", so exactly (0.0, 0.0)
    /// reads back as unset.
    pub async fn set_coords(&self, latitude: f64, longitude: f64) -> Result<()> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(Error::InvalidCoordinates {
                reason: format!("latitude {latitude} out of range (-90 to 90)"),
            });
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(Error::InvalidCoordinates {
                reason: format!("longitude {longitude} out of range (-180 to 180)"),
            });
        }
        ok_or_err(
            self.shared
                .send_and_await(builder::set_coords(latitude, longitude), OK_OR_ERR, None)
                .await?,
        )
    }

    /// Sets the TX power in dBm.
    pub async fn set_tx_power(&self, dbm: u32) -> Result<()> {
        ok_or_err(
            self.shared
                .send_and_await(builder::set_tx_power(dbm), OK_OR_ERR, None)
                .await?,
        )
    }

    /// Sets radio parameters.
    ///
    /// # Arguments
    ///
    /// * `freq_mhz` - Frequency in MHz (e.g., 868.0)
    /// * `bw_khz` - Bandwidth in kHz (e.g., 125.0)
    /// * `sf` - Spreading factor (6-12)
    /// * `cr` - Coding rate (5-8)
    pub async fn set_radio(&self, freq_mhz: f64, bw_khz: f64, sf: u8, cr: u8) -> Result<()> {
        let freq_khz = u32::try_from(((freq_mhz * 1000.0).round() as i64).max(0)).unwrap_or(0);
        let bw_hz = u32::try_from(((bw_khz * 1000.0).round() as i64).max(0)).unwrap_or(0);
        ok_or_err(
            self.shared
                .send_and_await(builder::set_radio(freq_khz, bw_hz, sf, cr), OK_OR_ERR, None)
                .await?,
        )
    }

    /// Sets tuning parameters.
    pub async fn set_tuning(&self, rx_delay: u32, airtime_factor: u32) -> Result<()> {
        ok_or_err(
            self.shared
                .send_and_await(builder::set_tuning(rx_delay, airtime_factor), OK_OR_ERR, None)
                .await?,
        )
    }

    /// Gets the tuning parameters.
    pub async fn get_tuning_params(&self) -> Result<TuningParams> {
        let event = self
            .shared
            .send_and_await(
                builder::get_tuning_params(),
                &[ResponseCode::TuningParams, ResponseCode::Error],
                None,
            )
            .await?;
        match event {
            Event::TuningParams(params) => Ok(params),
            Event::Error { code } => Err(Error::Firmware { code }),
            other => Err(unexpected(&other)),
        }
    }

    /// Sets the device PIN (for BLE pairing).
    pub async fn set_device_pin(&self, pin: u32) -> Result<()> {
        ok_or_err(
            self.shared
                .send_and_await(builder::set_device_pin(pin), OK_OR_ERR, None)
                .await?,
        )
    }

    /// Sets miscellaneous parameters; `multi_acks` is only transmitted when
    /// supplied.
    pub async fn set_other_params(
        &self,
        manual_add_contacts: bool,
        telemetry_modes: TelemetryModes,
        advert_loc_policy: u8,
        multi_acks: Option<u8>,
    ) -> Result<()> {
        ok_or_err(
            self.shared
                .send_and_await(
                    builder::set_other_params(
                        manual_add_contacts,
                        telemetry_modes,
                        advert_loc_policy,
                        multi_acks,
                    ),
                    OK_OR_ERR,
                    None,
                )
                .await?,
        )
    }

    /// Reboots the device.
    pub async fn reboot(&self) -> Result<()> {
        ok_or_err(
            self.shared
                .send_and_await(builder::reboot(), OK_OR_ERR, None)
                .await?,
        )
    }

    /// Factory-resets the device.
    pub async fn factory_reset(&self) -> Result<()> {
        ok_or_err(
            self.shared
                .send_and_await(builder::factory_reset(), OK_OR_ERR, None)
                .await?,
        )
    }

    /// Exports the device's private key; `None` when the feature is
    /// disabled.
    pub async fn export_private_key(&self) -> Result<Option<[u8; 64]>> {
        let event = self
            .shared
            .send_and_await(
                builder::export_private_key(),
                &[
                    ResponseCode::PrivateKey,
                    ResponseCode::Disabled,
                    ResponseCode::Error,
                ],
                None,
            )
            .await?;
        match event {
            Event::PrivateKey(key) => Ok(Some(key)),
            Event::Disabled => Ok(None),
            Event::Error { code } => Err(Error::Firmware { code }),
            other => Err(unexpected(&other)),
        }
    }

    /// Imports a private key.
    pub async fn import_private_key(&self, key: &[u8]) -> Result<()> {
        ok_or_err(
            self.shared
                .send_and_await(builder::import_private_key(key), OK_OR_ERR, None)
                .await?,
        )
    }

    /// Gets device statistics of the requested kind.
    pub async fn get_stats(&self, stats_type: StatsType) -> Result<StatsData> {
        let event = self
            .shared
            .send_and_await(
                builder::get_stats(stats_type),
                &[ResponseCode::Stats, ResponseCode::Error],
                None,
            )
            .await?;
        match event {
            Event::Stats(stats) => Ok(stats),
            Event::Error { code } => Err(Error::Firmware { code }),
            other => Err(unexpected(&other)),
        }
    }

    /// Gets core statistics.
    pub async fn get_core_stats(&self) -> Result<CoreStats> {
        match self.get_stats(StatsType::Core).await? {
            StatsData::Core(stats) => Ok(stats),
            _ => Err(Error::UnexpectedResponse {
                code: ResponseCode::Stats as u8,
            }),
        }
    }

    /// Gets radio statistics.
    pub async fn get_radio_stats(&self) -> Result<RadioStats> {
        match self.get_stats(StatsType::Radio).await? {
            StatsData::Radio(stats) => Ok(stats),
            _ => Err(Error::UnexpectedResponse {
                code: ResponseCode::Stats as u8,
            }),
        }
    }

    /// Gets packet statistics.
    pub async fn get_packet_stats(&self) -> Result<PacketStats> {
        match self.get_stats(StatsType::Packets).await? {
            StatsData::Packets(stats) => Ok(stats),
            _ => Err(Error::UnexpectedResponse {
                code: ResponseCode::Stats as u8,
            }),
        }
    }

    /// Gets custom variables as a `key:value` list.
    pub async fn get_custom_vars(&self) -> Result<String> {
        let event = self
            .shared
            .send_and_await(
                builder::get_custom_vars(),
                &[ResponseCode::CustomVars, ResponseCode::Error],
                None,
            )
            .await?;
        match event {
            Event::CustomVars(vars) => Ok(vars),
            Event::Error { code } => Err(Error::Firmware { code }),
            other => Err(unexpected(&other)),
        }
    }

    /// Sets a custom variable.
    pub async fn set_custom_var(&self, key: &str, value: &str) -> Result<()> {
        ok_or_err(
            self.shared
                .send_and_await(builder::set_custom_var(key, value), OK_OR_ERR, None)
                .await?,
        )
    }

    /// Sets the auto-add configuration.
    pub async fn set_auto_add_config(&self, config: AutoAddConfig) -> Result<()> {
        ok_or_err(
            self.shared
                .send_and_await(builder::set_auto_add_config(config), OK_OR_ERR, None)
                .await?,
        )
    }

    /// Gets the auto-add configuration.
    pub async fn get_auto_add_config(&self) -> Result<AutoAddConfig> {
        let event = self
            .shared
            .send_and_await(builder::get_auto_add_config(), OK_OR_ERR, None)
            .await?;
        match event {
            Event::Ok { data } => data.first().copied().map(AutoAddConfig::from_byte).ok_or(
                Error::UnexpectedResponse {
                    code: ResponseCode::Ok as u8,
                },
            ),
            Event::Error { code } => Err(Error::Firmware { code }),
            other => Err(unexpected(&other)),
        }
    }

    // ==================== Contact Commands ====================

    /// Fetches the contact list, optionally restricted to contacts modified
    /// after `since`. Individual contacts are also observable on the event
    /// stream while the fetch runs.
    pub async fn fetch_contacts(&self, since: Option<u32>) -> Result<Vec<Contact>> {
        let mut events = self.events();
        let mut contacts = Vec::new();

        let send_fut = self.shared.send_and_await(
            builder::get_contacts(since),
            &[ResponseCode::ContactsEnd, ResponseCode::Error],
            None,
        );
        tokio::pin!(send_fut);

        let end = loop {
            tokio::select! {
                result = &mut send_fut => break result?,
                maybe = events.recv() => match maybe {
                    Some(Event::Contact(contact)) => contacts.push(*contact),
                    Some(_) => {}
                    None => return Err(Error::Disconnected),
                },
            }
        };

        match end {
            Event::ContactsEnd { .. } => {
                // Contacts broadcast before the end marker may still sit in
                // our queue.
                while let Some(event) = events.try_recv() {
                    if let Event::Contact(contact) = event {
                        contacts.push(*contact);
                    }
                }
                Ok(contacts)
            }
            Event::Error { code } => Err(Error::Firmware { code }),
            other => Err(unexpected(&other)),
        }
    }

    /// Gets a single contact by its public key.
    pub async fn get_contact_by_key(&self, public_key: &PublicKey) -> Result<Contact> {
        let event = self
            .shared
            .send_and_await(
                builder::get_contact_by_key(public_key),
                &[ResponseCode::Contact, ResponseCode::Error],
                None,
            )
            .await?;
        match event {
            Event::Contact(contact) => Ok(*contact),
            Event::Error { code } => Err(Error::Firmware { code }),
            other => Err(unexpected(&other)),
        }
    }

    /// Adds or updates a contact.
    pub async fn update_contact(&self, contact: &Contact) -> Result<()> {
        ok_or_err(
            self.shared
                .send_and_await(builder::update_contact(contact), OK_OR_ERR, None)
                .await?,
        )
    }

    /// Removes a contact.
    pub async fn remove_contact(&self, public_key: &PublicKey) -> Result<()> {
        let event = self
            .shared
            .send_and_await(
                builder::remove_contact(public_key),
                &[
                    ResponseCode::Ok,
                    ResponseCode::ContactDeleted,
                    ResponseCode::Error,
                ],
                None,
            )
            .await?;
        match event {
            Event::Ok { .. } | Event::ContactDeleted(_) => Ok(()),
            Event::Error { code } => Err(Error::Firmware { code }),
            other => Err(unexpected(&other)),
        }
    }

    /// Resets the stored path for a contact (falls back to flood routing).
    pub async fn reset_path(&self, public_key: &PublicKey) -> Result<()> {
        ok_or_err(
            self.shared
                .send_and_await(builder::reset_path(public_key), OK_OR_ERR, None)
                .await?,
        )
    }

    /// Shares a contact over the mesh.
    pub async fn share_contact(&self, public_key: &PublicKey) -> Result<()> {
        ok_or_err(
            self.shared
                .send_and_await(builder::share_contact(public_key), OK_OR_ERR, None)
                .await?,
        )
    }

    /// Exports a contact (self when no key is given) as a URI.
    pub async fn export_contact(&self, public_key: Option<&PublicKey>) -> Result<String> {
        let event = self
            .shared
            .send_and_await(
                builder::export_contact(public_key),
                &[ResponseCode::ContactUri, ResponseCode::Error],
                None,
            )
            .await?;
        match event {
            Event::ContactUri(uri) => Ok(uri),
            Event::Error { code } => Err(Error::Firmware { code }),
            other => Err(unexpected(&other)),
        }
    }

    /// Imports a contact from card data.
    pub async fn import_contact(&self, card_data: &[u8]) -> Result<()> {
        ok_or_err(
            self.shared
                .send_and_await(builder::import_contact(card_data), OK_OR_ERR, None)
                .await?,
        )
    }

    /// Gets the advertisement path for a contact.
    pub async fn get_advert_path(&self, public_key: &PublicKey) -> Result<AdvertPath> {
        let event = self
            .shared
            .send_and_await(
                builder::get_advert_path(public_key),
                &[ResponseCode::AdvertPath, ResponseCode::Error],
                None,
            )
            .await?;
        match event {
            Event::AdvertPath(path) => Ok(path),
            Event::Error { code } => Err(Error::Firmware { code }),
            other => Err(unexpected(&other)),
        }
    }

    // ==================== Messaging Commands ====================

    /// Sends a private text message and waits for the mesh ack.
    ///
    /// Phase one waits for the send confirmation carrying the expected ack
    /// tag and suggested timeout; phase two waits for the matching ack
    /// push within that window.
    pub async fn send_message(
        &self,
        destination: &PublicKey,
        text: &str,
        attempt: u8,
        timestamp: u32,
    ) -> Result<Acknowledgement> {
        let sent = self
            .queue_message(builder::send_message(destination, text, attempt, timestamp))
            .await?;
        self.await_ack(sent).await
    }

    /// Sends a structured command to a contact. The reply text arrives as a
    /// regular contact message.
    pub async fn send_command(
        &self,
        destination: &PublicKey,
        command: &str,
        timestamp: u32,
    ) -> Result<MessageSent> {
        self.queue_message(builder::send_command(destination, command, timestamp))
            .await
    }

    async fn queue_message(&self, payload: Bytes) -> Result<MessageSent> {
        let event = self
            .shared
            .send_and_await(payload, &[ResponseCode::MsgSent, ResponseCode::Error], None)
            .await?;
        match event {
            Event::MessageSent(sent) => Ok(sent),
            Event::Error { code } => Err(Error::Firmware { code }),
            other => Err(unexpected(&other)),
        }
    }

    /// Waits for the ack matching a send confirmation, bounded by the
    /// firmware's suggested timeout.
    pub async fn await_ack(&self, sent: MessageSent) -> Result<Acknowledgement> {
        let Some((_guard, receiver)) = self.shared.pending.claim_ack(sent.expected_ack) else {
            return Err(Error::Disconnected);
        };
        let timeout = Duration::from_millis(u64::from(sent.suggested_timeout_ms));
        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(ack)) => Ok(ack),
            Ok(Err(_)) => Err(Error::Disconnected),
            Err(_) => Err(Error::AckTimeout {
                timeout_ms: u64::from(sent.suggested_timeout_ms),
            }),
        }
    }

    /// Sends a channel broadcast message.
    pub async fn send_channel_message(
        &self,
        channel: u8,
        text: &str,
        timestamp: u32,
    ) -> Result<()> {
        ok_or_err(
            self.shared
                .send_and_await(
                    builder::send_channel_message(channel, text, timestamp),
                    OK_OR_ERR,
                    None,
                )
                .await?,
        )
    }

    /// Gets the next waiting message event; [`Event::NoMoreMessages`] when
    /// the queue is empty.
    pub async fn get_message(&self) -> Result<Event> {
        self.shared
            .send_and_await(
                builder::get_message(),
                &[
                    ResponseCode::ContactMsgRecv,
                    ResponseCode::ContactMsgRecvV3,
                    ResponseCode::ChannelMsgRecv,
                    ResponseCode::ChannelMsgRecvV3,
                    ResponseCode::NoMoreMsgs,
                    ResponseCode::Error,
                ],
                None,
            )
            .await
    }

    /// Fetches all waiting messages.
    pub async fn fetch_messages(&self) -> Result<Vec<Event>> {
        let mut messages = Vec::new();
        loop {
            match self.get_message().await? {
                Event::Error { code } => return Err(Error::Firmware { code }),
                event @ (Event::ContactMessage(_) | Event::ChannelMessage(_)) => {
                    messages.push(event);
                }
                _ => break,
            }
        }
        Ok(messages)
    }

    // ==================== Room Server Commands ====================

    /// Sends a login request. The outcome arrives as a
    /// [`Event::LoginSuccess`] / [`Event::LoginFailed`] push once the
    /// server answers over the mesh.
    pub async fn send_login(
        &self,
        destination: &PublicKey,
        password: &str,
    ) -> Result<MessageSent> {
        self.queue_message(builder::send_login(destination, password))
            .await
    }

    /// Sends a logout request.
    pub async fn send_logout(&self, destination: &PublicKey) -> Result<()> {
        ok_or_err(
            self.shared
                .send_and_await(builder::send_logout(destination), OK_OR_ERR, None)
                .await?,
        )
    }

    /// Requests a remote node's status; the reply arrives as a
    /// [`Event::StatusResponse`] push.
    pub async fn send_status_request(&self, destination: &PublicKey) -> Result<MessageSent> {
        self.queue_message(builder::send_status_request(destination))
            .await
    }

    /// Checks whether the radio holds a connection to the given node.
    pub async fn has_connection(&self, destination: &PublicKey) -> Result<()> {
        ok_or_err(
            self.shared
                .send_and_await(builder::has_connection(destination), OK_OR_ERR, None)
                .await?,
        )
    }

    // ==================== Channel Commands ====================

    /// Gets channel information.
    pub async fn get_channel(&self, index: u8) -> Result<ChannelInfo> {
        let event = self
            .shared
            .send_and_await(
                builder::get_channel(index),
                &[ResponseCode::ChannelInfo, ResponseCode::Error],
                None,
            )
            .await?;
        match event {
            Event::ChannelInfo(channel) => Ok(*channel),
            Event::Error { code } => Err(Error::Firmware { code }),
            other => Err(unexpected(&other)),
        }
    }

    /// Sets channel configuration.
    pub async fn set_channel(&self, index: u8, name: &str, secret: &[u8]) -> Result<()> {
        ok_or_err(
            self.shared
                .send_and_await(builder::set_channel(index, name, secret), OK_OR_ERR, None)
                .await?,
        )
    }

    // ==================== Telemetry & Binary Requests ====================

    /// Reads the device's own telemetry.
    pub async fn get_self_telemetry(&self) -> Result<Telemetry> {
        let event = self
            .shared
            .send_and_await_push(builder::get_telemetry(None), |event| {
                matches!(event, Event::Telemetry { .. } | Event::Error { .. })
            })
            .await?;
        match event {
            Event::Telemetry { telemetry, .. } => Ok(telemetry),
            Event::Error { code } => Err(Error::Firmware { code }),
            other => Err(unexpected(&other)),
        }
    }

    /// Requests telemetry from a contact over the telemetry command; the
    /// reply arrives as a [`Event::Telemetry`] push once the contact
    /// answers.
    pub async fn send_telemetry_request(&self, destination: &PublicKey) -> Result<MessageSent> {
        self.queue_message(builder::get_telemetry(Some(destination)))
            .await
    }

    /// Sends a generic binary request; the response arrives later as an
    /// enriched push correlated through the returned ack tag.
    pub async fn binary_request(
        &self,
        destination: &PublicKey,
        request_type: BinaryReqType,
        payload: &[u8],
        neighbour_prefix_len: usize,
    ) -> Result<MessageSent> {
        let info = BinaryRequestInfo {
            pubkey_prefix: destination.prefix(),
            request_type,
            neighbour_prefix_len,
        };
        let event = self
            .shared
            .send_and_await(
                builder::binary_request(destination, request_type, payload),
                &[ResponseCode::MsgSent, ResponseCode::Error],
                Some(info),
            )
            .await?;
        match event {
            Event::MessageSent(sent) => Ok(sent),
            Event::Error { code } => Err(Error::Firmware { code }),
            other => Err(unexpected(&other)),
        }
    }

    /// Requests a remote node's status block.
    pub async fn request_remote_status(&self, destination: &PublicKey) -> Result<MessageSent> {
        self.binary_request(destination, BinaryReqType::Status, &[], 0)
            .await
    }

    /// Sends a keep-alive ping; no response payload is expected.
    pub async fn send_keep_alive(&self, destination: &PublicKey) -> Result<MessageSent> {
        self.binary_request(destination, BinaryReqType::KeepAlive, &[], 0)
            .await
    }

    /// Requests a remote node's telemetry.
    pub async fn request_remote_telemetry(&self, destination: &PublicKey) -> Result<MessageSent> {
        self.binary_request(destination, BinaryReqType::Telemetry, &[], 0)
            .await
    }

    /// Requests a remote node's min/max/average telemetry.
    pub async fn request_remote_mma(&self, destination: &PublicKey) -> Result<MessageSent> {
        self.binary_request(destination, BinaryReqType::Mma, &[], 0)
            .await
    }

    /// Requests a room server's access control list.
    pub async fn request_remote_acl(&self, destination: &PublicKey) -> Result<MessageSent> {
        self.binary_request(destination, BinaryReqType::Acl, &[], 0)
            .await
    }

    /// Requests a repeater's neighbour table.
    ///
    /// `prefix_len` selects the key-prefix width of returned rows
    /// (typically 4).
    pub async fn request_neighbours(
        &self,
        destination: &PublicKey,
        max_results: u8,
        offset: u16,
        order_by: u8,
        prefix_len: u8,
    ) -> Result<MessageSent> {
        let seed = self.shared.next_tag();
        let mut payload = Vec::with_capacity(10);
        payload.push(0); // version
        payload.push(max_results);
        payload.extend_from_slice(&offset.to_le_bytes());
        payload.push(order_by);
        payload.push(prefix_len);
        payload.extend_from_slice(&seed.to_le_bytes());

        self.binary_request(
            destination,
            BinaryReqType::Neighbours,
            &payload,
            prefix_len as usize,
        )
        .await
    }

    // ==================== Mesh Diagnostics ====================

    /// Starts path discovery towards a node; the result arrives as a
    /// [`Event::PathDiscoveryResponse`] push.
    pub async fn path_discovery(&self, destination: &PublicKey) -> Result<MessageSent> {
        self.queue_message(builder::path_discovery(destination))
            .await
    }

    /// Sends a trace along an explicit repeater path and returns the tag
    /// that the eventual [`Event::TraceData`] push will echo.
    pub async fn send_trace(
        &self,
        auth_code: u32,
        tag: Option<u32>,
        flags: u8,
        path: &[u8],
    ) -> Result<u32> {
        let tag = tag.unwrap_or_else(|| self.shared.next_tag());
        self.queue_message(builder::send_trace(tag, auth_code, flags, path))
            .await?;
        Ok(tag)
    }

    /// Limits flooding to a 16-byte scope key; all zeros clears the scope.
    pub async fn set_flood_scope(&self, scope_key: &[u8; 16]) -> Result<()> {
        ok_or_err(
            self.shared
                .send_and_await(builder::set_flood_scope(scope_key), OK_OR_ERR, None)
                .await?,
        )
    }

    /// Clears the flood scope (allows all floods).
    pub async fn clear_flood_scope(&self) -> Result<()> {
        self.set_flood_scope(&[0u8; 16]).await
    }

    /// Sets the flood scope from a topic string hashed with SHA-256.
    #[cfg(feature = "sha2")]
    pub async fn set_flood_scope_topic(&self, topic: &str) -> Result<()> {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(topic.as_bytes());
        let hash = hasher.finalize();
        let mut key = [0u8; 16];
        key.copy_from_slice(&hash[..16]);
        self.set_flood_scope(&key).await
    }

    /// Broadcasts a node discovery request; answers arrive as
    /// [`Event::ControlData`] pushes whose discover responses echo the
    /// returned tag.
    pub async fn node_discover(
        &self,
        filter: u8,
        prefix_only: bool,
        tag: Option<u32>,
        since: Option<u32>,
    ) -> Result<u32> {
        let tag = tag.unwrap_or_else(|| self.shared.next_tag());

        let mut payload = Vec::with_capacity(9);
        payload.push(filter);
        payload.extend_from_slice(&tag.to_le_bytes());
        if let Some(ts) = since {
            payload.extend_from_slice(&ts.to_le_bytes());
        }

        let control_type = ControlDataType::NodeDiscoverReq as u8 | u8::from(prefix_only);
        ok_or_err(
            self.shared
                .send_and_await(
                    builder::send_control_data(control_type, &payload),
                    OK_OR_ERR,
                    None,
                )
                .await?,
        )?;
        Ok(tag)
    }

    // ==================== Signature Commands ====================

    /// Starts a signing operation; returns the maximum data length.
    pub async fn sign_start(&self) -> Result<u32> {
        let event = self
            .shared
            .send_and_await(
                builder::sign_start(),
                &[
                    ResponseCode::SignStart,
                    ResponseCode::Disabled,
                    ResponseCode::Error,
                ],
                None,
            )
            .await?;
        match event {
            Event::SignStart { max_length } => Ok(max_length),
            Event::Disabled => Err(Error::Firmware { code: None }),
            Event::Error { code } => Err(Error::Firmware { code }),
            other => Err(unexpected(&other)),
        }
    }

    /// Feeds a chunk of data into the signing operation.
    pub async fn sign_data(&self, chunk: &[u8]) -> Result<()> {
        ok_or_err(
            self.shared
                .send_and_await(builder::sign_data(chunk), OK_OR_ERR, None)
                .await?,
        )
    }

    /// Finishes signing and returns the signature.
    pub async fn sign_finish(&self) -> Result<Vec<u8>> {
        let event = self
            .shared
            .send_and_await(
                builder::sign_finish(),
                &[ResponseCode::Signature, ResponseCode::Error],
                None,
            )
            .await?;
        match event {
            Event::Signature(signature) => Ok(signature),
            Event::Error { code } => Err(Error::Firmware { code }),
            other => Err(unexpected(&other)),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
