//! Realtime channel handle.
//!
//! A [`Channel`] is a cheap, cloneable handle to one logical channel. A
//! background task owns the transport link, re-establishes it after drops
//! and dispatches incoming events to registered callbacks. Emits issued
//! while no link is up are queued and flushed in order once one opens.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use super::config::{RealtimeConfig, Transport};
use super::error::RealtimeError;
use super::messages::{AuthPayload, ClientFrame, ServerFrame};
use super::transport::Link;

/// Global channel ID counter.
static CHANNEL_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

fn next_channel_id() -> u64 {
    CHANNEL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Event callback. Identity is the `Arc` allocation.
pub type Callback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Identifies one registered callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Transport-level state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// First connection attempt in progress.
    Connecting,
    /// Authenticated link is up.
    Open,
    /// Waiting to retry after a drop or failed attempt.
    Reconnecting {
        /// Consecutive attempt number, starting at 1.
        attempt: u32,
    },
    /// The channel is finished and will not reconnect.
    Closed,
}

impl ChannelState {
    /// Returns true if a link is up.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns true if the channel is finished.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Reconnecting { attempt } => write!(f, "reconnecting (attempt {})", attempt),
            Self::Closed => write!(f, "closed"),
        }
    }
}

enum Command {
    Emit(ClientFrame),
    Close,
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    by_event: HashMap<String, Vec<(ListenerId, Callback)>>,
}

struct Shared {
    id: u64,
    user_id: Option<String>,
    listeners: Mutex<Listeners>,
    state: watch::Sender<ChannelState>,
    transport: Mutex<Option<Transport>>,
}

impl Shared {
    fn listeners(&self) -> MutexGuard<'_, Listeners> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ChannelState) {
        self.state.send_replace(state);
    }

    fn set_transport(&self, transport: Option<Transport>) {
        *self.transport.lock().unwrap_or_else(PoisonError::into_inner) = transport;
    }

    fn dispatch(&self, event: &str, data: &Value) {
        // Callbacks run outside the lock so they may (un)subscribe.
        let callbacks: Vec<Callback> = self
            .listeners()
            .by_event
            .get(event)
            .map(|list| list.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default();

        if callbacks.is_empty() {
            debug!("Channel {}: no listeners for event {}", self.id, event);
            return;
        }

        for callback in callbacks {
            callback(data);
        }
    }
}

/// Handle to a realtime channel.
#[derive(Clone)]
pub struct Channel {
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.shared.id)
            .field("user_id", &self.shared.user_id)
            .field("state", &self.state())
            .finish()
    }
}

impl Channel {
    /// Opens a channel. The connection proceeds in the background; the
    /// returned handle starts in [`ChannelState::Connecting`].
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn open(config: RealtimeConfig, auth: AuthPayload) -> Result<Self, RealtimeError> {
        Self::open_with_hook(config, auth, |_| {})
    }

    /// Opens a channel and calls `on_auth_rejected` with the channel ID if
    /// the server rejects its credentials.
    pub(crate) fn open_with_hook<F>(
        config: RealtimeConfig,
        auth: AuthPayload,
        on_auth_rejected: F,
    ) -> Result<Self, RealtimeError>
    where
        F: FnOnce(u64) + Send + 'static,
    {
        config.validate()?;

        let (state, _) = watch::channel(ChannelState::Connecting);
        let shared = Arc::new(Shared {
            id: next_channel_id(),
            user_id: auth.user_id.clone(),
            listeners: Mutex::new(Listeners::default()),
            state,
            transport: Mutex::new(None),
        });

        let (commands, rx) = mpsc::unbounded_channel();
        tokio::spawn(drive(
            Arc::clone(&shared),
            config,
            auth,
            rx,
            Box::new(on_auth_rejected),
        ));

        Ok(Self { shared, commands })
    }

    /// Returns the channel ID.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    /// Returns the user identity the channel was opened for.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.shared.user_id.as_deref()
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ChannelState {
        *self.shared.state.borrow()
    }

    /// Returns a receiver notified on every state change.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ChannelState> {
        self.shared.state.subscribe()
    }

    /// Returns the transport of the current link, if one is up.
    #[must_use]
    pub fn transport(&self) -> Option<Transport> {
        *self
            .shared
            .transport
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns true if both handles refer to the same channel.
    #[must_use]
    pub fn same_channel(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Waits until the channel is open.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::Closed`] if the channel closes first.
    pub async fn wait_until_open(&self) -> Result<(), RealtimeError> {
        let mut rx = self.state_changes();
        loop {
            let state = *rx.borrow_and_update();
            match state {
                ChannelState::Open => return Ok(()),
                ChannelState::Closed => return Err(RealtimeError::Closed),
                _ => {}
            }
            if rx.changed().await.is_err() {
                return Err(RealtimeError::Closed);
            }
        }
    }

    /// Waits until the channel is closed.
    pub async fn wait_until_closed(&self) {
        let mut rx = self.state_changes();
        loop {
            if rx.borrow_and_update().is_closed() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Registers a callback for a named event.
    pub fn on(&self, event: &str, callback: Callback) -> ListenerId {
        let mut listeners = self.shared.listeners();
        listeners.next_id += 1;
        let id = ListenerId(listeners.next_id);
        listeners
            .by_event
            .entry(event.to_string())
            .or_default()
            .push((id, callback));
        debug!("Channel {}: listening for {}", self.shared.id, event);
        id
    }

    /// Removes the listener with the given ID. Returns true if it existed.
    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        self.remove_where(event, |(lid, _)| *lid == id)
    }

    /// Removes every registration of `callback` for `event`. Returns true if
    /// any existed.
    pub fn off_callback(&self, event: &str, callback: &Callback) -> bool {
        self.remove_where(event, |(_, cb)| {
            std::ptr::addr_eq(Arc::as_ptr(cb), Arc::as_ptr(callback))
        })
    }

    fn remove_where<P>(&self, event: &str, predicate: P) -> bool
    where
        P: Fn(&(ListenerId, Callback)) -> bool,
    {
        let mut listeners = self.shared.listeners();
        let Some(list) = listeners.by_event.get_mut(event) else {
            return false;
        };

        let before = list.len();
        list.retain(|entry| !predicate(entry));
        let removed = list.len() != before;

        if list.is_empty() {
            listeners.by_event.remove(event);
        }
        removed
    }

    /// Returns the number of callbacks registered for `event`.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.shared
            .listeners()
            .by_event
            .get(event)
            .map_or(0, Vec::len)
    }

    /// Sends a named event. Queued if no link is currently up.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized or the channel
    /// is closed.
    pub fn emit<T>(&self, event: &str, payload: &T) -> Result<(), RealtimeError>
    where
        T: Serialize + ?Sized,
    {
        let data =
            serde_json::to_value(payload).map_err(|e| RealtimeError::Serialization(e.to_string()))?;

        self.commands
            .send(Command::Emit(ClientFrame::Event {
                event: event.to_string(),
                data,
            }))
            .map_err(|_| RealtimeError::Closed)
    }

    /// Closes the channel. Idempotent.
    pub fn close(&self) {
        if self.commands.send(Command::Close).is_ok() {
            debug!("Channel {}: close requested", self.shared.id);
        }
    }
}

/// Why a link stopped.
enum LinkEnd {
    ClosedByClient,
    AuthRejected(String),
    ServerDisconnect(String),
    Dropped(String),
}

/// Why the channel stopped.
enum ChannelEnd {
    ClosedByClient,
    AuthRejected(String),
    ServerDisconnect(String),
    GaveUp,
}

/// Drives the channel until it is closed, rejected or out of retries.
async fn drive(
    shared: Arc<Shared>,
    config: RealtimeConfig,
    auth: AuthPayload,
    mut commands: mpsc::UnboundedReceiver<Command>,
    on_auth_rejected: Box<dyn FnOnce(u64) + Send>,
) {
    let id = shared.id;
    let mut pending: VecDeque<ClientFrame> = VecDeque::new();
    let mut attempt: u32 = 0;

    let end = loop {
        let connected = tokio::select! {
            result = connect_any(&config, &auth) => Some(result),
            () = wait_for_close(&mut commands, &mut pending) => None,
        };
        let Some(result) = connected else {
            break ChannelEnd::ClosedByClient;
        };

        match result {
            Ok(mut link) => {
                attempt = 0;
                shared.set_transport(Some(link.transport()));
                shared.set_state(ChannelState::Open);
                info!(
                    "Channel {} connected via {} (sid {})",
                    id,
                    link.transport(),
                    link.sid().unwrap_or("-")
                );

                match run_link(&shared, &config, &mut link, &mut commands, &mut pending).await {
                    LinkEnd::ClosedByClient => {
                        link.close().await;
                        break ChannelEnd::ClosedByClient;
                    }
                    LinkEnd::AuthRejected(message) => break ChannelEnd::AuthRejected(message),
                    LinkEnd::ServerDisconnect(reason) => break ChannelEnd::ServerDisconnect(reason),
                    LinkEnd::Dropped(reason) => {
                        warn!("Channel {} link dropped: {}", id, reason);
                    }
                }
            }
            Err(RealtimeError::AuthRejected(message)) => break ChannelEnd::AuthRejected(message),
            Err(e) => warn!("Channel {} connection attempt failed: {}", id, e),
        }

        shared.set_transport(None);

        if !config.reconnection
            || config
                .max_reconnect_attempts
                .is_some_and(|max| attempt >= max)
        {
            break ChannelEnd::GaveUp;
        }

        attempt += 1;
        shared.set_state(ChannelState::Reconnecting { attempt });
        let delay = config.backoff_delay(attempt);
        debug!("Channel {} reconnecting in {:?} (attempt {})", id, delay, attempt);

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = wait_for_close(&mut commands, &mut pending) => break ChannelEnd::ClosedByClient,
        }
    };

    drop(commands);
    shared.set_transport(None);
    shared.set_state(ChannelState::Closed);

    if !pending.is_empty() {
        debug!("Channel {} discarding {} unsent frames", id, pending.len());
    }

    match end {
        ChannelEnd::ClosedByClient => info!("Channel {} disconnected", id),
        ChannelEnd::ServerDisconnect(reason) => {
            info!("Channel {} disconnected by server: {}", id, reason);
        }
        ChannelEnd::GaveUp => warn!("Channel {} closed after failed reconnection", id),
        ChannelEnd::AuthRejected(message) => {
            error!("Channel {} authentication failed: {}", id, message);
            on_auth_rejected(id);
        }
    }
}

/// Tries each configured transport in order.
async fn connect_any(config: &RealtimeConfig, auth: &AuthPayload) -> Result<Link, RealtimeError> {
    let mut last_error = None;

    for &transport in &config.transports {
        match Link::open(config, transport, auth).await {
            Ok(link) => return Ok(link),
            Err(e @ RealtimeError::AuthRejected(_)) => return Err(e),
            Err(e) => {
                debug!("Transport {} unavailable: {}", transport, e);
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or(RealtimeError::NotConnected))
}

/// Queues emits until a close is requested or every handle is dropped.
async fn wait_for_close(
    commands: &mut mpsc::UnboundedReceiver<Command>,
    pending: &mut VecDeque<ClientFrame>,
) {
    while let Some(command) = commands.recv().await {
        match command {
            Command::Emit(frame) => pending.push_back(frame),
            Command::Close => return,
        }
    }
}

fn classify(err: RealtimeError) -> LinkEnd {
    match err {
        RealtimeError::AuthRejected(message) => LinkEnd::AuthRejected(message),
        other => LinkEnd::Dropped(other.to_string()),
    }
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Pumps one link until it ends.
async fn run_link(
    shared: &Shared,
    config: &RealtimeConfig,
    link: &mut Link,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    pending: &mut VecDeque<ClientFrame>,
) -> LinkEnd {
    while let Some(frame) = pending.pop_front() {
        if let Err(e) = link.send(&frame).await {
            pending.push_front(frame);
            return classify(e);
        }
    }

    let heartbeat_enabled = link.transport() == Transport::WebSocket;
    let mut heartbeat = tokio::time::interval(config.heartbeat_interval);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            frame = link.recv() => match frame {
                Some(ServerFrame::Event { event, data }) => shared.dispatch(&event, &data),
                Some(ServerFrame::ConnectError { message }) => return LinkEnd::AuthRejected(message),
                Some(ServerFrame::Disconnect { reason }) => {
                    return LinkEnd::ServerDisconnect(reason.unwrap_or_else(|| "no reason".to_string()));
                }
                Some(ServerFrame::Pong { timestamp }) => {
                    debug!("Channel {}: pong {}", shared.id, timestamp);
                }
                Some(ServerFrame::Connected { .. }) => {}
                None => return LinkEnd::Dropped("transport closed".to_string()),
            },
            command = commands.recv() => match command {
                Some(Command::Emit(frame)) => {
                    if let Err(e) = link.send(&frame).await {
                        pending.push_back(frame);
                        return classify(e);
                    }
                }
                Some(Command::Close) | None => return LinkEnd::ClosedByClient,
            },
            _ = heartbeat.tick(), if heartbeat_enabled => {
                let ping = ClientFrame::Ping { timestamp: now_millis() };
                if let Err(e) = link.send(&ping).await {
                    return classify(e);
                }
            }
        }
    }
}
