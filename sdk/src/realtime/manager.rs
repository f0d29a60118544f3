//! Connection manager.
//!
//! Holds at most one [`Channel`] at a time for the session found in storage,
//! and exposes the subscribe / unsubscribe / emit surface used by views.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use super::channel::{Callback, Channel, ListenerId};
use super::config::RealtimeConfig;
use super::error::RealtimeError;
use super::messages::AuthPayload;
use crate::session::{stored_token, KeyValueStore};

type Slot = Arc<Mutex<Option<Channel>>>;

fn lock(slot: &Mutex<Option<Channel>>) -> MutexGuard<'_, Option<Channel>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the process-wide realtime channel.
pub struct ConnectionManager {
    config: RealtimeConfig,
    store: Arc<dyn KeyValueStore>,
    slot: Slot,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("config", &self.config)
            .field("channel", &*lock(&self.slot))
            .finish()
    }
}

impl ConnectionManager {
    /// Creates a manager reading tokens from `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(
        config: RealtimeConfig,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, RealtimeError> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            slot: Arc::new(Mutex::new(None)),
        })
    }

    /// Returns the channel configuration.
    #[must_use]
    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// Opens the channel for `user_id`, or returns the existing one.
    ///
    /// Returns `None` without opening anything when storage holds no token.
    /// Must be called from within a Tokio runtime.
    pub fn connect(&self, user_id: Option<&str>) -> Option<Channel> {
        let mut slot = lock(&self.slot);
        if let Some(channel) = slot.as_ref() {
            return Some(channel.clone());
        }

        let Some(token) = stored_token(self.store.as_ref()) else {
            warn!("No auth token found; realtime channel not opened");
            return None;
        };

        let auth = AuthPayload::new(token, user_id);
        let weak = Arc::downgrade(&self.slot);
        let on_auth_rejected = move |id: u64| {
            let Some(slot) = weak.upgrade() else {
                return;
            };
            let mut slot = lock(&slot);
            if slot.as_ref().is_some_and(|channel| channel.id() == id) {
                *slot = None;
                info!("Realtime channel {} torn down after auth failure", id);
            }
        };

        match Channel::open_with_hook(self.config.clone(), auth, on_auth_rejected) {
            Ok(channel) => {
                info!(
                    "Realtime channel {} opening for user {}",
                    channel.id(),
                    user_id.unwrap_or("<none>")
                );
                *slot = Some(channel.clone());
                Some(channel)
            }
            Err(e) => {
                error!("Failed to open realtime channel: {}", e);
                None
            }
        }
    }

    /// Closes and clears the channel. Idempotent.
    pub fn disconnect(&self) {
        if let Some(channel) = lock(&self.slot).take() {
            channel.close();
            info!("Realtime channel {} disconnected", channel.id());
        }
    }

    /// Returns the channel without opening one.
    #[must_use]
    pub fn current(&self) -> Option<Channel> {
        lock(&self.slot).clone()
    }

    /// Returns the channel, opening one with no user identity when absent.
    pub fn get_handle(&self) -> Option<Channel> {
        if let Some(channel) = self.current() {
            return Some(channel);
        }
        self.connect(None)
    }

    /// Returns true if a channel is held.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        lock(&self.slot).is_some()
    }

    /// Registers `callback` for `event` on the current (or a new) channel.
    ///
    /// Returns `None` if no channel can be opened.
    pub fn subscribe<F>(&self, event: &str, callback: F) -> Option<Subscription>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.subscribe_callback(event, Arc::new(callback))
    }

    /// Registers a shared callback, which can later be passed to
    /// [`unsubscribe`](Self::unsubscribe).
    pub fn subscribe_callback(&self, event: &str, callback: Callback) -> Option<Subscription> {
        let channel = self.get_handle()?;
        let id = channel.on(event, callback);
        Some(Subscription {
            channel,
            event: event.to_string(),
            id,
        })
    }

    /// Removes `callback` from `event` on the current channel. Returns true
    /// if it was registered.
    pub fn unsubscribe(&self, event: &str, callback: &Callback) -> bool {
        self.current()
            .is_some_and(|channel| channel.off_callback(event, callback))
    }

    /// Sends `payload` on `event` over the current (or a new) channel.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::NotConnected`] if no channel can be opened,
    /// or the channel's emit error.
    pub fn emit<T>(&self, event: &str, payload: &T) -> Result<(), RealtimeError>
    where
        T: Serialize + ?Sized,
    {
        let channel = self.get_handle().ok_or(RealtimeError::NotConnected)?;
        channel.emit(event, payload)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(channel) = lock(&self.slot).take() {
            channel.close();
        }
    }
}

/// One registered callback. Call [`unsubscribe`](Self::unsubscribe) to
/// remove it.
#[derive(Debug)]
#[must_use = "dropping a Subscription keeps the callback registered"]
pub struct Subscription {
    channel: Channel,
    event: String,
    id: ListenerId,
}

impl Subscription {
    /// Returns the event name.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Returns the channel the callback is registered on.
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Removes exactly this callback. Returns true if it was still present.
    pub fn unsubscribe(self) -> bool {
        self.channel.off(&self.event, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::config::Transport;
    use crate::session::{MemoryStore, Session, TOKEN_KEY};
    use std::time::Duration;

    fn config() -> RealtimeConfig {
        RealtimeConfig::new("http://127.0.0.1:9")
            .with_transports(vec![Transport::WebSocket])
            .with_connect_timeout(Duration::from_millis(200))
            .with_reconnect_delay(Duration::from_secs(60))
    }

    fn manager_with(token: Option<&str>) -> ConnectionManager {
        let store = Arc::new(MemoryStore::new());
        if let Some(token) = token {
            store.set(TOKEN_KEY, token).expect("set");
        }
        ConnectionManager::new(config(), store).expect("manager")
    }

    #[test]
    fn test_invalid_config() {
        let store = Arc::new(MemoryStore::new());
        let result = ConnectionManager::new(RealtimeConfig::new("ftp://x"), store);
        assert!(matches!(result, Err(RealtimeError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_connect_without_token_yields_nothing() {
        for token in [None, Some(""), Some("   ")] {
            let manager = manager_with(token);
            assert!(manager.connect(Some("u1")).is_none());
            assert!(!manager.is_connected());
            assert!(manager.get_handle().is_none());
            assert!(manager.subscribe("new_message", |_| {}).is_none());
            assert!(matches!(
                manager.emit("typing", &()),
                Err(RealtimeError::NotConnected)
            ));
        }
    }

    #[tokio::test]
    async fn test_connect_returns_same_handle_until_disconnect() {
        let manager = manager_with(Some("tok"));

        let first = manager.connect(Some("u1")).expect("handle");
        assert_eq!(first.user_id(), Some("u1"));
        let again = manager.connect(Some("someone-else")).expect("handle");
        assert!(first.same_channel(&again));
        assert!(first.same_channel(&manager.get_handle().expect("handle")));
        assert!(first.same_channel(&manager.get_handle().expect("handle")));

        manager.disconnect();
        manager.disconnect();
        assert!(manager.current().is_none());
    }

    #[tokio::test]
    async fn test_get_handle_after_disconnect_opens_anonymous_channel() {
        let store = Arc::new(MemoryStore::new());
        Session::new("u1", "tok").persist(store.as_ref()).expect("persist");
        let manager = ConnectionManager::new(config(), store).expect("manager");

        let first = manager.connect(Some("u1")).expect("handle");
        manager.disconnect();

        let fallback = manager.get_handle().expect("fallback handle");
        assert!(!fallback.same_channel(&first));
        assert_eq!(fallback.user_id(), None);
    }

    #[tokio::test]
    async fn test_subscription_unsubscribe() {
        let manager = manager_with(Some("tok"));
        let channel = manager.connect(Some("u1")).expect("handle");

        let sub = manager.subscribe("new_bid", |_| {}).expect("subscription");
        assert_eq!(sub.event(), "new_bid");
        assert_eq!(channel.listener_count("new_bid"), 1);
        assert!(sub.unsubscribe());
        assert_eq!(channel.listener_count("new_bid"), 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_by_callback() {
        let manager = manager_with(Some("tok"));
        let callback: Callback = Arc::new(|_: &Value| {});

        assert!(!manager.unsubscribe("new_bid", &callback));
        assert!(!manager.is_connected());

        let _sub = manager
            .subscribe_callback("new_bid", Arc::clone(&callback))
            .expect("subscription");
        assert!(manager.unsubscribe("new_bid", &callback));
        assert!(!manager.unsubscribe("new_bid", &callback));
    }
}
