//! Application context.
//!
//! [`AppContext`] owns everything tied to the session lifecycle: the
//! key-value store, the REST client configuration and the realtime
//! [`ConnectionManager`]. Login persists the session and opens the channel;
//! logout and authentication failures tear both down.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::client::{ClientConfig, ClientError, LexClient};
use crate::error::SdkError;
use crate::realtime::{Channel, ConnectionManager, RealtimeConfig, RealtimeError};
use crate::session::{stored_token, KeyValueStore, Session, StoreError};

/// Errors raised while building or driving the context.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// Invalid input.
    #[error(transparent)]
    Invalid(#[from] SdkError),

    /// REST client setup failed.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Realtime setup failed.
    #[error(transparent)]
    Realtime(#[from] RealtimeError),

    /// Storage failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Session-scoped application state.
pub struct AppContext {
    store: Arc<dyn KeyValueStore>,
    client_config: ClientConfig,
    connections: ConnectionManager,
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("client_config", &self.client_config)
            .field("connections", &self.connections)
            .field("logged_in", &self.is_logged_in())
            .finish()
    }
}

impl AppContext {
    /// Creates a context.
    ///
    /// Any token in `client_config` is ignored; requests use the stored one.
    ///
    /// # Errors
    ///
    /// Returns an error if either configuration is invalid.
    pub fn new(
        client_config: ClientConfig,
        realtime_config: RealtimeConfig,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, ContextError> {
        client_config.validate()?;
        let connections = ConnectionManager::new(realtime_config, Arc::clone(&store))?;

        Ok(Self {
            store,
            client_config: ClientConfig {
                token: None,
                ..client_config
            },
            connections,
        })
    }

    /// Returns the backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Returns the REST configuration, without a token.
    #[must_use]
    pub fn client_config(&self) -> &ClientConfig {
        &self.client_config
    }

    /// Returns the connection manager.
    #[must_use]
    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// Returns the stored session.
    #[must_use]
    pub fn session(&self) -> Option<Session> {
        Session::load(self.store.as_ref())
    }

    /// Returns true if a token is stored.
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        stored_token(self.store.as_ref()).is_some()
    }

    /// Builds a REST client carrying the stored token, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be created.
    pub fn client(&self) -> Result<LexClient, ClientError> {
        let mut config = self.client_config.clone();
        if let Some(token) = stored_token(self.store.as_ref()) {
            config = config.with_token(token);
        }
        LexClient::new(config)
    }

    /// Persists `session` and opens the realtime channel for it.
    ///
    /// A previous channel is closed first. Returns the new channel, or `None`
    /// if it could not be opened.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is blank or storage fails.
    pub fn login(&self, session: &Session) -> Result<Option<Channel>, ContextError> {
        if session.token.trim().is_empty() {
            return Err(SdkError::EmptyField("token").into());
        }

        self.connections.disconnect();
        session.persist(self.store.as_ref())?;
        info!("Logged in as {}", session.user_id);

        let user_id = Some(session.user_id.as_str()).filter(|id| !id.is_empty());
        Ok(self.connections.connect(user_id))
    }

    /// Closes the realtime channel and clears the stored session.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be written.
    pub fn logout(&self) -> Result<(), StoreError> {
        self.connections.disconnect();
        Session::clear(self.store.as_ref())?;
        info!("Logged out");
        Ok(())
    }

    /// Handles a rejected token: same as [`logout`](Self::logout).
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be written.
    pub fn handle_unauthorized(&self) -> Result<(), StoreError> {
        warn!("Session rejected by the server; logging out");
        self.logout()
    }
}
