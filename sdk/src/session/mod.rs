//! Authenticated session and its persistent storage.
//!
//! The session is the pair of user identity and bearer token, kept in a
//! [`KeyValueStore`] under [`TOKEN_KEY`] and [`USER_ID_KEY`]. It is written at
//! login, read at startup and cleared at logout or on authentication failure.

pub mod error;
pub mod store;

pub use error::StoreError;
pub use store::{default_storage_path, FileStore, KeyValueStore, MemoryStore};

use std::fmt;

/// Storage key holding the bearer token.
pub const TOKEN_KEY: &str = "token";

/// Storage key holding the user identity.
pub const USER_ID_KEY: &str = "userId";

/// The authenticated user context.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    /// User identity.
    pub user_id: String,
    /// Bearer token.
    pub token: String,
}

impl Session {
    /// Creates a session.
    #[must_use]
    pub fn new(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.into(),
        }
    }

    /// Loads the session from storage.
    ///
    /// Returns `None` when no non-empty token is stored. A missing user ID
    /// loads as an empty string.
    #[must_use]
    pub fn load(store: &dyn KeyValueStore) -> Option<Self> {
        let token = stored_token(store)?;
        let user_id = store.get(USER_ID_KEY).unwrap_or_default();
        Some(Self { user_id, token })
    }

    /// Writes the session to storage.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be written.
    pub fn persist(&self, store: &dyn KeyValueStore) -> Result<(), StoreError> {
        store.set(TOKEN_KEY, &self.token)?;
        store.set(USER_ID_KEY, &self.user_id)
    }

    /// Removes any session from storage.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be written.
    pub fn clear(store: &dyn KeyValueStore) -> Result<(), StoreError> {
        store.remove(TOKEN_KEY)?;
        store.remove(USER_ID_KEY)
    }
}

/// Returns the stored bearer token if present and non-empty.
#[must_use]
pub fn stored_token(store: &dyn KeyValueStore) -> Option<String> {
    store
        .get(TOKEN_KEY)
        .filter(|token| !token.trim().is_empty())
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("token", &"<redacted>")
            .finish()
    }
}
