//! Realtime event channel.
//!
//! This module provides the [`ConnectionManager`], which keeps at most one
//! authenticated [`Channel`] open for the stored session, and the channel
//! itself with its transports (WebSocket with HTTP long-polling fallback).
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use lexmarket_sdk::realtime::{ConnectionManager, RealtimeConfig};
//! use lexmarket_sdk::session::FileStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(FileStore::open_default()?);
//!     let manager = ConnectionManager::new(RealtimeConfig::default(), store)?;
//!
//!     let sub = manager.subscribe("new_message", |data| {
//!         println!("message: {}", data);
//!     });
//!
//!     manager.emit("typing", &serde_json::json!({ "conversationId": "c1" }))?;
//!
//!     if let Some(sub) = sub {
//!         sub.unsubscribe();
//!     }
//!     manager.disconnect();
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod manager;
pub mod messages;
mod transport;

pub use channel::{Callback, Channel, ChannelState, ListenerId};
pub use config::{RealtimeConfig, Transport};
pub use error::RealtimeError;
pub use manager::{ConnectionManager, Subscription};
pub use messages::{AuthPayload, ClientFrame, ServerFrame};
