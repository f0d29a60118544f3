//! LexMarket SDK - Rust client library for the LexMarket legal-services
//! marketplace.
//!
//! Clients post cases, lawyers bid on them, and both sides message and rate
//! each other. This crate provides the pieces a client application is built
//! from.
//!
//! # Modules
//!
//! - [`client`] — REST client for cases, bids, lawyers, ratings,
//!   conversations and appointments
//! - [`realtime`] — [`ConnectionManager`] holding the one authenticated
//!   event channel, with WebSocket and long-polling transports
//! - [`session`] — persistent token / user identity storage
//! - [`context`] — [`AppContext`] tying storage, REST and realtime to the
//!   login lifecycle
//! - [`views`] — fetch-on-mount list views rendered as text
//! - [`format`] — date, currency, deadline and status label helpers
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use lexmarket_sdk::{AppContext, ClientConfig, RealtimeConfig, Session};
//! use lexmarket_sdk::session::FileStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(FileStore::open_default()?);
//!     let ctx = AppContext::new(ClientConfig::default(), RealtimeConfig::default(), store)?;
//!
//!     ctx.login(&Session::new("user-1", "token"))?;
//!
//!     let mut view = lexmarket_sdk::views::cases(&ctx);
//!     view.mount();
//!     view.settled().await;
//!     println!("{}", view.render());
//!
//!     ctx.logout()?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod context;
pub mod error;
pub mod format;
pub mod realtime;
pub mod session;
pub mod types;
pub mod views;

pub use client::{ClientConfig, ClientError, LexClient};
pub use context::{AppContext, ContextError};
pub use error::SdkError;
pub use realtime::{Channel, ConnectionManager, RealtimeConfig, RealtimeError, Subscription};
pub use session::{KeyValueStore, Session};
pub use types::{
    Appointment, Bid, Case, Conversation, Lawyer, Message, NewBid, NewCase, NewRating, Rating,
};
pub use views::{ListView, ViewState};
