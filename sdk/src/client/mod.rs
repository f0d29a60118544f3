//! HTTP client for the LexMarket REST API.
//!
//! This module provides a type-safe HTTP client for the marketplace backend:
//! cases, bids, lawyers, ratings, conversations and appointments.
//!
//! # Example
//!
//! ```rust,ignore
//! use lexmarket_sdk::client::{ClientConfig, LexClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new("https://api.lexmarket.example/api").with_token("...");
//!     let client = LexClient::new(config)?;
//!
//!     let cases = client.get_cases().await?;
//!     println!("Found {} cases", cases.len());
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod http;

pub use config::ClientConfig;
pub use error::ClientError;
pub use http::LexClient;
