//! Core types for the LexMarket SDK.
//!
//! Resource payloads exchanged with the REST backend. Each type names the
//! fields the client formats and keeps everything else in `extra`.

pub mod appointment;
pub mod case;
pub mod conversation;
pub mod lawyer;
pub mod rating;

pub use appointment::Appointment;
pub use case::{Bid, Case, NewBid, NewCase};
pub use conversation::{Conversation, Message};
pub use lawyer::Lawyer;
pub use rating::{NewRating, Rating};
