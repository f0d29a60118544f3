//! Resource list views.
//!
//! A view fetches one REST resource list when mounted and renders it as
//! plain text. Each view owns its own [`ViewState`]; a failure in one view
//! never touches another.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut view = lexmarket_sdk::views::cases(&ctx);
//! view.mount();
//! view.settled().await;
//! println!("{}", view.render());
//! ```

mod list;
mod rows;

pub use list::{Fetch, ListView};
pub use rows::{ListItem, RowStyle};

use crate::context::AppContext;
use crate::types::{Appointment, Case, Conversation, Lawyer, Message, Rating};

/// Rendered for [`ViewState::Loading`].
pub const LOADING_TEXT: &str = "Loading...";

/// Rendered for [`ViewState::LoginRequired`].
pub const LOGIN_REQUIRED_TEXT: &str = "Please log in to continue.";

/// Local state of a view.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState<T> {
    /// Not mounted yet, or a fetch is in flight.
    Loading,
    /// The fetch succeeded.
    Loaded(T),
    /// The fetch failed with this message.
    Failed(String),
    /// No token is stored, or the server rejected it.
    LoginRequired,
}

impl<T> ViewState<T> {
    /// Returns true while a fetch is pending.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// Returns the loaded data.
    #[must_use]
    pub const fn data(&self) -> Option<&T> {
        match self {
            Self::Loaded(data) => Some(data),
            _ => None,
        }
    }

    /// Returns the failure message.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// All cases visible to the user.
pub fn cases(ctx: &AppContext) -> ListView<Case> {
    ListView::from_context(ctx, "cases", |client| async move { client.get_cases().await })
}

/// Lawyer directory.
pub fn lawyers(ctx: &AppContext) -> ListView<Lawyer> {
    ListView::from_context(ctx, "lawyers", |client| async move {
        client.get_lawyers().await
    })
}

/// Ratings received by one lawyer.
pub fn ratings(ctx: &AppContext, lawyer_id: impl Into<String>) -> ListView<Rating> {
    let lawyer_id = lawyer_id.into();
    ListView::from_context(ctx, "ratings", move |client| {
        let lawyer_id = lawyer_id.clone();
        async move { client.get_ratings(&lawyer_id).await }
    })
}

/// The user's conversations.
pub fn conversations(ctx: &AppContext) -> ListView<Conversation> {
    ListView::from_context(ctx, "conversations", |client| async move {
        client.get_conversations().await
    })
}

/// Messages of one conversation.
pub fn messages(ctx: &AppContext, conversation_id: impl Into<String>) -> ListView<Message> {
    let conversation_id = conversation_id.into();
    ListView::from_context(ctx, "messages", move |client| {
        let conversation_id = conversation_id.clone();
        async move { client.get_messages(&conversation_id).await }
    })
}

/// The user's appointments.
pub fn appointments(ctx: &AppContext) -> ListView<Appointment> {
    ListView::from_context(ctx, "appointments", |client| async move {
        client.get_appointments().await
    })
}
