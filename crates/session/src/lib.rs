//! Conversation sessions for Cadence.
//!
//! A [`ConversationSession`] is the message history plus free-form context of
//! one agent conversation. The [`SessionManager`] owns every live session and
//! optionally mirrors each one to a JSON file through a [`SessionStore`].

pub mod manager;
pub mod session;
pub mod store;

pub use manager::{SessionHandle, SessionManager};
pub use session::ConversationSession;
pub use store::SessionStore;
