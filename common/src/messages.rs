// common/src/messages.rs
use serde::{Deserialize, Serialize};

use crate::models::Session;

/// Why the authority emitted a session change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// Notification pushed by the authority whenever its session changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub event: AuthEvent,
    /// `None` means no one is signed in
    pub session: Option<Session>,
}

impl SessionEvent {
    pub fn signed_in(session: Session) -> Self {
        Self {
            event: AuthEvent::SignedIn,
            session: Some(session),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            event: AuthEvent::SignedOut,
            session: None,
        }
    }

    pub fn refreshed(session: Session) -> Self {
        Self {
            event: AuthEvent::TokenRefreshed,
            session: Some(session),
        }
    }
}
