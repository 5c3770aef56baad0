// common/src/models/session.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The authenticated principal behind a session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// Stable identifier issued by the authority
    pub id: Uuid,
    pub email: String,
}

/// Authority-issued proof of authentication.
///
/// The identity is part of the session, so a session can never exist
/// without the principal it was issued to.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token presented to the row storage
    pub access_token: String,
    /// Token exchanged for a fresh session when the access token expires
    pub refresh_token: String,
    /// Instant after which the access token is no longer accepted
    pub expires_at: DateTime<Utc>,
    /// Principal the session was issued to
    pub identity: Identity,
}

impl Session {
    pub fn user_id(&self) -> Uuid {
        self.identity.id
    }

    /// Check whether the access token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Seconds left before expiry, clamped at zero
    pub fn expires_in(&self) -> i64 {
        self.expires_at
            .signed_duration_since(Utc::now())
            .num_seconds()
            .max(0)
    }

    /// Whether `other` was issued to the same principal
    pub fn same_identity(&self, other: &Session) -> bool {
        self.identity.id == other.identity.id
    }
}

// Tokens stay out of logs
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}
