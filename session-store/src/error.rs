// session-store/src/error.rs
use actix::MailboxError;
use common::AuthorityError;
use thiserror::Error;

// Shown when the failure has no better description for the user
const GENERIC_FAILURE: &str = "An unexpected error occurred";

/// Classified failure of a session store operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The authority refused to register or authenticate
    #[error("{0}")]
    AuthRejection(String),
    #[error("Could not save profile: {0}")]
    ProfilePersistence(String),
    #[error("Could not load profile: {0}")]
    ProfileFetch(String),
    #[error("Could not save campaign: {0}")]
    CampaignPersistence(String),
    #[error("No user logged in")]
    NotAuthenticated,
    #[error("Session is still loading")]
    Initializing,
    #[error("{0}")]
    Unexpected(String),
}

impl SessionError {
    /// Classify a failure of register or authenticate
    pub fn from_auth(err: AuthorityError) -> Self {
        match err {
            AuthorityError::Rejected(reason) => Self::AuthRejection(reason),
            AuthorityError::NotFound => Self::AuthRejection("Invalid login credentials".to_string()),
            AuthorityError::Storage(_) | AuthorityError::Transport(_) => {
                tracing::error!("Unexpected authority failure: {}", err);
                Self::Unexpected(GENERIC_FAILURE.to_string())
            }
        }
    }

    /// Classify a failure writing the profile row
    pub fn from_profile_write(err: AuthorityError) -> Self {
        match err {
            AuthorityError::Transport(_) => Self::Unexpected(GENERIC_FAILURE.to_string()),
            AuthorityError::NotFound => Self::ProfilePersistence("profile does not exist".to_string()),
            AuthorityError::Rejected(reason) | AuthorityError::Storage(reason) => {
                Self::ProfilePersistence(reason)
            }
        }
    }

    /// Classify a failure on the saved campaigns table
    pub fn from_campaign(err: AuthorityError) -> Self {
        match err {
            AuthorityError::Transport(_) => Self::Unexpected(GENERIC_FAILURE.to_string()),
            AuthorityError::NotFound => Self::CampaignPersistence("campaign not found".to_string()),
            AuthorityError::Rejected(reason) | AuthorityError::Storage(reason) => {
                Self::CampaignPersistence(reason)
            }
        }
    }
}

impl From<MailboxError> for SessionError {
    fn from(err: MailboxError) -> Self {
        tracing::error!("Session store unreachable: {}", err);
        Self::Unexpected(GENERIC_FAILURE.to_string())
    }
}
