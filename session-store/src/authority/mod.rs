// session-store/src/authority/mod.rs
//! Seams to the external authentication and row-storage service.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use common::{
    AuthorityError, Identity, NewCampaign, NewProfile, Profile, ProfileUpdate, SavedCampaign,
    Session, SessionEvent,
};
use futures::Stream;
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

pub use http::HttpAuthority;
pub use memory::MemoryAuthority;

/// Outcome of creating an identity
#[derive(Debug, Clone)]
pub struct SignUp {
    pub identity: Identity,
    /// Present when the authority signs the new identity in right away
    pub session: Option<Session>,
}

/// One item of the session-change stream
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeNotice {
    Changed(SessionEvent),
    /// The subscriber fell behind and this many notifications were dropped
    Lagged(u64),
}

pin_project! {
    /// Subscription to the authority's session changes.
    ///
    /// Dropping it unsubscribes.
    pub struct SessionChanges {
        #[pin]
        inner: BroadcastStream<SessionEvent>,
    }
}

impl SessionChanges {
    pub fn new(receiver: broadcast::Receiver<SessionEvent>) -> Self {
        Self {
            inner: BroadcastStream::new(receiver),
        }
    }
}

impl Stream for SessionChanges {
    type Item = ChangeNotice;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().inner.poll_next(cx).map(|item| {
            item.map(|received| match received {
                Ok(event) => ChangeNotice::Changed(event),
                Err(BroadcastStreamRecvError::Lagged(missed)) => ChangeNotice::Lagged(missed),
            })
        })
    }
}

/// Authentication half of the external authority
#[async_trait]
pub trait AuthAuthority: Send + Sync {
    async fn create_identity(
        &self,
        email: &str,
        credential: &str,
        display_name: &str,
    ) -> Result<SignUp, AuthorityError>;

    async fn authenticate(&self, email: &str, credential: &str) -> Result<Session, AuthorityError>;

    async fn invalidate_session(&self) -> Result<(), AuthorityError>;

    /// One-shot read of the session the authority currently holds
    async fn current_session(&self) -> Result<Option<Session>, AuthorityError>;

    /// Exchange the refresh token for a new session of the same identity
    async fn refresh_session(&self) -> Result<Session, AuthorityError>;

    fn subscribe(&self) -> SessionChanges;
}

/// `profiles` table
#[async_trait]
pub trait ProfileRows: Send + Sync {
    async fn fetch_profile(&self, id: Uuid) -> Result<Profile, AuthorityError>;

    async fn insert_profile(&self, row: NewProfile) -> Result<Profile, AuthorityError>;

    /// Insert the row, or overwrite email and display name if it exists
    async fn upsert_profile(&self, row: NewProfile) -> Result<Profile, AuthorityError>;

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<(), AuthorityError>;
}

/// `saved_campaigns` table
#[async_trait]
pub trait CampaignRows: Send + Sync {
    /// Campaigns owned by `owner`, newest first
    async fn list_campaigns(&self, owner: Uuid) -> Result<Vec<SavedCampaign>, AuthorityError>;

    async fn insert_campaign(
        &self,
        owner: Uuid,
        campaign: NewCampaign,
    ) -> Result<SavedCampaign, AuthorityError>;

    async fn delete_campaign(&self, owner: Uuid, id: Uuid) -> Result<(), AuthorityError>;
}

/// Everything the session store talks to
#[derive(Clone)]
pub struct Collaborators {
    pub auth: Arc<dyn AuthAuthority>,
    pub profiles: Arc<dyn ProfileRows>,
    pub campaigns: Arc<dyn CampaignRows>,
}

impl Collaborators {
    /// Use one backend for authentication and both tables
    pub fn shared<B>(backend: Arc<B>) -> Self
    where
        B: AuthAuthority + ProfileRows + CampaignRows + 'static,
    {
        Self {
            auth: backend.clone(),
            profiles: backend.clone(),
            campaigns: backend,
        }
    }

    pub fn with_auth(mut self, auth: Arc<dyn AuthAuthority>) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_profiles(mut self, profiles: Arc<dyn ProfileRows>) -> Self {
        self.profiles = profiles;
        self
    }

    /// Build the collaborators named by the configuration
    pub fn from_config(config: &common::Config) -> Result<Self, AuthorityError> {
        match config.authority {
            common::AuthorityKind::Memory => Ok(Self::shared(Arc::new(MemoryAuthority::new(
                config.notification_capacity,
            )))),
            common::AuthorityKind::Http => Ok(Self::shared(Arc::new(HttpAuthority::new(config)?))),
        }
    }
}
