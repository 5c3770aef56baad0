// session-store/src/handle.rs
use actix::prelude::*;
use common::{Identity, NewCampaign, Profile, ProfileUpdate, SavedCampaign};
use tokio::sync::watch;
use uuid::Uuid;

use crate::actors::session_store::{
    Authenticate, CreateProfile, DeleteCampaign, EndSession, ListCampaigns, RefreshSession,
    Register, Registration, SaveCampaign, SessionStoreActor, Shutdown, UpdateProfile,
};
use crate::authority::Collaborators;
use crate::error::SessionError;
use crate::snapshot::SessionSnapshot;

/// Cloneable handle to a running session store, passed to whatever needs it
#[derive(Clone)]
pub struct SessionHandle {
    addr: Addr<SessionStoreActor>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// Subscribe to the authority and start the store on the current arbiter.
    ///
    /// Must be called from within a running actix system.
    pub fn start(collaborators: Collaborators) -> Self {
        let (publisher, snapshots) = watch::channel(SessionSnapshot::default());

        let addr = SessionStoreActor::create(move |ctx| {
            // Owned by the context: released whenever the actor stops
            ctx.add_stream(collaborators.auth.subscribe());
            SessionStoreActor::new(collaborators, publisher)
        });

        Self { addr, snapshots }
    }

    /// Latest published state
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Wait until the store has left `Initializing`
    pub async fn ready(&self) -> Result<SessionSnapshot, SessionError> {
        let mut snapshots = self.snapshots.clone();
        let snapshot = snapshots
            .wait_for(|snapshot| !snapshot.is_initializing())
            .await
            .map_err(|_| SessionError::Unexpected("session store stopped".to_string()))?;
        Ok(snapshot.clone())
    }

    pub async fn register(
        &self,
        email: &str,
        credential: &str,
        display_name: &str,
    ) -> Result<Registration, SessionError> {
        self.addr
            .send(Register {
                email: email.to_string(),
                credential: credential.to_string(),
                display_name: display_name.to_string(),
            })
            .await?
    }

    pub async fn authenticate(&self, email: &str, credential: &str) -> Result<Identity, SessionError> {
        self.addr
            .send(Authenticate {
                email: email.to_string(),
                credential: credential.to_string(),
            })
            .await?
    }

    /// Sign out; local state is cleared even if the authority fails
    pub async fn end_session(&self) -> Result<(), SessionError> {
        self.addr.send(EndSession).await?;
        Ok(())
    }

    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<(), SessionError> {
        self.addr.send(UpdateProfile { update }).await?
    }

    /// Retry creating the profile row after a registration reported it missing
    pub async fn create_profile(&self, display_name: Option<String>) -> Result<Profile, SessionError> {
        self.addr.send(CreateProfile { display_name }).await?
    }

    pub async fn refresh_session(&self) -> Result<(), SessionError> {
        self.addr.send(RefreshSession).await?
    }

    pub async fn list_campaigns(&self) -> Result<Vec<SavedCampaign>, SessionError> {
        self.addr.send(ListCampaigns).await?
    }

    pub async fn save_campaign(&self, campaign: NewCampaign) -> Result<SavedCampaign, SessionError> {
        self.addr.send(SaveCampaign { campaign }).await?
    }

    pub async fn delete_campaign(&self, id: Uuid) -> Result<(), SessionError> {
        self.addr.send(DeleteCampaign { id }).await?
    }

    /// Stop the store; its notification subscription is dropped with it
    pub fn shutdown(&self) {
        self.addr.do_send(Shutdown);
    }
}
