// session-store/src/actors/session_store.rs
use actix::prelude::*;
use common::{
    AuthorityError, Identity, NewCampaign, NewProfile, Profile, ProfileUpdate, SavedCampaign,
    Session,
};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use crate::authority::{AuthAuthority, CampaignRows, ChangeNotice, Collaborators, ProfileRows, SignUp};
use crate::error::SessionError;
use crate::snapshot::SessionSnapshot;
use crate::state::{FetchOutcome, FetchTicket, SessionState, Transition};

/// Actor message: create an identity and its profile row
#[derive(Message)]
#[rtype(result = "Result<Registration, SessionError>")]
pub struct Register {
    pub email: String,
    pub credential: String,
    pub display_name: String,
}

/// Result of a registration whose identity was created
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub identity: Identity,
    /// Set when the profile row could not be inserted; retry with `CreateProfile`
    pub profile_error: Option<SessionError>,
}

/// Actor message: establish a session with email and credential
#[derive(Message)]
#[rtype(result = "Result<Identity, SessionError>")]
pub struct Authenticate {
    pub email: String,
    pub credential: String,
}

/// Actor message: invalidate the session and clear local state
#[derive(Message)]
#[rtype(result = "()")]
pub struct EndSession;

/// Actor message: persist a partial profile update and merge it locally.
///
/// An empty update succeeds without a write.
#[derive(Message)]
#[rtype(result = "Result<(), SessionError>")]
pub struct UpdateProfile {
    pub update: ProfileUpdate,
}

/// Actor message: (re)create the profile row of the current identity
#[derive(Message)]
#[rtype(result = "Result<Profile, SessionError>")]
pub struct CreateProfile {
    pub display_name: Option<String>,
}

/// Actor message: ask the authority for a fresh session of the current identity
#[derive(Message)]
#[rtype(result = "Result<(), SessionError>")]
pub struct RefreshSession;

/// Actor message: list saved campaigns of the current identity
#[derive(Message)]
#[rtype(result = "Result<Vec<SavedCampaign>, SessionError>")]
pub struct ListCampaigns;

/// Actor message: save a campaign for the current identity
#[derive(Message)]
#[rtype(result = "Result<SavedCampaign, SessionError>")]
pub struct SaveCampaign {
    pub campaign: NewCampaign,
}

/// Actor message: delete a saved campaign of the current identity
#[derive(Message)]
#[rtype(result = "Result<(), SessionError>")]
pub struct DeleteCampaign {
    pub id: Uuid,
}

/// Actor message: stop the store and release its subscription
#[derive(Message)]
#[rtype(result = "()")]
pub struct Shutdown;

/// Sole owner of the session, identity and profile.
///
/// Notifications, the initial query and operation results are all applied
/// on the actor, in arrival order.
pub struct SessionStoreActor {
    auth: Arc<dyn AuthAuthority>,
    profiles: Arc<dyn ProfileRows>,
    campaigns: Arc<dyn CampaignRows>,
    state: SessionState,
    publisher: watch::Sender<SessionSnapshot>,
}

impl SessionStoreActor {
    pub fn new(collaborators: Collaborators, publisher: watch::Sender<SessionSnapshot>) -> Self {
        Self {
            auth: collaborators.auth,
            profiles: collaborators.profiles,
            campaigns: collaborators.campaigns,
            state: SessionState::new(),
            publisher,
        }
    }

    fn publish(&self) {
        self.publisher.send_replace(self.state.snapshot());
    }

    /// Apply a session change and start whatever follow-up it needs
    fn transition(&mut self, session: Option<Session>, ctx: &mut Context<Self>) {
        match self.state.apply(session) {
            Transition::Unchanged => return,
            Transition::SignedOut => {
                tracing::info!("Session cleared");
            }
            Transition::SessionReplaced => {
                tracing::debug!("Session replaced for the same identity");
            }
            Transition::FetchProfile(ticket) => {
                tracing::info!("Identity {} signed in, loading profile", ticket.user_id());
                self.fetch_profile(ticket, ctx);
            }
        }
        self.publish();
    }

    /// Apply the session an operation got back, unless a newer change landed
    /// while the operation was in flight
    fn apply_reply(&mut self, seen: u64, session: Session, ctx: &mut Context<Self>) {
        if self.state.revision() != seen {
            tracing::debug!(
                "Reply for {} superseded by a newer session change",
                session.identity.id
            );
            return;
        }
        self.transition(Some(session), ctx);
    }

    fn fetch_profile(&self, ticket: FetchTicket, ctx: &mut Context<Self>) {
        let profiles = self.profiles.clone();
        let user_id = ticket.user_id();

        ctx.spawn(
            async move { profiles.fetch_profile(user_id).await }
                .into_actor(self)
                .map(move |result, act, _ctx| {
                    match act.state.resolve_profile(ticket, result) {
                        FetchOutcome::Applied => {
                            tracing::info!("Profile ready for {}", user_id);
                            act.publish();
                        }
                        FetchOutcome::Unavailable(e) => {
                            let err = SessionError::ProfileFetch(e.to_string());
                            tracing::error!("Error fetching profile for {}: {}", user_id, err);
                            act.publish();
                        }
                        FetchOutcome::Stale => {
                            tracing::debug!(
                                "Discarded stale profile fetch for {} (generation {})",
                                user_id,
                                ticket.generation()
                            );
                        }
                    }
                }),
        );
    }

    /// Re-read the authority's session and apply it as a notification
    fn resync(&self, ctx: &mut Context<Self>) {
        let auth = self.auth.clone();
        ctx.spawn(
            async move { auth.current_session().await }
                .into_actor(self)
                .map(|result, act, ctx| match result {
                    Ok(session) => act.transition(session, ctx),
                    Err(e) => tracing::error!("Failed to resynchronise session: {}", e),
                }),
        );
    }

    /// Identity required by an operation, or the reason it is missing
    fn require_identity(&self) -> Result<Identity, SessionError> {
        if self.state.is_initializing() {
            return Err(SessionError::Initializing);
        }
        self.state
            .identity()
            .cloned()
            .ok_or(SessionError::NotAuthenticated)
    }
}

impl Actor for SessionStoreActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!("SessionStoreActor started, querying current session");

        let auth = self.auth.clone();
        ctx.spawn(
            async move { auth.current_session().await }
                .into_actor(self)
                .map(|result, act, ctx| {
                    // A notification got here first and is newer than this answer
                    if !act.state.is_initializing() {
                        tracing::debug!("Initial session query superseded by a notification");
                        return;
                    }

                    match result {
                        Ok(session) => act.transition(session, ctx),
                        Err(e) => {
                            tracing::error!("Initial session query failed: {}", e);
                            act.transition(None, ctx);
                        }
                    }
                }),
        );
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("SessionStoreActor stopped, session subscription released");
    }
}

impl StreamHandler<ChangeNotice> for SessionStoreActor {
    fn handle(&mut self, notice: ChangeNotice, ctx: &mut Self::Context) {
        match notice {
            ChangeNotice::Changed(event) => {
                tracing::debug!("Session change notification: {:?}", event.event);
                self.transition(event.session, ctx);
            }
            ChangeNotice::Lagged(missed) => {
                tracing::warn!("Missed {} session notifications, resynchronising", missed);
                self.resync(ctx);
            }
        }
    }

    fn finished(&mut self, _ctx: &mut Self::Context) {
        // Keep serving the last known state
        tracing::warn!("Session change stream ended");
    }
}

impl Handler<Register> for SessionStoreActor {
    type Result = ResponseActFuture<Self, Result<Registration, SessionError>>;

    fn handle(&mut self, msg: Register, _ctx: &mut Self::Context) -> Self::Result {
        let auth = self.auth.clone();
        let profiles = self.profiles.clone();
        let seen = self.state.revision();

        let work = async move {
            let sign_up: SignUp = auth
                .create_identity(&msg.email, &msg.credential, &msg.display_name)
                .await
                .map_err(SessionError::from_auth)?;

            let row = NewProfile {
                id: sign_up.identity.id,
                email: msg.email,
                display_name: Some(msg.display_name),
            };
            let inserted = profiles.insert_profile(row).await;

            Ok::<_, SessionError>((sign_up, inserted))
        };

        Box::pin(work.into_actor(self).map(move |result, act, ctx| {
            let (sign_up, inserted) = result?;
            tracing::info!("Registered identity {}", sign_up.identity.id);

            if let Some(session) = sign_up.session {
                act.apply_reply(seen, session, ctx);
            }

            let profile_error = match inserted {
                Ok(profile) => {
                    if act.state.offer_profile(profile) {
                        act.publish();
                    }
                    None
                }
                Err(e) => {
                    tracing::error!(
                        "Error creating profile for {}: {}",
                        sign_up.identity.id,
                        e
                    );
                    Some(SessionError::from_profile_write(e))
                }
            };

            Ok(Registration {
                identity: sign_up.identity,
                profile_error,
            })
        }))
    }
}

impl Handler<Authenticate> for SessionStoreActor {
    type Result = ResponseActFuture<Self, Result<Identity, SessionError>>;

    fn handle(&mut self, msg: Authenticate, _ctx: &mut Self::Context) -> Self::Result {
        let auth = self.auth.clone();
        let seen = self.state.revision();

        Box::pin(
            async move { auth.authenticate(&msg.email, &msg.credential).await }
                .into_actor(self)
                .map(move |result, act, ctx| {
                    let session = result.map_err(|e| {
                        tracing::warn!("Sign in rejected: {}", e);
                        SessionError::from_auth(e)
                    })?;

                    let identity = session.identity.clone();
                    act.apply_reply(seen, session, ctx);
                    Ok(identity)
                }),
        )
    }
}

impl Handler<EndSession> for SessionStoreActor {
    type Result = ResponseActFuture<Self, ()>;

    fn handle(&mut self, _msg: EndSession, _ctx: &mut Self::Context) -> Self::Result {
        let auth = self.auth.clone();

        Box::pin(
            async move { auth.invalidate_session().await }
                .into_actor(self)
                .map(|result, act, ctx| {
                    if let Err(e) = result {
                        tracing::warn!("Error signing out: {}", e);
                    }
                    act.transition(None, ctx);
                }),
        )
    }
}

impl Handler<UpdateProfile> for SessionStoreActor {
    type Result = ResponseActFuture<Self, Result<(), SessionError>>;

    fn handle(&mut self, msg: UpdateProfile, _ctx: &mut Self::Context) -> Self::Result {
        let user_id = match self.require_identity() {
            Ok(identity) => identity.id,
            Err(e) => return Box::pin(actix::fut::ready(Err(e))),
        };
        // Nothing to persist
        if msg.update.is_empty() {
            return Box::pin(actix::fut::ready(Ok(())));
        }
        let profiles = self.profiles.clone();
        let update = msg.update;

        Box::pin(
            async move {
                profiles
                    .update_profile(user_id, &update)
                    .await
                    .map(|_| update)
            }
            .into_actor(self)
            .map(move |result, act, _ctx| {
                let update = result.map_err(|e: AuthorityError| {
                    tracing::error!("Error updating profile for {}: {}", user_id, e);
                    SessionError::from_profile_write(e)
                })?;

                if act.state.merge_profile(user_id, &update) {
                    act.publish();
                }
                Ok(())
            }),
        )
    }
}

impl Handler<CreateProfile> for SessionStoreActor {
    type Result = ResponseActFuture<Self, Result<Profile, SessionError>>;

    fn handle(&mut self, msg: CreateProfile, _ctx: &mut Self::Context) -> Self::Result {
        let identity = match self.require_identity() {
            Ok(identity) => identity,
            Err(e) => return Box::pin(actix::fut::ready(Err(e))),
        };
        let profiles = self.profiles.clone();
        let row = NewProfile {
            id: identity.id,
            email: identity.email,
            display_name: msg.display_name,
        };

        Box::pin(
            async move { profiles.upsert_profile(row).await }
                .into_actor(self)
                .map(|result, act, _ctx| {
                    let profile = result.map_err(SessionError::from_profile_write)?;
                    if act.state.offer_profile(profile.clone()) {
                        act.publish();
                    }
                    Ok(profile)
                }),
        )
    }
}

impl Handler<RefreshSession> for SessionStoreActor {
    type Result = ResponseActFuture<Self, Result<(), SessionError>>;

    fn handle(&mut self, _msg: RefreshSession, _ctx: &mut Self::Context) -> Self::Result {
        if let Err(e) = self.require_identity() {
            return Box::pin(actix::fut::ready(Err(e)));
        }
        let auth = self.auth.clone();
        let seen = self.state.revision();

        Box::pin(
            async move { auth.refresh_session().await }
                .into_actor(self)
                .map(move |result, act, ctx| {
                    let session = result.map_err(SessionError::from_auth)?;
                    act.apply_reply(seen, session, ctx);
                    Ok(())
                }),
        )
    }
}

impl Handler<ListCampaigns> for SessionStoreActor {
    type Result = ResponseFuture<Result<Vec<SavedCampaign>, SessionError>>;

    fn handle(&mut self, _msg: ListCampaigns, _ctx: &mut Self::Context) -> Self::Result {
        let owner = self.require_identity().map(|identity| identity.id);
        let campaigns = self.campaigns.clone();

        Box::pin(async move {
            campaigns
                .list_campaigns(owner?)
                .await
                .map_err(SessionError::from_campaign)
        })
    }
}

impl Handler<SaveCampaign> for SessionStoreActor {
    type Result = ResponseFuture<Result<SavedCampaign, SessionError>>;

    fn handle(&mut self, msg: SaveCampaign, _ctx: &mut Self::Context) -> Self::Result {
        let owner = self.require_identity().map(|identity| identity.id);
        let campaigns = self.campaigns.clone();

        Box::pin(async move {
            let saved = campaigns
                .insert_campaign(owner?, msg.campaign)
                .await
                .map_err(SessionError::from_campaign)?;
            tracing::info!("Saved campaign {} ({})", saved.id, saved.kind);
            Ok(saved)
        })
    }
}

impl Handler<DeleteCampaign> for SessionStoreActor {
    type Result = ResponseFuture<Result<(), SessionError>>;

    fn handle(&mut self, msg: DeleteCampaign, _ctx: &mut Self::Context) -> Self::Result {
        let owner = self.require_identity().map(|identity| identity.id);
        let campaigns = self.campaigns.clone();

        Box::pin(async move {
            campaigns
                .delete_campaign(owner?, msg.id)
                .await
                .map_err(SessionError::from_campaign)
        })
    }
}

impl Handler<Shutdown> for SessionStoreActor {
    type Result = ();

    fn handle(&mut self, _msg: Shutdown, ctx: &mut Self::Context) -> Self::Result {
        ctx.stop();
    }
}
