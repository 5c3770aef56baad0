// session-store/src/state.rs
//! Session/profile state machine, free of any runtime.
//!
//! Every session change, whether it comes from the initial query, a pushed
//! notification or an operation result, goes through [`SessionState::apply`].
//! Profile fetches are tracked by [`FetchTicket`]s: a fetch may only land if its
//! ticket is still the pending one when it resolves.

use common::{AuthorityError, Identity, Profile, ProfileUpdate, Session};
use uuid::Uuid;

use crate::snapshot::SessionSnapshot;

/// Profile sub-state while authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileStatus {
    Loading,
    Ready,
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Unauthenticated,
    Authenticated(ProfileStatus),
}

/// Identifies one issued profile fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
    user_id: Uuid,
}

impl FetchTicket {
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// What the owner of the state has to do after a session change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing observable changed
    Unchanged,
    SignedOut,
    /// New tokens for the same identity; the profile stays as it is
    SessionReplaced,
    /// A profile fetch has to be issued for this ticket
    FetchProfile(FetchTicket),
}

/// Result of resolving a profile fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    Unavailable(AuthorityError),
    /// The identity changed (or the profile settled) while the fetch was in flight
    Stale,
}

#[derive(Debug, Clone)]
pub struct SessionState {
    phase: Phase,
    session: Option<Session>,
    profile: Option<Profile>,
    // Bumped on every identity change and sign-out
    generation: u64,
    // Bumped on every applied session change, token replacements included
    revision: u64,
    pending: Option<FetchTicket>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Initializing,
            session: None,
            profile: None,
            generation: 0,
            revision: 0,
            pending: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_initializing(&self) -> bool {
        self.phase == Phase::Initializing
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.session.as_ref().map(|session| &session.identity)
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of session changes applied so far
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Apply a session change
    pub fn apply(&mut self, session: Option<Session>) -> Transition {
        let transition = match session {
            None => self.sign_out(),
            Some(session) => self.sign_in(session),
        };
        if transition != Transition::Unchanged {
            self.revision += 1;
        }
        transition
    }

    fn sign_out(&mut self) -> Transition {
        if self.phase == Phase::Unauthenticated {
            return Transition::Unchanged;
        }

        self.generation += 1;
        self.phase = Phase::Unauthenticated;
        self.session = None;
        self.profile = None;
        self.pending = None;
        Transition::SignedOut
    }

    fn sign_in(&mut self, session: Session) -> Transition {
        let kept = match (&self.session, self.phase) {
            (Some(current), Phase::Authenticated(status)) if current.same_identity(&session) => {
                if current.access_token == session.access_token {
                    return Transition::Unchanged;
                }
                Some(status)
            }
            _ => None,
        };

        self.session = Some(session);
        match kept {
            Some(ProfileStatus::Ready | ProfileStatus::Loading) => Transition::SessionReplaced,
            // Same identity without a profile: a fresh session gets a fresh fetch
            Some(ProfileStatus::Unavailable) => self.issue_fetch(),
            None => {
                self.profile = None;
                self.issue_fetch()
            }
        }
    }

    fn issue_fetch(&mut self) -> Transition {
        self.generation += 1;
        let user_id = match &self.session {
            Some(session) => session.user_id(),
            None => return Transition::Unchanged,
        };

        let ticket = FetchTicket {
            generation: self.generation,
            user_id,
        };
        self.pending = Some(ticket);
        self.phase = Phase::Authenticated(ProfileStatus::Loading);
        Transition::FetchProfile(ticket)
    }

    fn is_live(&self, ticket: &FetchTicket) -> bool {
        self.pending.as_ref() == Some(ticket)
            && self.phase == Phase::Authenticated(ProfileStatus::Loading)
            && self.identity().map(|identity| identity.id) == Some(ticket.user_id)
    }

    /// Land a profile fetch, unless it went stale while in flight
    pub fn resolve_profile(
        &mut self,
        ticket: FetchTicket,
        result: Result<Profile, AuthorityError>,
    ) -> FetchOutcome {
        if !self.is_live(&ticket) {
            return FetchOutcome::Stale;
        }
        self.pending = None;

        match result {
            Ok(profile) if profile.id == ticket.user_id => {
                self.profile = Some(profile);
                self.phase = Phase::Authenticated(ProfileStatus::Ready);
                FetchOutcome::Applied
            }
            Ok(profile) => {
                self.phase = Phase::Authenticated(ProfileStatus::Unavailable);
                FetchOutcome::Unavailable(AuthorityError::Storage(format!(
                    "profile {} returned for identity {}",
                    profile.id, ticket.user_id
                )))
            }
            Err(e) => {
                self.phase = Phase::Authenticated(ProfileStatus::Unavailable);
                FetchOutcome::Unavailable(e)
            }
        }
    }

    /// Adopt a profile row obtained outside a fetch (insert or upsert result).
    ///
    /// Only accepted for the current identity; any pending fetch is superseded.
    pub fn offer_profile(&mut self, profile: Profile) -> bool {
        let current = self.identity().map(|identity| identity.id);
        if current != Some(profile.id) {
            return false;
        }

        self.pending = None;
        self.profile = Some(profile);
        self.phase = Phase::Authenticated(ProfileStatus::Ready);
        true
    }

    /// Merge a persisted partial update into the cached profile of `user_id`
    pub fn merge_profile(&mut self, user_id: Uuid, update: &ProfileUpdate) -> bool {
        if self.identity().map(|identity| identity.id) != Some(user_id) {
            return false;
        }

        match self.profile.as_mut() {
            Some(profile) => {
                profile.merge(update);
                true
            }
            None => false,
        }
    }

    /// Immutable copy for consumers
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            session: self.session.clone(),
            profile: self.profile.clone(),
        }
    }
}
