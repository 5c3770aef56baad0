// session-store/tests/support/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use common::{
    AuthorityError, Identity, NewProfile, Profile, ProfileUpdate, Session, SessionEvent,
};
use session_store::{
    AuthAuthority, Collaborators, MemoryAuthority, ProfileRows, SessionChanges, SessionHandle,
    SessionSnapshot, SignUp,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, Semaphore};
use uuid::Uuid;

pub const WAIT: Duration = Duration::from_secs(2);

pub fn memory_store() -> (Arc<MemoryAuthority>, SessionHandle) {
    let authority = Arc::new(MemoryAuthority::default());
    let handle = SessionHandle::start(Collaborators::shared(authority.clone()));
    (authority, handle)
}

/// Wait until the published snapshot satisfies `predicate`
pub async fn wait_for<F>(handle: &SessionHandle, mut predicate: F) -> SessionSnapshot
where
    F: FnMut(&SessionSnapshot) -> bool,
{
    let mut snapshots = handle.watch();
    tokio::time::timeout(WAIT, async move {
        loop {
            {
                let snapshot = snapshots.borrow_and_update();
                if predicate(&snapshot) {
                    return snapshot.clone();
                }
            }
            snapshots.changed().await.expect("session store stopped");
        }
    })
    .await
    .expect("timed out waiting for session state")
}

/// Poll `condition` until it holds
pub async fn eventually<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(WAIT, async move {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for condition");
}

pub fn session_for(id: Uuid, email: &str, token: &str) -> Session {
    Session {
        access_token: token.to_string(),
        refresh_token: format!("{}-refresh", token),
        expires_at: Utc::now() + ChronoDuration::hours(1),
        identity: Identity {
            id,
            email: email.to_string(),
        },
    }
}

pub fn profile_row(id: Uuid, email: &str, display_name: &str) -> NewProfile {
    NewProfile {
        id,
        email: email.to_string(),
        display_name: Some(display_name.to_string()),
    }
}

/// Authority whose notifications are pushed by the test
pub struct ScriptedAuthority {
    notifier: broadcast::Sender<SessionEvent>,
    current: Mutex<Option<Session>>,
    queries: AtomicUsize,
}

impl ScriptedAuthority {
    pub fn new(initial: Option<Session>) -> Self {
        Self::with_capacity(initial, 64)
    }

    /// Buffer at most `capacity` notifications per subscriber
    pub fn with_capacity(initial: Option<Session>, capacity: usize) -> Self {
        let (notifier, _) = broadcast::channel(capacity);
        Self {
            notifier,
            current: Mutex::new(initial),
            queries: AtomicUsize::new(0),
        }
    }

    /// Change what `current_session` answers, without notifying
    pub fn set_current(&self, session: Option<Session>) {
        *self.current.lock().unwrap() = session;
    }

    /// Calls made to `current_session`
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn emit(&self, session: Option<Session>) {
        let event = match session {
            Some(session) => SessionEvent::signed_in(session),
            None => SessionEvent::signed_out(),
        };
        self.notifier.send(event).expect("store is not subscribed");
    }

    pub fn subscriber_count(&self) -> usize {
        self.notifier.receiver_count()
    }
}

#[async_trait]
impl AuthAuthority for ScriptedAuthority {
    async fn create_identity(&self, _: &str, _: &str, _: &str) -> Result<SignUp, AuthorityError> {
        Err(AuthorityError::rejected("Signups not allowed for this instance"))
    }

    async fn authenticate(&self, _: &str, _: &str) -> Result<Session, AuthorityError> {
        Err(AuthorityError::rejected("Invalid login credentials"))
    }

    async fn invalidate_session(&self) -> Result<(), AuthorityError> {
        Ok(())
    }

    async fn current_session(&self) -> Result<Option<Session>, AuthorityError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.current.lock().unwrap().clone())
    }

    async fn refresh_session(&self) -> Result<Session, AuthorityError> {
        Err(AuthorityError::rejected("Auth session missing!"))
    }

    fn subscribe(&self) -> SessionChanges {
        SessionChanges::new(self.notifier.subscribe())
    }
}

/// Profile rows whose fetches can be held per identity
pub struct GatedProfiles {
    inner: Arc<MemoryAuthority>,
    gates: Mutex<HashMap<Uuid, Arc<Semaphore>>>,
    completed: Mutex<HashMap<Uuid, usize>>,
}

impl GatedProfiles {
    pub fn new(inner: Arc<MemoryAuthority>) -> Self {
        Self {
            inner,
            gates: Mutex::new(HashMap::new()),
            completed: Mutex::new(HashMap::new()),
        }
    }

    /// Hold fetches for `id` until released
    pub fn hold(&self, id: Uuid) {
        self.gates.lock().unwrap().insert(id, Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self, id: Uuid) {
        if let Some(gate) = self.gates.lock().unwrap().get(&id) {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    /// Fetches for `id` that have returned to the store
    pub fn completed(&self, id: Uuid) -> usize {
        self.completed.lock().unwrap().get(&id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ProfileRows for GatedProfiles {
    async fn fetch_profile(&self, id: Uuid) -> Result<Profile, AuthorityError> {
        let gate = self.gates.lock().unwrap().get(&id).cloned();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await.expect("gate closed");
        }

        let result = self.inner.fetch_profile(id).await;
        *self.completed.lock().unwrap().entry(id).or_insert(0) += 1;
        result
    }

    async fn insert_profile(&self, row: NewProfile) -> Result<Profile, AuthorityError> {
        self.inner.insert_profile(row).await
    }

    async fn upsert_profile(&self, row: NewProfile) -> Result<Profile, AuthorityError> {
        self.inner.upsert_profile(row).await
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<(), AuthorityError> {
        self.inner.update_profile(id, update).await
    }
}

/// Profile rows whose writes fail while `failing` is set
pub struct FailingProfiles {
    inner: Arc<MemoryAuthority>,
    pub failing: AtomicBool,
    pub writes: AtomicUsize,
}

impl FailingProfiles {
    pub fn new(inner: Arc<MemoryAuthority>) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(true),
            writes: AtomicUsize::new(0),
        }
    }

    fn check(&self) -> Result<(), AuthorityError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            Err(AuthorityError::Storage("permission denied for table profiles".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ProfileRows for FailingProfiles {
    async fn fetch_profile(&self, id: Uuid) -> Result<Profile, AuthorityError> {
        self.inner.fetch_profile(id).await
    }

    async fn insert_profile(&self, row: NewProfile) -> Result<Profile, AuthorityError> {
        self.check()?;
        self.inner.insert_profile(row).await
    }

    async fn upsert_profile(&self, row: NewProfile) -> Result<Profile, AuthorityError> {
        self.check()?;
        self.inner.upsert_profile(row).await
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<(), AuthorityError> {
        self.check()?;
        self.inner.update_profile(id, update).await
    }
}

/// Wraps the memory authority with a sign-out call that never reaches the service
pub struct UnreachableLogout {
    inner: Arc<MemoryAuthority>,
}

impl UnreachableLogout {
    pub fn new(inner: Arc<MemoryAuthority>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl AuthAuthority for UnreachableLogout {
    async fn create_identity(
        &self,
        email: &str,
        credential: &str,
        display_name: &str,
    ) -> Result<SignUp, AuthorityError> {
        self.inner.create_identity(email, credential, display_name).await
    }

    async fn authenticate(&self, email: &str, credential: &str) -> Result<Session, AuthorityError> {
        self.inner.authenticate(email, credential).await
    }

    async fn invalidate_session(&self) -> Result<(), AuthorityError> {
        Err(AuthorityError::Transport("connection refused".to_string()))
    }

    async fn current_session(&self) -> Result<Option<Session>, AuthorityError> {
        self.inner.current_session().await
    }

    async fn refresh_session(&self) -> Result<Session, AuthorityError> {
        self.inner.refresh_session().await
    }

    fn subscribe(&self) -> SessionChanges {
        self.inner.subscribe()
    }
}

/// Wraps the memory authority with a sign-in whose reply lags behind its notification
pub struct DelayedSignIn {
    inner: Arc<MemoryAuthority>,
    delay: Duration,
}

impl DelayedSignIn {
    pub fn new(inner: Arc<MemoryAuthority>, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl AuthAuthority for DelayedSignIn {
    async fn create_identity(
        &self,
        email: &str,
        credential: &str,
        display_name: &str,
    ) -> Result<SignUp, AuthorityError> {
        self.inner.create_identity(email, credential, display_name).await
    }

    async fn authenticate(&self, email: &str, credential: &str) -> Result<Session, AuthorityError> {
        let session = self.inner.authenticate(email, credential).await?;
        tokio::time::sleep(self.delay).await;
        Ok(session)
    }

    async fn invalidate_session(&self) -> Result<(), AuthorityError> {
        self.inner.invalidate_session().await
    }

    async fn current_session(&self) -> Result<Option<Session>, AuthorityError> {
        self.inner.current_session().await
    }

    async fn refresh_session(&self) -> Result<Session, AuthorityError> {
        self.inner.refresh_session().await
    }

    fn subscribe(&self) -> SessionChanges {
        self.inner.subscribe()
    }
}
