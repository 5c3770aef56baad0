// session-store/src/authority/memory.rs
use async_trait::async_trait;
use chrono::{Duration, Utc};
use common::{
    digest_credential, generate_secure_token, issue_access_token, looks_like_email,
    AuthorityError, Identity, NewCampaign, NewProfile, Profile, ProfileUpdate, SavedCampaign,
    Session, SessionEvent,
};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{AuthAuthority, CampaignRows, ProfileRows, SessionChanges, SignUp};

// Same policy the hosted service applies by default
const MIN_PASSWORD_LEN: usize = 6;
// Access token lifetime (1 hour)
const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

struct Account {
    identity: Identity,
    salt: String,
    digest: String,
}

/// In-process authority with the same observable behaviour as the hosted service.
///
/// Holds at most one signed-in session, like a single browser tab.
pub struct MemoryAuthority {
    // Keyed by lowercased email
    accounts: DashMap<String, Account>,
    profiles: DashMap<Uuid, Profile>,
    // Insertion sequence breaks created_at ties when listing
    campaigns: DashMap<Uuid, (u64, SavedCampaign)>,
    campaign_seq: AtomicU64,
    current: Mutex<Option<Session>>,
    notifier: broadcast::Sender<SessionEvent>,
    signing_key: Vec<u8>,
    token_ttl: Duration,
}

impl Default for MemoryAuthority {
    fn default() -> Self {
        Self::new(64)
    }
}

impl MemoryAuthority {
    pub fn new(notification_capacity: usize) -> Self {
        let (notifier, _) = broadcast::channel(notification_capacity.max(1));
        Self {
            accounts: DashMap::new(),
            profiles: DashMap::new(),
            campaigns: DashMap::new(),
            campaign_seq: AtomicU64::new(0),
            current: Mutex::new(None),
            notifier,
            signing_key: generate_secure_token(32).into_bytes(),
            token_ttl: Duration::seconds(DEFAULT_TOKEN_TTL_SECS),
        }
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Key the access tokens are signed with
    pub fn signing_key(&self) -> &[u8] {
        &self.signing_key
    }

    /// Number of live session-change subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.notifier.receiver_count()
    }

    fn issue_session(&self, identity: Identity) -> Result<Session, AuthorityError> {
        let (access_token, expires_at) =
            issue_access_token(&identity, &self.signing_key, self.token_ttl)
                .map_err(|e| AuthorityError::Storage(format!("failed to sign token: {}", e)))?;

        Ok(Session {
            access_token,
            refresh_token: generate_secure_token(32),
            expires_at,
            identity,
        })
    }

    fn replace_current(&self, session: Option<Session>) -> Option<Session> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, session)
    }

    fn peek_current(&self) -> Option<Session> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn notify(&self, event: SessionEvent) {
        // No subscribers is fine
        let delivered = self.notifier.send(event).unwrap_or(0);
        tracing::debug!("Session change delivered to {} subscribers", delivered);
    }
}

fn normalize_email(email: &str) -> Result<String, AuthorityError> {
    let email = email.trim().to_lowercase();
    if looks_like_email(&email) {
        Ok(email)
    } else {
        Err(AuthorityError::rejected(
            "Unable to validate email address: invalid format",
        ))
    }
}

#[async_trait]
impl AuthAuthority for MemoryAuthority {
    async fn create_identity(
        &self,
        email: &str,
        credential: &str,
        _display_name: &str,
    ) -> Result<SignUp, AuthorityError> {
        let email = normalize_email(email)?;
        if credential.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthorityError::rejected(format!(
                "Password should be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let identity = Identity {
            id: Uuid::new_v4(),
            email: email.clone(),
        };

        match self.accounts.entry(email) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(AuthorityError::rejected("User already registered"));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let salt = generate_secure_token(16);
                let digest = digest_credential(&salt, credential);
                slot.insert(Account {
                    identity: identity.clone(),
                    salt,
                    digest,
                });
            }
        }

        tracing::info!("Created identity {}", identity.id);

        // Accounts are confirmed on creation, so the new identity is signed in
        let session = self.issue_session(identity.clone())?;
        self.replace_current(Some(session.clone()));
        self.notify(SessionEvent::signed_in(session.clone()));

        Ok(SignUp {
            identity,
            session: Some(session),
        })
    }

    async fn authenticate(&self, email: &str, credential: &str) -> Result<Session, AuthorityError> {
        let email = email.trim().to_lowercase();
        let identity = match self.accounts.get(&email) {
            Some(account) if digest_credential(&account.salt, credential) == account.digest => {
                account.identity.clone()
            }
            _ => {
                tracing::debug!("Rejected credentials for {}", email);
                return Err(AuthorityError::rejected("Invalid login credentials"));
            }
        };

        let session = self.issue_session(identity)?;
        self.replace_current(Some(session.clone()));
        self.notify(SessionEvent::signed_in(session.clone()));

        Ok(session)
    }

    async fn invalidate_session(&self) -> Result<(), AuthorityError> {
        if let Some(session) = self.replace_current(None) {
            tracing::info!("Invalidated session for {}", session.identity.id);
            self.notify(SessionEvent::signed_out());
        }
        Ok(())
    }

    async fn current_session(&self) -> Result<Option<Session>, AuthorityError> {
        Ok(self.peek_current().filter(|session| !session.is_expired()))
    }

    async fn refresh_session(&self) -> Result<Session, AuthorityError> {
        let current = self
            .peek_current()
            .ok_or_else(|| AuthorityError::rejected("Auth session missing!"))?;

        let session = self.issue_session(current.identity)?;
        self.replace_current(Some(session.clone()));
        self.notify(SessionEvent::refreshed(session.clone()));

        Ok(session)
    }

    fn subscribe(&self) -> SessionChanges {
        SessionChanges::new(self.notifier.subscribe())
    }
}

#[async_trait]
impl ProfileRows for MemoryAuthority {
    async fn fetch_profile(&self, id: Uuid) -> Result<Profile, AuthorityError> {
        self.profiles
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(AuthorityError::NotFound)
    }

    async fn insert_profile(&self, row: NewProfile) -> Result<Profile, AuthorityError> {
        match self.profiles.entry(row.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(AuthorityError::rejected(
                "duplicate key value violates unique constraint \"profiles_pkey\"",
            )),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let profile = Profile::from_new(row, Utc::now());
                slot.insert(profile.clone());
                Ok(profile)
            }
        }
    }

    async fn upsert_profile(&self, row: NewProfile) -> Result<Profile, AuthorityError> {
        let now = Utc::now();
        let mut entry = self
            .profiles
            .entry(row.id)
            .or_insert_with(|| Profile::from_new(row.clone(), now));

        let profile = entry.value_mut();
        profile.email = row.email;
        profile.display_name = row.display_name;
        profile.updated_at = now;
        Ok(profile.clone())
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<(), AuthorityError> {
        let mut entry = self.profiles.get_mut(&id).ok_or(AuthorityError::NotFound)?;
        let profile = entry.value_mut();
        profile.merge(update);
        profile.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl CampaignRows for MemoryAuthority {
    async fn list_campaigns(&self, owner: Uuid) -> Result<Vec<SavedCampaign>, AuthorityError> {
        let mut owned: Vec<(u64, SavedCampaign)> = self
            .campaigns
            .iter()
            .filter(|entry| entry.value().1.user_id == owner)
            .map(|entry| entry.value().clone())
            .collect();

        owned.sort_by(|(a_seq, a), (b_seq, b)| {
            b.created_at.cmp(&a.created_at).then(b_seq.cmp(a_seq))
        });

        Ok(owned.into_iter().map(|(_, campaign)| campaign).collect())
    }

    async fn insert_campaign(
        &self,
        owner: Uuid,
        campaign: NewCampaign,
    ) -> Result<SavedCampaign, AuthorityError> {
        let seq = self.campaign_seq.fetch_add(1, Ordering::SeqCst);
        let saved = campaign.into_saved(Uuid::new_v4(), owner, Utc::now());
        self.campaigns.insert(saved.id, (seq, saved.clone()));
        Ok(saved)
    }

    async fn delete_campaign(&self, owner: Uuid, id: Uuid) -> Result<(), AuthorityError> {
        self.campaigns
            .remove_if(&id, |_, (_, campaign)| campaign.user_id == owner)
            .map(|_| ())
            .ok_or(AuthorityError::NotFound)
    }
}
