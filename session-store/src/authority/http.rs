// session-store/src/authority/http.rs
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use common::{
    from_unix_seconds, AuthorityError, Config, Identity, NewCampaign, NewProfile, Profile,
    ProfileUpdate, SavedCampaign, Session, SessionEvent,
};
use reqwest::{header, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use url::Url;
use uuid::Uuid;

use super::{AuthAuthority, CampaignRows, ProfileRows, SessionChanges, SignUp};

// PostgREST content type for single-object responses
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    #[serde(default)]
    expires_at: Option<i64>,
    user: UserResponse,
}

// Sign-up answers with a session when the account needs no confirmation,
// otherwise with the bare user
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    User(UserResponse),
}

// Error payloads differ between the auth and the row endpoints
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

impl ErrorBody {
    fn reason(self) -> Option<String> {
        self.msg
            .or(self.error_description)
            .or(self.message)
            .or(self.error)
    }
}

#[derive(Serialize)]
struct CampaignInsert<'a> {
    user_id: Uuid,
    #[serde(flatten)]
    campaign: &'a NewCampaign,
}

impl UserResponse {
    fn into_identity(self, fallback_email: &str) -> Identity {
        Identity {
            id: self.id,
            email: self.email.unwrap_or_else(|| fallback_email.to_string()),
        }
    }
}

impl TokenResponse {
    fn into_session(self, fallback_email: &str) -> Session {
        let expires_at = self
            .expires_at
            .and_then(from_unix_seconds)
            .unwrap_or_else(|| Utc::now() + ChronoDuration::seconds(self.expires_in));

        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            identity: self.user.into_identity(fallback_email),
        }
    }
}

/// Client for a Supabase-compatible service: GoTrue for authentication and
/// PostgREST for the `profiles` and `saved_campaigns` tables.
///
/// Like the hosted SDK it keeps the signed-in session locally and notifies
/// subscribers whenever one of its own calls changes it.
pub struct HttpAuthority {
    http: reqwest::Client,
    base: Url,
    anon_key: String,
    session: RwLock<Option<Session>>,
    notifier: broadcast::Sender<SessionEvent>,
}

impl HttpAuthority {
    pub fn new(config: &Config) -> Result<Self, AuthorityError> {
        let service_url = config
            .service_url
            .as_deref()
            .ok_or_else(|| AuthorityError::Transport("missing service URL".to_string()))?;
        let anon_key = config
            .anon_key
            .clone()
            .ok_or_else(|| AuthorityError::Transport("missing anon key".to_string()))?;

        let mut base = Url::parse(service_url)
            .map_err(|e| AuthorityError::Transport(format!("invalid service URL: {}", e)))?;
        // Url::join replaces the last segment unless the path ends with '/'
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AuthorityError::Transport(e.to_string()))?;

        let (notifier, _) = broadcast::channel(config.notification_capacity.max(1));

        Ok(Self {
            http,
            base,
            anon_key,
            session: RwLock::new(None),
            notifier,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthorityError> {
        self.base
            .join(path)
            .map_err(|e| AuthorityError::Transport(format!("invalid endpoint {}: {}", path, e)))
    }

    fn stored_session(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store_session(&self, session: Option<Session>) -> Option<Session> {
        let mut stored = self.session.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *stored, session)
    }

    fn notify(&self, event: SessionEvent) {
        let delivered = self.notifier.send(event).unwrap_or(0);
        tracing::debug!("Session change delivered to {} subscribers", delivered);
    }

    /// Request with the public key and, when signed in, the user's bearer token
    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let bearer = self
            .stored_session()
            .map(|session| session.access_token)
            .unwrap_or_else(|| self.anon_key.clone());

        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    fn table(&self, table: &str) -> Result<Url, AuthorityError> {
        self.endpoint(&format!("rest/v1/{}", table))
    }

    async fn send(request: RequestBuilder) -> Result<Response, AuthorityError> {
        request.send().await.map_err(|e| {
            tracing::error!("Request to authority failed: {}", e);
            AuthorityError::Transport(e.to_string())
        })
    }

    /// Checks HTTP response status; returns the response on success or a classified error
    async fn ensure_success(
        response: Response,
        operation: &'static str,
    ) -> Result<Response, AuthorityError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
        tracing::warn!("{} failed with status {}: {}", operation, status, body);

        // PGRST116: a single-object request matched no rows
        if status == StatusCode::NOT_FOUND || parsed.code.as_deref() == Some("PGRST116") {
            return Err(AuthorityError::NotFound);
        }

        let reason = parsed
            .reason()
            .unwrap_or_else(|| format!("{} failed with status {}", operation, status.as_u16()));

        if status.is_client_error() {
            Err(AuthorityError::Rejected(reason))
        } else {
            Err(AuthorityError::Storage(reason))
        }
    }

    async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, AuthorityError> {
        response
            .json::<T>()
            .await
            .map_err(|e| AuthorityError::Transport(format!("malformed response: {}", e)))
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
        fallback_email: &str,
    ) -> Result<Session, AuthorityError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);

        let response = Self::send(
            self.http
                .post(url)
                .header("apikey", &self.anon_key)
                .json(&body),
        )
        .await?;
        let response = Self::ensure_success(response, "token grant").await?;
        let token: TokenResponse = Self::decode(response).await?;

        Ok(token.into_session(fallback_email))
    }
}

#[async_trait]
impl AuthAuthority for HttpAuthority {
    async fn create_identity(
        &self,
        email: &str,
        credential: &str,
        display_name: &str,
    ) -> Result<SignUp, AuthorityError> {
        let body = json!({
            "email": email,
            "password": credential,
            "data": { "full_name": display_name },
        });

        let response = Self::send(
            self.http
                .post(self.endpoint("auth/v1/signup")?)
                .header("apikey", &self.anon_key)
                .json(&body),
        )
        .await?;
        let response = Self::ensure_success(response, "sign up").await?;

        match Self::decode::<SignUpResponse>(response).await? {
            SignUpResponse::Session(token) => {
                let session = token.into_session(email);
                self.store_session(Some(session.clone()));
                self.notify(SessionEvent::signed_in(session.clone()));

                Ok(SignUp {
                    identity: session.identity.clone(),
                    session: Some(session),
                })
            }
            SignUpResponse::User(user) => {
                tracing::info!("Identity {} awaits email confirmation", user.id);
                Ok(SignUp {
                    identity: user.into_identity(email),
                    session: None,
                })
            }
        }
    }

    async fn authenticate(&self, email: &str, credential: &str) -> Result<Session, AuthorityError> {
        let session = self
            .token_grant(
                "password",
                json!({ "email": email, "password": credential }),
                email,
            )
            .await?;

        self.store_session(Some(session.clone()));
        self.notify(SessionEvent::signed_in(session.clone()));
        Ok(session)
    }

    async fn invalidate_session(&self) -> Result<(), AuthorityError> {
        // The local session goes away whatever the service answers
        let Some(session) = self.store_session(None) else {
            return Ok(());
        };
        self.notify(SessionEvent::signed_out());

        let response = Self::send(
            self.http
                .post(self.endpoint("auth/v1/logout")?)
                .header("apikey", &self.anon_key)
                .bearer_auth(&session.access_token),
        )
        .await?;
        Self::ensure_success(response, "sign out").await?;
        Ok(())
    }

    async fn current_session(&self) -> Result<Option<Session>, AuthorityError> {
        match self.stored_session() {
            Some(session) if session.is_expired() => {
                tracing::info!("Stored session expired, refreshing");
                match self.refresh_session().await {
                    Ok(session) => Ok(Some(session)),
                    Err(AuthorityError::Rejected(reason)) => {
                        tracing::warn!("Refresh rejected: {}", reason);
                        self.store_session(None);
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            }
            other => Ok(other),
        }
    }

    async fn refresh_session(&self) -> Result<Session, AuthorityError> {
        let current = self
            .stored_session()
            .ok_or_else(|| AuthorityError::rejected("Auth session missing!"))?;

        let session = self
            .token_grant(
                "refresh_token",
                json!({ "refresh_token": current.refresh_token }),
                &current.identity.email,
            )
            .await?;

        self.store_session(Some(session.clone()));
        self.notify(SessionEvent::refreshed(session.clone()));
        Ok(session)
    }

    fn subscribe(&self) -> SessionChanges {
        SessionChanges::new(self.notifier.subscribe())
    }
}

#[async_trait]
impl ProfileRows for HttpAuthority {
    async fn fetch_profile(&self, id: Uuid) -> Result<Profile, AuthorityError> {
        let mut url = self.table("profiles")?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{}", id))
            .append_pair("select", "*");

        let response =
            Self::send(self.request(Method::GET, url).header(header::ACCEPT, SINGLE_OBJECT)).await?;
        let response = Self::ensure_success(response, "profile fetch").await?;
        Self::decode(response).await
    }

    async fn insert_profile(&self, row: NewProfile) -> Result<Profile, AuthorityError> {
        let response = Self::send(
            self.request(Method::POST, self.table("profiles")?)
                .header(header::ACCEPT, SINGLE_OBJECT)
                .header("Prefer", "return=representation")
                .json(&row),
        )
        .await?;
        let response = Self::ensure_success(response, "profile insert").await?;
        Self::decode(response).await
    }

    async fn upsert_profile(&self, row: NewProfile) -> Result<Profile, AuthorityError> {
        let response = Self::send(
            self.request(Method::POST, self.table("profiles")?)
                .header(header::ACCEPT, SINGLE_OBJECT)
                .header("Prefer", "return=representation,resolution=merge-duplicates")
                .json(&row),
        )
        .await?;
        let response = Self::ensure_success(response, "profile upsert").await?;
        Self::decode(response).await
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<(), AuthorityError> {
        let mut url = self.table("profiles")?;
        url.query_pairs_mut().append_pair("id", &format!("eq.{}", id));

        let response = Self::send(
            self.request(Method::PATCH, url)
                .header("Prefer", "return=minimal")
                .json(update),
        )
        .await?;
        Self::ensure_success(response, "profile update").await?;
        Ok(())
    }
}

#[async_trait]
impl CampaignRows for HttpAuthority {
    async fn list_campaigns(&self, owner: Uuid) -> Result<Vec<SavedCampaign>, AuthorityError> {
        let mut url = self.table("saved_campaigns")?;
        url.query_pairs_mut()
            .append_pair("user_id", &format!("eq.{}", owner))
            .append_pair("select", "*")
            .append_pair("order", "created_at.desc");

        let response = Self::send(self.request(Method::GET, url)).await?;
        let response = Self::ensure_success(response, "campaign listing").await?;
        Self::decode(response).await
    }

    async fn insert_campaign(
        &self,
        owner: Uuid,
        campaign: NewCampaign,
    ) -> Result<SavedCampaign, AuthorityError> {
        let body = CampaignInsert {
            user_id: owner,
            campaign: &campaign,
        };

        let response = Self::send(
            self.request(Method::POST, self.table("saved_campaigns")?)
                .header(header::ACCEPT, SINGLE_OBJECT)
                .header("Prefer", "return=representation")
                .json(&body),
        )
        .await?;
        let response = Self::ensure_success(response, "campaign insert").await?;
        Self::decode(response).await
    }

    async fn delete_campaign(&self, owner: Uuid, id: Uuid) -> Result<(), AuthorityError> {
        let mut url = self.table("saved_campaigns")?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{}", id))
            .append_pair("user_id", &format!("eq.{}", owner));

        let response = Self::send(self.request(Method::DELETE, url)).await?;
        Self::ensure_success(response, "campaign delete").await?;
        Ok(())
    }
}
