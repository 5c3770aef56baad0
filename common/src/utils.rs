// common/src/utils.rs
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::str::FromStr;
use tracing::subscriber::SetGlobalDefaultError;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::models::Identity;

/// Setup tracing for the console and the store, falling back to INFO on an unknown level
pub fn setup_tracing(level: &str) -> Result<(), SetGlobalDefaultError> {
    let level = Level::from_str(level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();

    tracing::subscriber::set_global_default(subscriber)
}

// Access token claims, shaped like the hosted service's tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,   // identity id
    pub email: String,
    pub exp: usize,    // expiration time
    pub iat: usize,    // issued at time
    pub jti: String,   // unique per issued token
}

/// Issue an HS256 access token for `identity`, returning it with its expiry
pub fn issue_access_token(
    identity: &Identity,
    secret: &[u8],
    ttl: Duration,
) -> Result<(String, DateTime<Utc>), jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let expires_at = now + ttl;

    let claims = AccessClaims {
        sub: identity.id.to_string(),
        email: identity.email.clone(),
        iat: now.timestamp().max(0) as usize,
        exp: expires_at.timestamp().max(0) as usize,
        jti: generate_secure_token(16),
    };

    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(secret))?;
    Ok((token, expires_at))
}

/// Validate an access token and return its claims
pub fn validate_access_token(
    token: &str,
    secret: &[u8],
) -> Result<AccessClaims, jsonwebtoken::errors::Error> {
    let validation = Validation::new(Algorithm::HS256);
    let token_data = decode::<AccessClaims>(token, &DecodingKey::from_secret(secret), &validation)?;
    Ok(token_data.claims)
}

/// Convert a unix timestamp in seconds, as sent by the authority
pub fn from_unix_seconds(seconds: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(seconds, 0).single()
}

/// Loose address check: something@domain.tld, no whitespace
pub fn looks_like_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.split('.').count() >= 2
                && domain.split('.').all(|label| !label.is_empty())
        }
        None => false,
    }
}

/// Generate a random alphanumeric token of the given length
pub fn generate_secure_token(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Hash a string using SHA-256
pub fn hash_string(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Salted digest of a credential
pub fn digest_credential(salt: &str, credential: &str) -> String {
    hash_string(&format!("{}:{}", salt, credential))
}
