// common/src/config.rs
use config::{Config as ConfigFile, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use url::Url;

/// Which collaborator backs the session store
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorityKind {
    /// In-process authority, nothing leaves the machine
    #[default]
    Memory,
    /// Hosted auth + row storage service reached over HTTP
    Http,
}

impl std::str::FromStr for AuthorityKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "http" => Ok(Self::Http),
            other => Err(ConfigError::Message(format!("unknown authority kind: {}", other))),
        }
    }
}

/// Startup configuration for the session store
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub authority: AuthorityKind,
    /// Base URL of the hosted service, e.g. `https://project.example.co`
    pub service_url: Option<String>,
    /// Public (anonymous) API key of the hosted service
    pub anon_key: Option<String>,
    pub request_timeout_secs: u64,
    pub log_level: String,
    /// Buffered session-change notifications per subscriber
    pub notification_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            authority: AuthorityKind::Memory,
            service_url: None,
            anon_key: None,
            request_timeout_secs: 30,
            log_level: "info".to_string(),
            notification_capacity: 64,
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, ConfigError> {
        // Get the run mode, defaulting to "development"
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config_dir = env::var("CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                // Check if we're in the project root or a subcrate
                let mut path = PathBuf::from("./config");
                if !path.exists() {
                    path = PathBuf::from("../config");
                }
                path
            });

        tracing::info!("Loading configuration from {}", config_dir.display());
        tracing::info!("Using run mode: {}", run_mode);

        let config: Self = ConfigFile::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", run_mode))).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Environment variables with prefix "APP", e.g. APP__SERVICE_URL
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Load from files, falling back to plain `NEXUS_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        match Self::load() {
            Ok(config) => {
                tracing::info!("Configuration loaded from files and environment");
                Ok(config)
            }
            Err(e) => {
                tracing::warn!("Failed to load configuration from files: {}", e);
                tracing::info!("Falling back to environment variables only");

                let defaults = Self::default();

                let authority = match env::var("NEXUS_AUTHORITY") {
                    Ok(value) => value.parse()?,
                    Err(_) => defaults.authority,
                };

                let request_timeout_secs = env::var("NEXUS_REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(defaults.request_timeout_secs);

                let config = Self {
                    authority,
                    service_url: env::var("NEXUS_SERVICE_URL").ok(),
                    anon_key: env::var("NEXUS_ANON_KEY").ok(),
                    request_timeout_secs,
                    log_level: env::var("NEXUS_LOG_LEVEL").unwrap_or(defaults.log_level),
                    notification_capacity: defaults.notification_capacity,
                };

                config.validate()?;
                Ok(config)
            }
        }
    }

    /// The hosted authority cannot start without an endpoint and a public key
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.notification_capacity == 0 {
            return Err(ConfigError::Message(
                "notification_capacity must be greater than zero".to_string(),
            ));
        }

        if self.authority != AuthorityKind::Http {
            return Ok(());
        }

        let url = self
            .service_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ConfigError::Message("Missing service_url for http authority".to_string()))?;

        Url::parse(url)
            .map_err(|e| ConfigError::Message(format!("Invalid service_url {}: {}", url, e)))?;

        if self.anon_key.as_deref().map_or(true, |key| key.trim().is_empty()) {
            return Err(ConfigError::Message(
                "Missing anon_key for http authority".to_string(),
            ));
        }

        Ok(())
    }
}
