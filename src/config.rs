//! Worker and proxy configuration.
//!
//! Every field has a default equal to what the Forex Academy worker shipped
//! with, so an absent or partial JSON file only overrides what it names.
//!
//! ```json
//! {
//!   "version": "v2",
//!   "upstream": "http://127.0.0.1:8001",
//!   "sync_interval_secs": 300
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config field `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Texts and images used when a push payload leaves a field out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationDefaults {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub open_action_title: String,
    pub dismiss_action_title: String,
}

impl Default for NotificationDefaults {
    fn default() -> Self {
        Self {
            title: "Forex Academy".to_owned(),
            body: "Nueva actualización disponible".to_owned(),
            icon: "/icon-192.png".to_owned(),
            badge: "/icon-96.png".to_owned(),
            open_action_title: "Abrir App".to_owned(),
            dismiss_action_title: "Descartar".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Deployment generation. Part of every namespace name; bumping it
    /// invalidates all cached content on the next activation.
    pub version: String,
    pub cache_prefix: String,
    /// Requests whose path starts with this go network-first.
    pub api_prefix: String,
    /// Fetched all-or-nothing at install time.
    pub static_manifest: Vec<String>,
    /// Fetched best-effort at install time and on every data sync.
    pub api_manifest: Vec<String>,
    pub sync_tag: String,
    /// Opened when the user picks the "open" notification action.
    pub app_root: String,
    pub notification: NotificationDefaults,
    /// Origin the proxy forwards to.
    pub upstream: String,
    pub listen: String,
    /// Fire the data sync on this interval. `None` disables the timer.
    pub sync_interval_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "v1".to_owned(),
            cache_prefix: "forex-academy".to_owned(),
            api_prefix: "/api/".to_owned(),
            static_manifest: vec![
                "/".to_owned(),
                "/static/js/main.js".to_owned(),
                "/static/css/main.css".to_owned(),
                "/manifest.json".to_owned(),
                "https://fonts.googleapis.com/css2?family=Inter:wght@400;500;600;700;800&display=swap"
                    .to_owned(),
            ],
            api_manifest: vec![
                "/api/health".to_owned(),
                "/api/courses".to_owned(),
                "/api/market/news".to_owned(),
                "/api/subscription/plans".to_owned(),
                "/api/subscription/features".to_owned(),
                "/api/telegram/info".to_owned(),
            ],
            sync_tag: "forex-data-sync".to_owned(),
            app_root: "/".to_owned(),
            notification: NotificationDefaults::default(),
            upstream: "http://127.0.0.1:8001".to_owned(),
            listen: "127.0.0.1:8080".to_owned(),
            sync_interval_secs: None,
        }
    }
}

/// The three namespace names a worker generation owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceNames {
    pub static_assets: String,
    pub api: String,
    /// Never written to; only protected from cleanup.
    pub generic: String,
}

impl NamespaceNames {
    pub fn contains(&self, name: &str) -> bool {
        name == self.static_assets || name == self.api || name == self.generic
    }
}

impl Config {
    /// Loads the config from `path`, or returns the defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let contents =
                    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                        path: path.to_path_buf(),
                        source,
                    })?;
                Self::from_json(&contents)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(contents)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.api_prefix.starts_with('/') {
            return Err(ConfigError::Invalid {
                field: "api_prefix",
                reason: format!("`{}` must start with `/`", self.api_prefix),
            });
        }
        if !self.app_root.starts_with('/') {
            return Err(ConfigError::Invalid {
                field: "app_root",
                reason: format!("`{}` must start with `/`", self.app_root),
            });
        }
        if self.sync_tag.is_empty() {
            return Err(ConfigError::Invalid {
                field: "sync_tag",
                reason: "must not be empty".to_owned(),
            });
        }
        if self.sync_interval_secs == Some(0) {
            return Err(ConfigError::Invalid {
                field: "sync_interval_secs",
                reason: "must be greater than zero".to_owned(),
            });
        }
        self.upstream_url()?;
        Ok(())
    }

    pub fn upstream_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.upstream).map_err(|e| ConfigError::Invalid {
            field: "upstream",
            reason: e.to_string(),
        })
    }

    pub fn namespaces(&self) -> NamespaceNames {
        NamespaceNames {
            static_assets: format!("{}-static-{}", self.cache_prefix, self.version),
            api: format!("{}-api-{}", self.cache_prefix, self.version),
            generic: format!("{}-{}", self.cache_prefix, self.version),
        }
    }

    /// `true` if `path` is served network-first.
    pub fn is_api_path(&self, path: &str) -> bool {
        path.starts_with(&self.api_prefix)
    }
}
