//! Application configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! environment variables. The binary applies command line overrides last and
//! calls [`AppConfig::validate`] before anything is started.

use crate::error::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "reddit-filters.toml";

pub const ENV_CLIENT_ID: &str = "REDDIT_CLIENT";
pub const ENV_CLIENT_SECRET: &str = "REDDIT_SECRET";
pub const ENV_REDIRECT_URI: &str = "REDDIT_REDIRECT_URI";
pub const ENV_USER_AGENT: &str = "REDDIT_USER_AGENT";
pub const ENV_RATE_LIMIT_MS: &str = "REDDIT_RATE_LIMIT_MS";
pub const ENV_SESSION_AUTHENTICATION: &str = "REDDIT_SESSION_AUTHENTICATION";
pub const ENV_SESSION_ENCRYPTION: &str = "REDDIT_SESSION_ENCRYPTION";

/// Minimum combined length of the two session secrets.
pub const MIN_SESSION_SECRET_LEN: usize = 32;

pub const MAX_SESSION_MAX_AGE_DAYS: i64 = 3650;

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub reddit: RedditConfig,
    pub session: SessionConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub assets_dir: PathBuf,
}

#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct RedditConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub user_agent: String,
    /// Minimum spacing between upstream requests; 0 disables limiting.
    pub rate_limit_ms: u64,
    pub api_base_url: String,
}

#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub max_age_days: i64,
    pub authentication_key: String,
    pub encryption_key: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8087,
            assets_dir: PathBuf::from("assets"),
        }
    }
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: "http://localhost:8087/login/callback".to_string(),
            user_agent: "Reddit Filters".to_string(),
            rate_limit_ms: 1000,
            api_base_url: "https://oauth.reddit.com/".to_string(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "reddit-filters-session".to_string(),
            max_age_days: 30,
            authentication_key: String::new(),
            encryption_key: String::new(),
        }
    }
}

// Secrets stay out of logs.
impl fmt::Debug for RedditConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedditConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("user_agent", &self.user_agent)
            .field("rate_limit_ms", &self.rate_limit_ms)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("cookie_name", &self.cookie_name)
            .field("max_age_days", &self.max_age_days)
            .field("authentication_key", &"<redacted>")
            .field("encryption_key", &"<redacted>")
            .finish()
    }
}

impl AppConfig {
    /// Loads the config file (if any) and applies environment overrides.
    ///
    /// An explicitly requested file must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::FileNotFound {
                        path: path.display().to_string(),
                    });
                }
                Self::from_file(path)?
            }
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env_with(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Overrides fields from variables returned by `lookup`. Empty values are ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.is_empty());

        if let Some(value) = get(ENV_CLIENT_ID) {
            self.reddit.client_id = value;
        }
        if let Some(value) = get(ENV_CLIENT_SECRET) {
            self.reddit.client_secret = value;
        }
        if let Some(value) = get(ENV_REDIRECT_URI) {
            self.reddit.redirect_uri = value;
        }
        if let Some(value) = get(ENV_USER_AGENT) {
            self.reddit.user_agent = value;
        }
        if let Some(value) = get(ENV_RATE_LIMIT_MS) {
            self.reddit.rate_limit_ms =
                value.parse().map_err(|_| ConfigError::InvalidValue {
                    field: ENV_RATE_LIMIT_MS.to_string(),
                    value,
                })?;
        }
        if let Some(value) = get(ENV_SESSION_AUTHENTICATION) {
            self.session.authentication_key = value;
        }
        if let Some(value) = get(ENV_SESSION_ENCRYPTION) {
            self.session.encryption_key = value;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            (ENV_CLIENT_ID, &self.reddit.client_id),
            (ENV_CLIENT_SECRET, &self.reddit.client_secret),
            (ENV_SESSION_AUTHENTICATION, &self.session.authentication_key),
            (ENV_SESSION_ENCRYPTION, &self.session.encryption_key),
        ];
        for (var_name, value) in required {
            if value.is_empty() {
                return Err(ConfigError::MissingEnvironmentVariable {
                    var_name: var_name.to_string(),
                });
            }
        }

        let secret_len = self.session.authentication_key.len() + self.session.encryption_key.len();
        if secret_len < MIN_SESSION_SECRET_LEN {
            return Err(ConfigError::InvalidValue {
                field: "session secrets".to_string(),
                value: format!(
                    "{} bytes combined, at least {} required",
                    secret_len, MIN_SESSION_SECRET_LEN
                ),
            });
        }

        if self.reddit.user_agent.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "reddit.user_agent".to_string(),
                value: self.reddit.user_agent.clone(),
            });
        }

        if !(1..=MAX_SESSION_MAX_AGE_DAYS).contains(&self.session.max_age_days) {
            return Err(ConfigError::InvalidValue {
                field: "session.max_age_days".to_string(),
                value: self.session.max_age_days.to_string(),
            });
        }

        Ok(())
    }
}
