//! Per-browser session kept in one encrypted cookie.
//!
//! The cookie holds the OAuth token and the pending login state as JSON. A
//! cookie that fails to decrypt or parse reads as an empty session.

use axum_extra::extract::cookie::{Cookie, Key, PrivateCookieJar, SameSite};
use filters_core::{CoreError, SessionConfig, MAX_SESSION_MAX_AGE_DAYS};
use reddit_client::RedditToken;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub token: Option<RedditToken>,
    pub state: Option<String>,
}

/// Derives the 64-byte cookie key from the two configured secrets.
pub fn session_key(authentication_key: &str, encryption_key: &str) -> Key {
    let mut hasher = Sha512::new();
    hasher.update(authentication_key.as_bytes());
    hasher.update(encryption_key.as_bytes());
    let digest = hasher.finalize();
    Key::from(digest.as_slice())
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    cookie_name: String,
    max_age: time::Duration,
}

impl SessionStore {
    pub fn new(cookie_name: impl Into<String>, max_age: time::Duration) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            max_age,
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn read(&self, jar: &PrivateCookieJar) -> SessionData {
        let Some(cookie) = jar.get(&self.cookie_name) else {
            return SessionData::default();
        };

        serde_json::from_str(cookie.value()).unwrap_or_else(|e| {
            warn!("Discarding unreadable session cookie: {}", e);
            SessionData::default()
        })
    }

    pub fn write(
        &self,
        jar: PrivateCookieJar,
        data: &SessionData,
    ) -> Result<PrivateCookieJar, CoreError> {
        let value = serde_json::to_string(data)?;
        let cookie = Cookie::build((self.cookie_name.clone(), value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .max_age(self.max_age);

        Ok(jar.add(cookie))
    }
}

impl From<&SessionConfig> for SessionStore {
    fn from(config: &SessionConfig) -> Self {
        Self::new(
            config.cookie_name.clone(),
            time::Duration::days(config.max_age_days.clamp(1, MAX_SESSION_MAX_AGE_DAYS)),
        )
    }
}
