use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use filters_core::{AppConfig, CoreError};
use reddit_client::{RedditClient, RedditOAuth2Config};
use tracing::info;

use crate::session::{session_key, SessionStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// Unauthenticated template; handlers clone it and bind the session token.
    pub reddit: RedditClient,
    pub sessions: SessionStore,
    pub key: Key,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self, CoreError> {
        let reddit = RedditClient::new(RedditOAuth2Config::from(&config.reddit))?;
        Ok(Self::with_client(config, reddit))
    }

    /// Applies the configured rate limit to `reddit` and derives the cookie key.
    pub fn with_client(config: AppConfig, mut reddit: RedditClient) -> Self {
        let interval = Duration::from_millis(config.reddit.rate_limit_ms);
        if interval.is_zero() {
            info!("Upstream rate limiting disabled");
        } else {
            info!("Upstream rate limit: one request per {:?}", interval);
        }
        reddit.set_rate_limit(interval);

        let key = session_key(
            &config.session.authentication_key,
            &config.session.encryption_key,
        );
        let sessions = SessionStore::from(&config.session);

        Self {
            config: Arc::new(config),
            reddit,
            sessions,
            key,
        }
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.key.clone()
    }
}
