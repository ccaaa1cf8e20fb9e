pub mod api;
pub mod filter;
pub mod listing;
pub mod oauth;
pub mod rate_limiter;


pub use api::{RedditApiClient, RedditListing, RedditPostData};
pub use filter::{Facet, FacetSelector, ListingFilter, PLACEHOLDER_THUMBNAIL};
pub use listing::{ListingOptions, ListingPage, ListingPost, ListingSort, ListingTime};
pub use oauth::{AuthScope, AuthState, AuthorizationCallback, RedditOAuth2Config, RedditToken};

use filters_core::{CoreError, RedditApiError};
use oauth::{map_token_error, send_oauth_request};
use oauth2::basic::BasicClient;
use oauth2::{AuthorizationCode, CsrfToken, RefreshToken, Scope};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Reddit client for one process.
///
/// Share a single instance and clone it per request: clones share the HTTP
/// connection pool and the rate limiter, while the bound token stays local to
/// the clone.
#[derive(Debug, Clone)]
pub struct RedditClient {
    config: RedditOAuth2Config,
    oauth: BasicClient,
    oauth_compact: BasicClient,
    api: RedditApiClient,
    token: Option<RedditToken>,
}

impl RedditClient {
    pub fn new(config: RedditOAuth2Config) -> Result<Self, CoreError> {
        let oauth = config.oauth_client(false)?;
        let oauth_compact = config.oauth_client(true)?;
        let api = RedditApiClient::new(config.user_agent.clone(), &config.api_base_url)?;

        Ok(Self {
            config,
            oauth,
            oauth_compact,
            api,
            token: None,
        })
    }

    pub fn config(&self) -> &RedditOAuth2Config {
        &self.config
    }

    pub fn api(&self) -> &RedditApiClient {
        &self.api
    }

    pub fn get_required_scopes() -> Vec<AuthScope> {
        vec![AuthScope::Read, AuthScope::Save]
    }

    /// Returns the URL to send the browser to and the state to remember for
    /// the callback. A missing or empty `state` gets a random one.
    pub fn build_authorization_url(
        &self,
        scopes: &[AuthScope],
        compact: bool,
        state: Option<&str>,
    ) -> (String, String) {
        let state = match state {
            Some(state) if !state.is_empty() => state.to_string(),
            _ => generate_state(),
        };

        let client = if compact {
            &self.oauth_compact
        } else {
            &self.oauth
        };

        let (auth_url, csrf_token) = client
            .authorize_url(|| CsrfToken::new(state))
            .add_scopes(
                scopes
                    .iter()
                    .map(|scope| Scope::new(scope.as_str().to_string())),
            )
            .add_extra_param("duration", "permanent")
            .url();

        debug!("Built authorization URL (compact: {})", compact);
        (auth_url.to_string(), csrf_token.secret().clone())
    }

    /// Trades the callback's authorization code for a token. The state must
    /// already have been checked by the caller.
    pub async fn exchange_code(
        &self,
        callback: &AuthorizationCallback,
    ) -> Result<RedditToken, CoreError> {
        let code = callback.code()?;

        info!("Exchanging authorization code for token");
        let http_client = self.api.http_client().clone();
        let response = self
            .oauth
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(|request| send_oauth_request(http_client, request))
            .await
            .map_err(map_token_error)?;

        let token = RedditToken::from_response(&response);
        info!(
            "Received access token, refresh token present: {}",
            token.refresh_token.is_some()
        );
        Ok(token)
    }

    pub fn bind_token(&mut self, token: RedditToken) {
        self.token = Some(token);
    }

    pub fn token(&self) -> Option<&RedditToken> {
        self.token.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.as_ref().is_some_and(|token| !token.is_expired())
    }

    pub fn needs_refresh(&self) -> bool {
        self.token.as_ref().is_some_and(RedditToken::is_expired)
    }

    pub fn auth_state(&self) -> AuthState {
        match &self.token {
            None => AuthState::NotAuthenticated,
            Some(token) if token.is_expired() => AuthState::TokenExpired {
                can_refresh: token.refresh_token.is_some(),
            },
            Some(token) => AuthState::Authenticated {
                expires_at: token.expires_at,
            },
        }
    }

    /// Exchanges the bound token's refresh token for a new access token and
    /// binds the result.
    pub async fn refresh_token(&mut self) -> Result<RedditToken, CoreError> {
        let token = self.token.as_ref().ok_or(RedditApiError::NoToken)?;
        let refresh_token = token.refresh_token.clone().ok_or_else(|| {
            warn!("Token expired and no refresh token is available");
            RedditApiError::AuthenticationFailed {
                reason: "No refresh token available".to_string(),
            }
        })?;

        info!("Refreshing access token");
        let http_client = self.api.http_client().clone();
        let response = self
            .oauth
            .exchange_refresh_token(&RefreshToken::new(refresh_token.clone()))
            .request_async(|request| send_oauth_request(http_client, request))
            .await
            .map_err(map_token_error)?;

        let mut refreshed = RedditToken::from_response(&response);
        if refreshed.refresh_token.is_none() {
            refreshed.refresh_token = Some(refresh_token);
        }

        self.token = Some(refreshed.clone());
        Ok(refreshed)
    }

    /// One upstream request per `interval` across every clone; zero disables.
    pub fn set_rate_limit(&mut self, interval: Duration) {
        self.api.set_rate_limit(interval);
    }

    pub async fn fetch_listing(&self, options: &ListingOptions) -> Result<ListingPage, CoreError> {
        let access_token = self.access_token()?;
        options.validate()?;

        let listing = self.api.get_listing(access_token, options).await?;
        Ok(ListingPage::from(listing))
    }

    pub async fn save(&self, post_id: &str, category: &str) -> Result<(), CoreError> {
        let access_token = self.access_token()?;
        self.api.save(access_token, post_id, category).await
    }

    pub async fn unsave(&self, post_id: &str) -> Result<(), CoreError> {
        let access_token = self.access_token()?;
        self.api.unsave(access_token, post_id).await
    }

    fn access_token(&self) -> Result<&str, CoreError> {
        self.token
            .as_ref()
            .map(|token| token.access_token.as_str())
            .ok_or(CoreError::RedditApi(RedditApiError::NoToken))
    }
}

fn generate_state() -> String {
    fastrand::i32(0..).to_string()
}
