use crate::api::REDDIT_API_BASE;
use filters_core::{CoreError, RedditApiError, RedditConfig};
use oauth2::basic::{BasicClient, BasicErrorResponse, BasicTokenResponse, BasicTokenType};
use oauth2::{
    AuthUrl, ClientId, ClientSecret, HttpRequest, HttpResponse, RedirectUrl, RequestTokenError,
    TokenResponse, TokenUrl,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};
use tracing::error;
use url::Url;

pub const AUTH_URL: &str = "https://www.reddit.com/api/v1/authorize";
pub const AUTH_COMPACT_URL: &str = "https://www.reddit.com/api/v1/authorize.compact";
pub const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// Reddit omits `expires_in` only in odd cases; its tokens live one hour.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct RedditOAuth2Config {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub user_agent: String,
    pub api_base_url: String,
    pub auth_url: String,
    pub auth_compact_url: String,
    pub token_url: String,
}

impl RedditOAuth2Config {
    pub fn new(
        client_id: String,
        client_secret: String,
        redirect_uri: String,
        user_agent: String,
    ) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            user_agent,
            api_base_url: REDDIT_API_BASE.to_string(),
            auth_url: AUTH_URL.to_string(),
            auth_compact_url: AUTH_COMPACT_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_api_base_url<S: Into<String>>(mut self, api_base_url: S) -> Self {
        self.api_base_url = api_base_url.into();
        self
    }

    #[must_use]
    pub fn with_token_url<S: Into<String>>(mut self, token_url: S) -> Self {
        self.token_url = token_url.into();
        self
    }

    pub(crate) fn oauth_client(&self, compact: bool) -> Result<BasicClient, CoreError> {
        let auth_url = if compact {
            &self.auth_compact_url
        } else {
            &self.auth_url
        };

        let auth_url = AuthUrl::new(auth_url.clone()).map_err(|e| invalid_url("auth", e))?;
        let token_url =
            TokenUrl::new(self.token_url.clone()).map_err(|e| invalid_url("token", e))?;
        let redirect_url = RedirectUrl::new(self.redirect_uri.clone())
            .map_err(|e| invalid_url("redirect", e))?;

        Ok(BasicClient::new(
            ClientId::new(self.client_id.clone()),
            Some(ClientSecret::new(self.client_secret.clone())),
            auth_url,
            Some(token_url),
        )
        .set_redirect_uri(redirect_url))
    }
}

impl From<&RedditConfig> for RedditOAuth2Config {
    fn from(config: &RedditConfig) -> Self {
        Self::new(
            config.client_id.clone(),
            config.client_secret.clone(),
            config.redirect_uri.clone(),
            config.user_agent.clone(),
        )
        .with_api_base_url(config.api_base_url.clone())
    }
}

fn invalid_url(which: &str, e: url::ParseError) -> CoreError {
    CoreError::InvalidInput {
        message: format!("invalid {} URL: {}", which, e),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthScope {
    Account,
    Creddits,
    Edit,
    Flair,
    History,
    Identity,
    LiveManage,
    ModConfig,
    ModContributors,
    ModFlair,
    ModLog,
    ModMail,
    ModOthers,
    ModPosts,
    ModSelf,
    ModTraffic,
    ModWiki,
    MySubreddits,
    PrivateMessages,
    Read,
    Report,
    Save,
    StructuredStyles,
    Submit,
    Subscribe,
    Vote,
    WikiEdit,
    WikiRead,
}

impl AuthScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthScope::Account => "account",
            AuthScope::Creddits => "creddits",
            AuthScope::Edit => "edit",
            AuthScope::Flair => "flair",
            AuthScope::History => "history",
            AuthScope::Identity => "identity",
            AuthScope::LiveManage => "livemanage",
            AuthScope::ModConfig => "modconfig",
            AuthScope::ModContributors => "modcontributors",
            AuthScope::ModFlair => "modflair",
            AuthScope::ModLog => "modlog",
            AuthScope::ModMail => "modmail",
            AuthScope::ModOthers => "modothers",
            AuthScope::ModPosts => "modposts",
            AuthScope::ModSelf => "modself",
            AuthScope::ModTraffic => "modtraffic",
            AuthScope::ModWiki => "modwiki",
            AuthScope::MySubreddits => "mysubreddits",
            AuthScope::PrivateMessages => "privatemessages",
            AuthScope::Read => "read",
            AuthScope::Report => "report",
            AuthScope::Save => "save",
            AuthScope::StructuredStyles => "structuredstyles",
            AuthScope::Submit => "submit",
            AuthScope::Subscribe => "subscribe",
            AuthScope::Vote => "vote",
            AuthScope::WikiEdit => "wikiedit",
            AuthScope::WikiRead => "wikiread",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedditToken {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub refresh_token: Option<String>,
    pub expires_at: SystemTime,
    #[serde(default)]
    pub scope: Vec<String>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl RedditToken {
    pub fn from_response(response: &BasicTokenResponse) -> Self {
        let token_type = match response.token_type() {
            BasicTokenType::Bearer => "bearer".to_string(),
            BasicTokenType::Mac => "mac".to_string(),
            BasicTokenType::Extension(other) => other.clone(),
        };

        let lifetime = response.expires_in().unwrap_or(DEFAULT_TOKEN_LIFETIME);

        Self {
            access_token: response.access_token().secret().clone(),
            token_type,
            refresh_token: response
                .refresh_token()
                .map(|token| token.secret().clone()),
            expires_at: SystemTime::now() + lifetime,
            scope: response
                .scopes()
                .map(|scopes| scopes.iter().map(|s| s.to_string()).collect())
                .unwrap_or_default(),
        }
    }

    pub fn is_expired(&self) -> bool {
        SystemTime::now() >= self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    NotAuthenticated,
    Authenticated { expires_at: SystemTime },
    TokenExpired { can_refresh: bool },
}

/// Query parameters Reddit appends to the redirect URI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AuthorizationCallback {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

impl AuthorizationCallback {
    pub fn from_url(url: &str) -> Result<Self, CoreError> {
        let url = Url::parse(url).map_err(|e| CoreError::InvalidInput {
            message: format!("invalid callback URL: {}", e),
        })?;

        let mut callback = Self::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => callback.code = Some(value.into_owned()),
                "state" => callback.state = Some(value.into_owned()),
                "error" => callback.error = Some(value.into_owned()),
                _ => {}
            }
        }

        Ok(callback)
    }

    pub fn ensure_no_error(&self) -> Result<(), RedditApiError> {
        match self.error.as_deref() {
            Some(reason) if !reason.is_empty() => Err(RedditApiError::AuthenticationFailed {
                reason: reason.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// A missing state, or no pending state at all, is a mismatch.
    pub fn verify_state(&self, expected: &str) -> Result<(), RedditApiError> {
        match self.state.as_deref() {
            Some(state) if !expected.is_empty() && state == expected => Ok(()),
            _ => Err(RedditApiError::StateMismatch),
        }
    }

    pub fn code(&self) -> Result<&str, RedditApiError> {
        self.code
            .as_deref()
            .filter(|code| !code.is_empty())
            .ok_or(RedditApiError::NoCode)
    }
}

/// Runs an oauth2 token request through our own reqwest client so the
/// exchange carries the configured User-Agent and timeout.
pub async fn send_oauth_request(
    client: Client,
    request: HttpRequest,
) -> Result<HttpResponse, reqwest::Error> {
    let response = client
        .request(request.method, request.url.as_str())
        .headers(request.headers)
        .body(request.body)
        .send()
        .await?;

    let status_code = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?.to_vec();

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}

pub(crate) fn map_token_error(
    err: RequestTokenError<reqwest::Error, BasicErrorResponse>,
) -> CoreError {
    let api_error = match err {
        RequestTokenError::ServerResponse(response) => {
            error!("Token endpoint rejected the request: {}", response);
            RedditApiError::AuthenticationFailed {
                reason: response.error().to_string(),
            }
        }
        RequestTokenError::Request(e) => {
            error!("Token request failed: {}", e);
            if e.is_timeout() {
                RedditApiError::RequestTimeout
            } else {
                return CoreError::Network(e);
            }
        }
        RequestTokenError::Parse(e, _) => {
            error!("Could not parse token response: {}", e);
            RedditApiError::Decode {
                details: e.to_string(),
            }
        }
        RequestTokenError::Other(reason) => {
            error!("Token exchange failed: {}", reason);
            RedditApiError::TokenExchange { reason }
        }
    };

    CoreError::RedditApi(api_error)
}
