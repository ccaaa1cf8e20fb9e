use crate::listing::{ListingOptions, ListingSort};
use crate::rate_limiter::{RateLimitConfig, RateLimiter};
use filters_core::{CoreError, RedditApiError};
use reqwest::{Client, Method, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

pub const REDDIT_API_BASE: &str = "https://oauth.reddit.com/";

/// Upstream requests are short-lived; there is no retry.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

const IMAGE_EXTENSIONS: [&str; 4] = [".jpg", ".jpeg", ".png", ".gif"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    #[serde(default)]
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    #[serde(default = "Vec::new")]
    pub children: Vec<RedditListingChild<T>>,
    pub after: Option<String>,
    pub before: Option<String>,
    pub modhash: Option<String>,
    pub dist: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

impl<T> RedditListingChild<T> {
    pub fn new(kind: impl Into<String>, data: T) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }
}

impl RedditListingChild<RedditPostData> {
    /// Kind-prefixed id, e.g. `t3_abc123`.
    pub fn fullname(&self) -> String {
        format!("{}_{}", self.kind, self.data.id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditPostData {
    pub id: String,
    pub title: String,
    pub author: String,
    pub subreddit: String,
    pub url: String,
    pub permalink: String,
    pub thumbnail: Option<String>,
    pub domain: String,
    pub score: i64,
    pub num_comments: u64,
    pub created_utc: f64,
    pub is_self: bool,
    pub is_video: bool,
    pub is_original_content: bool,
    pub spoiler: bool,
    pub saved: bool,
    pub clicked: bool,
    pub hidden: bool,
    pub visited: bool,
    pub over_18: bool,
}

impl RedditPostData {
    /// Derived from the link, Reddit does not report it.
    pub fn is_image(&self) -> bool {
        IMAGE_EXTENSIONS.iter().any(|ext| self.url.ends_with(ext))
    }
}

#[derive(Debug, Clone)]
pub struct RedditApiClient {
    http_client: Client,
    rate_limiter: Option<Arc<RateLimiter>>,
    base_url: Url,
    user_agent: String,
}

impl RedditApiClient {
    pub fn new(user_agent: String, base_url: &str) -> Result<Self, CoreError> {
        let base_url = Url::parse(base_url).map_err(|e| CoreError::InvalidInput {
            message: format!("invalid API base URL {}: {}", base_url, e),
        })?;

        let http_client = Client::builder()
            .user_agent(&user_agent)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http_client,
            rate_limiter: None,
            base_url,
            user_agent,
        })
    }

    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Clones made afterwards share the same limiter.
    pub fn set_rate_limit(&mut self, interval: Duration) {
        self.rate_limiter = if interval.is_zero() {
            None
        } else {
            Some(Arc::new(RateLimiter::new(RateLimitConfig::fixed_interval(
                interval,
            ))))
        };
    }

    pub fn rate_limiter(&self) -> Option<&Arc<RateLimiter>> {
        self.rate_limiter.as_ref()
    }

    pub async fn make_request(
        &self,
        method: Method,
        url: Url,
        access_token: &str,
        form: Option<&[(&str, &str)]>,
    ) -> Result<Response, CoreError> {
        let endpoint = url.path().to_string();

        let _permit = match &self.rate_limiter {
            Some(limiter) => {
                let permit = limiter.acquire_permit().await?;
                debug!(
                    "Acquired rate limit permit for {} {} after {:?}",
                    method, endpoint, permit.queue_wait_time
                );
                Some(permit)
            }
            None => None,
        };

        let mut request_builder = self
            .http_client
            .request(method.clone(), url)
            .bearer_auth(access_token);

        if let Some(form) = form {
            request_builder = request_builder.form(form);
        }

        info!("Making Reddit API request: {} {}", method, endpoint);
        let response = match request_builder.send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Network error for {} {}: {}", method, endpoint, e);
                if e.is_timeout() {
                    return Err(CoreError::RedditApi(RedditApiError::RequestTimeout));
                }
                return Err(CoreError::Network(e));
            }
        };

        let status = response.status();
        if status.is_success() {
            debug!("Request successful: {} {}", status, endpoint);
            return Ok(response);
        }

        error!("Request failed with status: {} for {}", status, endpoint);
        let api_error = match status.as_u16() {
            401 => RedditApiError::InvalidToken,
            403 => RedditApiError::Forbidden { resource: endpoint },
            429 => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.parse::<u64>().ok())
                    .unwrap_or(60);
                warn!("Rate limited, retry after {} seconds", retry_after);
                RedditApiError::RateLimitExceeded { retry_after }
            }
            code if status.is_server_error() => RedditApiError::ServerError { status_code: code },
            code => RedditApiError::RequestFailed { status_code: code },
        };

        Err(CoreError::RedditApi(api_error))
    }

    /// `{base}/r/{subreddit}/{sort}?{query}`, leaving out empty segments.
    pub fn listing_url(&self, options: &ListingOptions) -> Result<Url, CoreError> {
        options.validate()?;

        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| CoreError::Internal {
                message: format!("API base URL cannot have a path: {}", self.base_url),
            })?;
            segments.pop_if_empty();
            if !options.subreddit.is_empty() {
                segments.push("r").push(&options.subreddit);
            }
            if options.sort != ListingSort::Default {
                segments.push(options.sort.as_str());
            }
        }

        let params = options.query_pairs();
        if !params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(key, value)| (*key, value.as_str())));
        }

        Ok(url)
    }

    pub async fn get_listing(
        &self,
        access_token: &str,
        options: &ListingOptions,
    ) -> Result<RedditListing<RedditPostData>, CoreError> {
        let url = self.listing_url(options)?;

        let response = self
            .make_request(Method::GET, url, access_token, None)
            .await?;

        let listing: RedditListing<RedditPostData> = response.json().await.map_err(|e| {
            error!("Failed to parse listing: {}", e);
            if e.is_decode() {
                CoreError::RedditApi(RedditApiError::Decode {
                    details: e.to_string(),
                })
            } else {
                CoreError::Network(e)
            }
        })?;

        info!(
            "Retrieved {} posts from {}",
            listing.data.children.len(),
            if options.subreddit.is_empty() {
                "the front page".to_string()
            } else {
                format!("r/{}", options.subreddit)
            }
        );
        Ok(listing)
    }

    pub async fn save(
        &self,
        access_token: &str,
        post_id: &str,
        category: &str,
    ) -> Result<(), CoreError> {
        let mut form = vec![("id", post_id)];
        if !category.is_empty() {
            form.push(("category", category));
        }

        let url = self.endpoint_url(&["api", "save"])?;
        self.make_request(Method::POST, url, access_token, Some(&form[..]))
            .await?;
        debug!("Saved {}", post_id);
        Ok(())
    }

    pub async fn unsave(&self, access_token: &str, post_id: &str) -> Result<(), CoreError> {
        let form = [("id", post_id)];

        let url = self.endpoint_url(&["api", "unsave"])?;
        self.make_request(Method::POST, url, access_token, Some(&form[..]))
            .await?;
        debug!("Unsaved {}", post_id);
        Ok(())
    }

    /// Appends `segments` to the base URL path, so a base with a path prefix keeps it.
    fn endpoint_url(&self, segments: &[&str]) -> Result<Url, CoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CoreError::Internal {
                message: format!("API base URL cannot have a path: {}", self.base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}
