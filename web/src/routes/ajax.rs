use axum::extract::{Query, State};
use axum::Json;
use axum_extra::extract::cookie::PrivateCookieJar;
use filters_core::{CoreError, RedditApiError};
use reddit_client::{
    ListingFilter, ListingOptions, ListingPage, ListingPost, ListingSort, ListingTime,
    RedditClient,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{WebError, WebResult};
use crate::state::AppState;

const COMMENTS_BASE: &str = "https://www.reddit.com";

#[derive(Debug, Serialize)]
pub struct ListingItem {
    pub id: String,
    pub title: String,
    pub icon: String,
    pub reddit: String,
    pub link: String,
    pub comments_link: String,
    pub comments_count: u64,
    pub saved: bool,
}

impl From<ListingPost> for ListingItem {
    fn from(post: ListingPost) -> Self {
        let id = post.fullname();
        let data = post.data;
        Self {
            id,
            title: data.title,
            icon: data.thumbnail.unwrap_or_default(),
            reddit: data.subreddit,
            link: data.url,
            comments_link: format!("{}{}", COMMENTS_BASE, data.permalink),
            comments_count: data.num_comments,
            saved: data.saved,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListingResponse {
    pub items: Vec<ListingItem>,
    pub last_id: String,
}

impl From<ListingPage> for ListingResponse {
    fn from(page: ListingPage) -> Self {
        Self {
            items: page.posts.into_iter().map(ListingItem::from).collect(),
            last_id: page.last_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PostParams {
    pub id: String,
}

/// Clones the shared client with this session's token bound, refreshing the
/// token first if it has expired.
///
/// The jar comes back on every path: a refreshed token is written to it even
/// when a later step fails.
async fn session_client(
    state: &AppState,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, Result<RedditClient, CoreError>) {
    let mut session = state.sessions.read(&jar);
    let Some(token) = session.token.clone() else {
        return (jar, Err(RedditApiError::NoToken.into()));
    };

    let mut client = state.reddit.clone();
    client.bind_token(token);

    if !client.needs_refresh() {
        return (jar, Ok(client));
    }

    let refreshed = match client.refresh_token().await {
        Ok(token) => token,
        Err(e) => return (jar, Err(e)),
    };
    session.token = Some(refreshed);
    match state.sessions.write(jar.clone(), &session) {
        Ok(jar) => (jar, Ok(client)),
        Err(e) => (jar, Err(e)),
    }
}

fn listing_options(query: &[(String, String)]) -> ListingOptions {
    let get = |key: &str| {
        query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .unwrap_or_default()
    };

    ListingOptions::new()
        .subreddit(get("reddit"))
        .after(get("last"))
        .sort(ListingSort::from(get("sort")))
        .time(ListingTime::from(get("time")))
}

async fn load_listing(
    state: &AppState,
    jar: PrivateCookieJar,
    query: &[(String, String)],
) -> (PrivateCookieJar, Result<ListingResponse, CoreError>) {
    let options = listing_options(query);
    let filter = ListingFilter::from_query(query.iter().map(|(k, v)| (k, v)));

    let (jar, client) = session_client(state, jar).await;
    let client = match client {
        Ok(client) => client,
        Err(e) => return (jar, Err(e)),
    };

    let result = client
        .fetch_listing(&options)
        .await
        .map(|page| ListingResponse::from(filter.apply(page)));
    (jar, result)
}

pub async fn listing(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Query(query): Query<Vec<(String, String)>>,
) -> (PrivateCookieJar, WebResult<Json<ListingResponse>>) {
    let (jar, result) = load_listing(&state, jar, &query).await;
    (jar, result.map(Json).map_err(WebError::Listing))
}

pub async fn save(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Query(params): Query<PostParams>,
) -> (PrivateCookieJar, WebResult<&'static str>) {
    let (jar, client) = session_client(&state, jar).await;
    let result = match client {
        Ok(client) => client.save(&params.id, "").await,
        Err(e) => Err(e),
    };

    let result = result.map(|()| {
        info!("Saved {}", params.id);
        "OK"
    });
    (jar, result.map_err(WebError::Upstream))
}

pub async fn unsave(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Query(params): Query<PostParams>,
) -> (PrivateCookieJar, WebResult<&'static str>) {
    let (jar, client) = session_client(&state, jar).await;
    let result = match client {
        Ok(client) => client.unsave(&params.id).await,
        Err(e) => Err(e),
    };

    let result = result.map(|()| {
        info!("Unsaved {}", params.id);
        "OK"
    });
    (jar, result.map_err(WebError::Upstream))
}
