use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::PrivateCookieJar;
use filters_core::{CoreError, ErrorExt};
use reddit_client::{AuthorizationCallback, RedditClient, RedditToken};
use tracing::{debug, info, warn};

use crate::error::WebResult;
use crate::state::AppState;

const MOBILE_MARKERS: [&str; 3] = ["Mobi", "Android", "iPhone"];

/// 302 Found; axum's `Redirect` only offers 303/307/308.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

fn is_mobile(headers: &HeaderMap) -> bool {
    headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|agent| MOBILE_MARKERS.iter().any(|marker| agent.contains(marker)))
}

pub async fn login(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    headers: HeaderMap,
) -> WebResult<(PrivateCookieJar, Response)> {
    let compact = is_mobile(&headers);
    let (auth_url, auth_state) =
        state
            .reddit
            .build_authorization_url(&RedditClient::get_required_scopes(), compact, None);

    let mut session = state.sessions.read(&jar);
    session.state = Some(auth_state);
    let jar = state.sessions.write(jar, &session)?;

    debug!("Redirecting to Reddit for authorization");
    Ok((jar, found(&auth_url)))
}

async fn complete_login(
    reddit: &RedditClient,
    callback: &AuthorizationCallback,
    expected_state: &str,
) -> Result<RedditToken, CoreError> {
    callback.ensure_no_error()?;
    callback.verify_state(expected_state)?;
    reddit.exchange_code(callback).await
}

/// Always ends on the home page; a failed login just leaves the user logged out.
pub async fn callback(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Query(callback): Query<AuthorizationCallback>,
) -> WebResult<(PrivateCookieJar, Response)> {
    let mut session = state.sessions.read(&jar);
    let expected_state = session.state.take().unwrap_or_default();

    match complete_login(&state.reddit, &callback, &expected_state).await {
        Ok(token) => {
            info!("Login complete");
            session.token = Some(token);
        }
        Err(e) => {
            warn!("Login callback rejected");
            e.log_error();
        }
    }

    let jar = state.sessions.write(jar, &session)?;
    Ok((jar, found("/")))
}

pub async fn logout(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> WebResult<(PrivateCookieJar, Response)> {
    let mut session = state.sessions.read(&jar);
    session.token = None;
    let jar = state.sessions.write(jar, &session)?;

    info!("Logged out");
    Ok((jar, found("/")))
}
