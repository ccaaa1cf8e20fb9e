use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{header, Response, StatusCode};
use axum::response::IntoResponse;
use axum::{Json, Router};
use axum_extra::extract::cookie::PrivateCookieJar;
use filters_core::AppConfig;
use reddit_client::{RedditClient, RedditOAuth2Config, RedditToken};
use serde_json::{json, Value};
use tower::ServiceExt;
use url::Url;
use web::{router, session_key, AppState, SessionData, SessionStore};

fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.server.assets_dir = PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/../assets"));
    config.reddit.client_id = "test_client_id".to_string();
    config.reddit.client_secret = "test_client_secret".to_string();
    config.reddit.user_agent = "reddit-filters-tests/1.0".to_string();
    config.reddit.rate_limit_ms = 0;
    config.session.authentication_key = "a".repeat(32);
    config.session.encryption_key = "e".repeat(32);
    config
}

fn offline_app() -> Router {
    router(AppState::new(test_config()).unwrap())
}

type RequestLog = Arc<Mutex<Vec<String>>>;

async fn upstream(State(log): State<RequestLog>, request: Request) -> axum::response::Response {
    let path = request.uri().path().to_string();
    log.lock().unwrap().push(path.clone());

    match path.as_str() {
        "/api/v1/access_token" => Json(json!({
            "access_token": "upstream-access",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "upstream-refresh",
            "scope": "read save"
        }))
        .into_response(),
        "/api/save" | "/api/unsave" => Json(json!({})).into_response(),
        "/r/broken/hot" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        _ => Json(json!({
            "kind": "Listing",
            "data": {
                "children": [
                    {"kind": "t3", "data": {"id": "p1", "title": "one", "subreddit": "pics", "url": "https://i.redd.it/1.jpg", "thumbnail": "https://b.thumbs.redditmedia.com/1.jpg", "permalink": "/r/pics/comments/p1/one/", "num_comments": 4}},
                    {"kind": "t3", "data": {"id": "p2", "title": "two", "subreddit": "pics", "url": "https://www.reddit.com/r/pics/comments/p2", "thumbnail": "self", "is_self": true}},
                    {"kind": "t3", "data": {"id": "p3", "title": "three", "subreddit": "pics", "url": "https://i.redd.it/3.png", "thumbnail": "nsfw", "over_18": true}},
                    {"kind": "t3", "data": {"id": "p4", "title": "four", "subreddit": "pics", "url": "https://v.redd.it/4", "is_video": true}},
                    {"kind": "t3", "data": {"id": "p5", "title": "five", "subreddit": "pics", "url": "https://i.imgur.com/5.gif", "thumbnail": "default", "saved": true}}
                ]
            }
        }))
        .into_response(),
    }
}

/// App wired to a local stand-in for Reddit.
async fn online_app() -> (Router, RequestLog) {
    let log = RequestLog::default();
    let upstream_app = Router::new().fallback(upstream).with_state(log.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}/", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, upstream_app).await.unwrap();
    });

    let mut config = test_config();
    config.reddit.api_base_url = base_url.clone();
    let client = RedditClient::new(
        RedditOAuth2Config::from(&config.reddit)
            .with_token_url(format!("{}api/v1/access_token", base_url)),
    )
    .unwrap();

    (router(AppState::with_client(config, client)), log)
}

async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> Response<Body> {
    get_with_agent(app, uri, cookie, "Mozilla/5.0 (X11; Linux x86_64)").await
}

async fn get_with_agent(
    app: &Router,
    uri: &str,
    cookie: Option<&str>,
    agent: &str,
) -> Response<Body> {
    let mut request = axum::http::Request::builder()
        .uri(uri)
        .header(header::USER_AGENT, agent);
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }

    app.clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// The `name=value` part of the session cookie set by a response.
fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with("reddit-filters-session="))
        .and_then(|value| value.split(';').next())
        .map(str::to_string)
}

fn location(response: &Response<Body>) -> String {
    response.headers()[header::LOCATION]
        .to_str()
        .unwrap()
        .to_string()
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

/// Session cookie holding a token that expired a minute ago.
fn expired_session_cookie() -> String {
    let config = test_config();
    let key = session_key(
        &config.session.authentication_key,
        &config.session.encryption_key,
    );
    let data = SessionData {
        token: Some(RedditToken {
            access_token: "stale-access".to_string(),
            token_type: "bearer".to_string(),
            refresh_token: Some("stale-refresh".to_string()),
            expires_at: SystemTime::now() - Duration::from_secs(60),
            scope: vec!["read".to_string(), "save".to_string()],
        }),
        state: None,
    };

    let jar = SessionStore::from(&config.session)
        .write(PrivateCookieJar::new(key), &data)
        .unwrap();
    session_cookie(&jar.into_response()).unwrap()
}

async fn login(app: &Router) -> (String, String) {
    let response = get(app, "/login", None).await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let cookie = session_cookie(&response).expect("login sets the session cookie");
    let auth_url = Url::parse(&location(&response)).unwrap();
    let state = auth_url
        .query_pairs()
        .find(|(key, _)| key == "state")
        .map(|(_, value)| value.into_owned())
        .unwrap();

    (cookie, state)
}

#[tokio::test]
async fn listing_without_session_is_json_error() {
    let app = offline_app();

    let response = get(&app, "/ajax/listing?reddit=pics", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["error"], "Not logged in. Please log in with Reddit.");
    assert!(body.get("items").is_none());
}

#[tokio::test]
async fn login_redirects_to_authorize() {
    let app = offline_app();

    let response = get(&app, "/login", None).await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let target = location(&response);
    assert!(target.starts_with("https://www.reddit.com/api/v1/authorize?"));
    assert!(target.contains("duration=permanent"));
    assert!(target.contains("scope=read+save"));

    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(set_cookie.starts_with("reddit-filters-session="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));
    assert!(set_cookie.contains("Path=/"));
}

#[tokio::test]
async fn mobile_login_uses_compact_page() {
    let app = offline_app();

    let response = get_with_agent(
        &app,
        "/login",
        None,
        "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Mobile/15E148",
    )
    .await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(location(&response).starts_with("https://www.reddit.com/api/v1/authorize.compact?"));
}

#[tokio::test]
async fn pages_render() {
    let app = offline_app();

    let response = get(&app, "/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("id=\"filters\""));
    assert!(html.contains("href=\"/login\""));

    let response = get(&app, "/r/pics?images=t&sort=top", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("data-reddit=\"pics\""));
    assert!(html.contains("<option value=\"top\" selected>"));
    assert!(html.contains("<option value=\"t\" selected>"));

    let response = get(&app, "/info", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn assets_are_served() {
    let app = offline_app();

    let response = get(&app, "/assets/listing.js", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get(&app, "/assets/logo.png", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get(&app, "/assets/missing.js", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn logout_redirects_home() {
    let app = offline_app();

    let response = get(&app, "/logout", None).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn save_without_session_is_bad_gateway() {
    let app = offline_app();

    let response = get(&app, "/ajax/save?id=t3_abc", None).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let response = get(&app, "/ajax/unsave?id=t3_abc", None).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn tampered_cookie_reads_as_logged_out() {
    let app = offline_app();

    let response = get(&app, "/ajax/listing", Some("reddit-filters-session=garbage")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await.get("error").is_some());
}

#[tokio::test]
async fn full_login_listing_and_save() {
    let (app, log) = online_app().await;

    let (cookie, state) = login(&app).await;

    let uri = format!("/login/callback?code=the-code&state={}", state);
    let response = get(&app, &uri, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");
    let cookie = session_cookie(&response).unwrap();

    let response = get(
        &app,
        "/ajax/listing?reddit=pics&sort=hot&images=t&nsfw=f",
        Some(&cookie),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    let ids: Vec<&str> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["t3_p1", "t3_p5"]);
    assert_eq!(body["last_id"], "t3_p5");
    assert_eq!(body["items"][0]["comments_link"], "https://www.reddit.com/r/pics/comments/p1/one/");
    assert_eq!(body["items"][0]["comments_count"], 4);
    assert_eq!(body["items"][1]["icon"], "/assets/logo.png");
    assert_eq!(body["items"][1]["saved"], true);

    let response = get(&app, "/ajax/save?id=t3_p1", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "OK");

    let paths = log.lock().unwrap().clone();
    assert_eq!(
        paths,
        vec!["/api/v1/access_token", "/r/pics/hot", "/api/save"]
    );

    // Logging out drops the token
    let response = get(&app, "/logout", Some(&cookie)).await;
    let cookie = session_cookie(&response).unwrap();
    let response = get(&app, "/ajax/listing", Some(&cookie)).await;
    assert!(body_json(response).await.get("error").is_some());
}

#[tokio::test]
async fn callback_with_wrong_state_stores_nothing() {
    let (app, log) = online_app().await;

    let (cookie, _state) = login(&app).await;

    let response = get(
        &app,
        "/login/callback?code=the-code&state=not-the-state",
        Some(&cookie),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");
    let cookie = session_cookie(&response).unwrap();

    let response = get(&app, "/ajax/listing", Some(&cookie)).await;
    assert!(body_json(response).await.get("error").is_some());

    // The code was never exchanged
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn callback_with_error_param_stores_nothing() {
    let (app, log) = online_app().await;

    let (cookie, state) = login(&app).await;

    let uri = format!("/login/callback?error=access_denied&state={}", state);
    let response = get(&app, &uri, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let cookie = session_cookie(&response).unwrap();
    let response = get(&app, "/ajax/listing", Some(&cookie)).await;
    assert!(body_json(response).await.get("error").is_some());
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn expired_token_is_refreshed_and_stored() {
    let (app, log) = online_app().await;
    let cookie = expired_session_cookie();

    let response = get(&app, "/ajax/listing?reddit=pics&sort=hot", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = session_cookie(&response).expect("refreshed token is written back");
    assert_eq!(body_json(response).await["items"].as_array().unwrap().len(), 5);

    // The stored token is fresh, so no second refresh
    let response = get(&app, "/ajax/save?id=t3_p1", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let paths = log.lock().unwrap().clone();
    assert_eq!(
        paths,
        vec!["/api/v1/access_token", "/r/pics/hot", "/api/save"]
    );
}

#[tokio::test]
async fn refreshed_token_survives_failed_listing() {
    let (app, log) = online_app().await;
    let cookie = expired_session_cookie();

    let response = get(&app, "/ajax/listing?reddit=broken&sort=hot", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = session_cookie(&response).expect("refreshed token is written back");
    assert!(body_json(response).await.get("error").is_some());

    let response = get(&app, "/ajax/listing?reddit=broken&sort=hot", Some(&cookie)).await;
    assert!(body_json(response).await.get("error").is_some());

    let paths = log.lock().unwrap().clone();
    assert_eq!(
        paths,
        vec!["/api/v1/access_token", "/r/broken/hot", "/r/broken/hot"]
    );
}
