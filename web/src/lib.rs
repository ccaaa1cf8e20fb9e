pub mod error;
pub mod routes;
pub mod session;
pub mod state;

use axum::routing::get;
use axum::Router;
use tower_http::services::ServeDir;

pub use error::{WebError, WebResult};
pub use session::{session_key, SessionData, SessionStore};
pub use state::AppState;

pub fn router(state: AppState) -> Router {
    let assets = ServeDir::new(&state.config.server.assets_dir);

    Router::new()
        .route("/", get(routes::pages::home))
        .route("/r/{reddit}", get(routes::pages::subreddit))
        .route("/info", get(routes::pages::info))
        .route("/login", get(routes::auth::login))
        .route("/login/callback", get(routes::auth::callback))
        .route("/logout", get(routes::auth::logout))
        .route("/ajax/listing", get(routes::ajax::listing))
        .route("/ajax/save", get(routes::ajax::save))
        .route("/ajax/unsave", get(routes::ajax::unsave))
        .nest_service("/assets", assets)
        .with_state(state)
}
