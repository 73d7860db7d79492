pub mod accounts;
pub mod auth;
pub mod comments;
pub mod media;
pub mod posts;
pub mod profiles;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// The whole HTTP surface, shared by the binary and the integration tests.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(accounts::router())
        .merge(auth::router())
        .merge(profiles::router())
        .merge(posts::router())
        .merge(comments::router())
        .merge(media::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
