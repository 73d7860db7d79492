use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::error::AppResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/media/{*path}", get(serve))
}

pub async fn serve(State(state): State<AppState>, Path(path): Path<String>) -> AppResult<Response> {
    let bytes = state.images.load(&path).await?;
    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime.as_ref().to_string()),
            (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
        ],
        bytes,
    )
        .into_response())
}
