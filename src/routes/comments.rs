use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;

use crate::db::models::Timestamps;
use crate::error::AppResult;
use crate::extractors::{CurrentUser, Payload};
use crate::serializers::{CommentInput, CommentOut};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CommentFilter {
    pub post: Option<i64>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/comment", get(list_comments).post(create_comment))
        .route(
            "/comment/{id}",
            get(get_comment)
                .put(replace_comment)
                .patch(patch_comment)
                .delete(delete_comment),
        )
}

async fn list_comments(
    State(state): State<AppState>,
    Query(filter): Query<CommentFilter>,
) -> AppResult<Json<Vec<CommentOut>>> {
    let comments = state.comments().list(filter.post)?;
    Ok(Json(comments.iter().map(CommentOut::from).collect()))
}

async fn get_comment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<CommentOut>> {
    let comment = state.comments().get(id)?;
    Ok(Json(CommentOut::from(&comment)))
}

async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Payload { data, .. }: Payload<CommentInput>,
) -> AppResult<(StatusCode, Json<CommentOut>)> {
    let new = data.validate_new()?;
    let now = Utc::now().naive_utc();
    let comment = state
        .comments()
        .create(&user, new.post_id, &new.text, Timestamps::at(now))?;
    Ok((StatusCode::CREATED, Json(CommentOut::from(&comment))))
}

async fn replace_comment(
    state: State<AppState>,
    user: CurrentUser,
    path: Path<i64>,
    payload: Payload<CommentInput>,
) -> AppResult<Json<CommentOut>> {
    update_comment(state, user, path, payload, false).await
}

async fn patch_comment(
    state: State<AppState>,
    user: CurrentUser,
    path: Path<i64>,
    payload: Payload<CommentInput>,
) -> AppResult<Json<CommentOut>> {
    update_comment(state, user, path, payload, true).await
}

async fn update_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Payload { data, .. }: Payload<CommentInput>,
    partial: bool,
) -> AppResult<Json<CommentOut>> {
    let text = data.validate_update(partial)?;
    let now = Utc::now().naive_utc();
    let comment = state.comments().update(id, &user, text, now)?;
    Ok(Json(CommentOut::from(&comment)))
}

async fn delete_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.comments().delete(id, &user)?;
    Ok(StatusCode::NO_CONTENT)
}
