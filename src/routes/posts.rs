use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;

use crate::db::models::{Post, Timestamps};
use crate::error::AppResult;
use crate::extractors::{CurrentUser, Payload};
use crate::media::{self, Upload};
use crate::serializers::{PostInput, PostOut};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/post", get(list_posts).post(create_post))
        .route(
            "/post/{id}",
            get(get_post)
                .put(replace_post)
                .patch(patch_post)
                .delete(delete_post),
        )
        .route("/post/{id}/like", post(like_post).delete(unlike_post))
}

async fn list_posts(State(state): State<AppState>) -> AppResult<Json<Vec<PostOut>>> {
    let posts = state.posts().list()?;
    Ok(Json(posts.iter().map(PostOut::from).collect()))
}

async fn get_post(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<PostOut>> {
    let post = state.posts().get(id)?;
    Ok(Json(PostOut::from(&post)))
}

async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Payload { data, upload }: Payload<PostInput>,
) -> AppResult<(StatusCode, Json<PostOut>)> {
    let new = data.validate_new()?;
    if let Some(upload) = &upload {
        // The id only prepends digits, so any id checks the same components
        media::check_path(&media::post_image_path(0, &new.title, &upload.filename))?;
    }

    let now = Utc::now().naive_utc();
    let post = state
        .posts()
        .create(&user, &new.title, &new.text, Timestamps::at(now))?;
    let post_id = post.id;

    match attach_image(&state, &user, post, upload).await {
        Ok(post) => {
            tracing::info!("Account {} created post {}", user.id, post.id);
            Ok((StatusCode::CREATED, Json(PostOut::from(&post))))
        }
        Err(e) => {
            // The request failed, so the post must not outlive it
            if let Err(cleanup) = state.posts().delete(post_id, &user) {
                tracing::warn!("Could not roll back post {}: {}", post_id, cleanup);
            }
            Err(e)
        }
    }
}

async fn replace_post(
    state: State<AppState>,
    user: CurrentUser,
    path: Path<i64>,
    payload: Payload<PostInput>,
) -> AppResult<Json<PostOut>> {
    update_post(state, user, path, payload, false).await
}

async fn patch_post(
    state: State<AppState>,
    user: CurrentUser,
    path: Path<i64>,
    payload: Payload<PostInput>,
) -> AppResult<Json<PostOut>> {
    update_post(state, user, path, payload, true).await
}

async fn update_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Payload { data, upload }: Payload<PostInput>,
    partial: bool,
) -> AppResult<Json<PostOut>> {
    let changes = data.validate(partial)?;
    if let Some(upload) = &upload {
        let current = state.posts().get(id)?;
        let title = changes.title.as_deref().unwrap_or(&current.title);
        media::check_path(&media::post_image_path(id, title, &upload.filename))?;
    }

    let now = Utc::now().naive_utc();
    let post = state.posts().update(id, &user, changes, now)?;

    let post = attach_image(&state, &user, post, upload).await?;
    Ok(Json(PostOut::from(&post)))
}

async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    if let Some(image) = state.posts().delete(id, &user)? {
        media::discard(state.images.as_ref(), &image).await;
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn like_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<PostOut>> {
    let post = state.posts().like(id, &user)?;
    Ok(Json(PostOut::from(&post)))
}

async fn unlike_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<PostOut>> {
    let post = state.posts().unlike(id, &user)?;
    Ok(Json(PostOut::from(&post)))
}

/// Stores the upload at `posts/{id}{title}.{ext}` and points the post at it.
async fn attach_image(
    state: &AppState,
    user: &CurrentUser,
    post: Post,
    upload: Option<Upload>,
) -> AppResult<Post> {
    let Some(upload) = upload else {
        return Ok(post);
    };

    let path = media::post_image_path(post.id, &post.title, &upload.filename);
    state.images.save(&path, &upload.bytes).await?;
    let (post, old) = state.posts().set_image(post.id, user, &path)?;
    media::discard_replaced(state.images.as_ref(), old.as_deref(), &path).await;
    Ok(post)
}
