use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::error::AppResult;
use crate::extractors::{CurrentUser, Payload};
use crate::media;
use crate::serializers::{AccountInput, AccountOut};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/me", get(me).delete(delete_me))
}

async fn register(
    State(state): State<AppState>,
    Payload { data, .. }: Payload<AccountInput>,
) -> AppResult<(StatusCode, Json<AccountOut>)> {
    let new = data.validate()?;
    let account = state.accounts().register(&new.email, &new.password)?;
    Ok((StatusCode::CREATED, Json(AccountOut::from(&account))))
}

async fn me(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<AccountOut>> {
    let account = state.accounts().get(user.id)?;
    Ok(Json(AccountOut::from(&account)))
}

/// Deletes the caller's account with its profile, posts, comments and likes.
async fn delete_me(State(state): State<AppState>, user: CurrentUser) -> AppResult<StatusCode> {
    let removed = state.accounts().delete(user.id, &user)?;
    for path in removed.0 {
        media::discard(state.images.as_ref(), &path).await;
    }
    Ok(StatusCode::NO_CONTENT)
}
