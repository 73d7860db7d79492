use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;

use crate::db::models::{Profile, Timestamps};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, Payload};
use crate::media::{self, Upload};
use crate::serializers::{ProfileInput, ProfileOut};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/myprofile", get(my_profile))
        .route("/profile", get(list_profiles).post(create_profile))
        .route(
            "/profile/{id}",
            get(get_profile)
                .put(replace_profile)
                .patch(patch_profile)
                .delete(delete_profile),
        )
}

/// The caller's profile as a list of at most one.
async fn my_profile(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<ProfileOut>>> {
    match state.profiles().get_for_owner(user.id) {
        Ok(profile) => Ok(Json(vec![ProfileOut::from(&profile)])),
        Err(AppError::NotFound) => Ok(Json(Vec::new())),
        Err(e) => Err(e),
    }
}

async fn list_profiles(State(state): State<AppState>) -> AppResult<Json<Vec<ProfileOut>>> {
    let profiles = state.profiles().list()?;
    Ok(Json(profiles.iter().map(ProfileOut::from).collect()))
}

async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<ProfileOut>> {
    let profile = state.profiles().get(id)?;
    Ok(Json(ProfileOut::from(&profile)))
}

async fn create_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Payload { data, upload }: Payload<ProfileInput>,
) -> AppResult<(StatusCode, Json<ProfileOut>)> {
    let username = data.validate_new()?;
    if let Some(upload) = &upload {
        media::check_path(&media::avatar_path(user.id, &username, &upload.filename))?;
    }

    let now = Utc::now().naive_utc();
    let profile = state
        .profiles()
        .create(&user, &username, Timestamps::at(now))?;
    let profile_id = profile.id;

    match attach_avatar(&state, &user, profile, upload).await {
        Ok(profile) => {
            tracing::info!("Account {} created profile {}", user.id, profile.id);
            Ok((StatusCode::CREATED, Json(ProfileOut::from(&profile))))
        }
        Err(e) => {
            if let Err(cleanup) = state.profiles().delete(profile_id, &user) {
                tracing::warn!("Could not roll back profile {}: {}", profile_id, cleanup);
            }
            Err(e)
        }
    }
}

async fn replace_profile(
    state: State<AppState>,
    user: CurrentUser,
    path: Path<i64>,
    payload: Payload<ProfileInput>,
) -> AppResult<Json<ProfileOut>> {
    update_profile(state, user, path, payload, false).await
}

async fn patch_profile(
    state: State<AppState>,
    user: CurrentUser,
    path: Path<i64>,
    payload: Payload<ProfileInput>,
) -> AppResult<Json<ProfileOut>> {
    update_profile(state, user, path, payload, true).await
}

async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Payload { data, upload }: Payload<ProfileInput>,
    partial: bool,
) -> AppResult<Json<ProfileOut>> {
    let changes = data.validate(partial)?;
    if let Some(upload) = &upload {
        let current = state.profiles().get(id)?;
        let username = changes.username.as_deref().unwrap_or(&current.username);
        media::check_path(&media::avatar_path(
            current.owner_id,
            username,
            &upload.filename,
        ))?;
    }

    let now = Utc::now().naive_utc();
    let profile = state.profiles().update(id, &user, changes, now)?;

    let profile = attach_avatar(&state, &user, profile, upload).await?;
    Ok(Json(ProfileOut::from(&profile)))
}

async fn delete_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    if let Some(avatar) = state.profiles().delete(id, &user)? {
        media::discard(state.images.as_ref(), &avatar).await;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Stores the upload at `avatars/{owner}{username}.{ext}` and points the
/// profile at it.
async fn attach_avatar(
    state: &AppState,
    user: &CurrentUser,
    profile: Profile,
    upload: Option<Upload>,
) -> AppResult<Profile> {
    let Some(upload) = upload else {
        return Ok(profile);
    };

    let path = media::avatar_path(profile.owner_id, &profile.username, &upload.filename);
    state.images.save(&path, &upload.bytes).await?;
    let (profile, old) = state.profiles().set_avatar(profile.id, user, &path)?;
    media::discard_replaced(state.images.as_ref(), old.as_deref(), &path).await;
    Ok(profile)
}
