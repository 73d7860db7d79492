use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::auth::session;
use crate::error::{AppError, AppResult};
use crate::extractors::{extract_session_token, Payload};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

fn session_cookie(name: &str, token: &str, max_age_hours: u64) -> String {
    let max_age_secs = max_age_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        name, token, max_age_secs
    )
}

fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0", name)
}

/// Exchanges credentials for a session token, returned in the body and as a cookie.
pub async fn login(
    State(state): State<AppState>,
    Payload { data, .. }: Payload<LoginRequest>,
) -> AppResult<Response> {
    let account = state
        .accounts()
        .verify_credentials(&data.email, &data.password)?
        .ok_or(AppError::Unauthorized)?;

    let hours = state.config.auth.session_hours;
    let token = session::create_session(&state.db, account.id, hours)?;
    tracing::info!("Account {} logged in", account.id);

    let cookie = session_cookie(&state.config.auth.cookie_name, &token, hours);
    Ok((
        StatusCode::OK,
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(json!({ "token": token })),
    )
        .into_response())
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let cookie_name = &state.config.auth.cookie_name;
    let token = extract_session_token(&headers, cookie_name).ok_or(AppError::Unauthorized)?;
    session::delete_session(&state.db, token)?;

    Ok((
        StatusCode::NO_CONTENT,
        AppendHeaders([(header::SET_COOKIE, clear_session_cookie(cookie_name))]),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_is_http_only_with_max_age() {
        let cookie = session_cookie("postbook_session", "abc", 2);
        assert_eq!(
            cookie,
            "postbook_session=abc; HttpOnly; SameSite=Strict; Path=/; Max-Age=7200"
        );
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        assert!(clear_session_cookie("postbook_session").ends_with("Max-Age=0"));
    }
}
