use axum::extract::{FromRequest, FromRequestParts, Multipart, Request};
use axum::http::{header, HeaderMap};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::auth::session;
use crate::error::AppError;
use crate::media::Upload;
use crate::state::AppState;

/// The authenticated requester, passed explicitly into every store operation
/// that authorises.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentUser {
    pub id: i64,
    pub email: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

/// Extractor that requires authentication.
/// Returns 401 if no valid session found.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_session_token(&parts.headers, &state.config.auth.cookie_name)
            .ok_or(AppError::Unauthorized)?;

        session::lookup_session(&state.db, token)?.ok_or(AppError::Unauthorized)
    }
}

/// `Authorization: Bearer <token>` wins over the session cookie.
pub fn extract_session_token<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if bearer.is_some() {
        return bearer;
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == cookie_name {
                Some(val)
            } else {
                None
            }
        })
}

/// Body of a create/update request: JSON, or multipart form where text parts
/// become fields and a file part named `img` becomes the upload.
pub struct Payload<T> {
    pub data: T,
    pub upload: Option<Upload>,
}

pub const UPLOAD_FIELD: &str = "img";

impl<T, S> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if !is_multipart {
            let Json(data) = Json::<T>::from_request(req, state)
                .await
                .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
            return Ok(Payload { data, upload: None });
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

        let mut fields = Map::new();
        let mut upload = None;
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);

            match file_name {
                Some(filename) if name == UPLOAD_FIELD => {
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::BadRequest(e.body_text()))?;
                    // Browsers send an empty part for an untouched file input
                    if !filename.is_empty() {
                        upload = Some(Upload {
                            filename,
                            bytes: bytes.to_vec(),
                        });
                    }
                }
                _ => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(e.body_text()))?;
                    fields.insert(name, Value::String(text));
                }
            }
        }

        let data = serde_json::from_value(Value::Object(fields))
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        Ok(Payload { data, upload })
    }
}
