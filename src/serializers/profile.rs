use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{as_date, check_text, required, FieldErrors, USERNAME_MAX};
use crate::db::models::Profile;
use crate::error::AppResult;
use crate::media::media_url;

/// Writable profile fields. `owner` is system-assigned and has no slot here.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileInput {
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileOut {
    pub id: i64,
    pub username: String,
    pub owner: i64,
    pub avatar_image: Option<String>,
    #[serde(serialize_with = "as_date")]
    pub created_at: NaiveDateTime,
    #[serde(serialize_with = "as_date")]
    pub updated_at: NaiveDateTime,
}

impl ProfileInput {
    /// `partial` accepts a missing username (PATCH).
    pub fn validate(self, partial: bool) -> AppResult<ProfileChanges> {
        let mut errors = FieldErrors::default();
        let username = check_text(&mut errors, "username", self.username, USERNAME_MAX, !partial);
        errors.into_result()?;
        Ok(ProfileChanges { username })
    }

    /// Create needs the username.
    pub fn validate_new(self) -> AppResult<String> {
        match self.validate(false)?.username {
            Some(username) => Ok(username),
            None => Err(required("username")),
        }
    }
}

impl From<&Profile> for ProfileOut {
    fn from(profile: &Profile) -> Self {
        Self {
            id: profile.id,
            username: profile.username.clone(),
            owner: profile.owner_id,
            avatar_image: profile.avatar_image.as_deref().map(media_url),
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        }
    }
}
