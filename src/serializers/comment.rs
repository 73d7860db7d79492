use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{as_date, check_text, form_id, FieldErrors, COMMENT_TEXT_MAX};
use crate::db::models::Comment;
use crate::error::{AppError, AppResult};

/// Comment body. `post` is honoured on create only.
#[derive(Debug, Default, Deserialize)]
pub struct CommentInput {
    pub text: Option<String>,
    #[serde(default, deserialize_with = "form_id")]
    pub post: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub text: String,
    pub post_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentOut {
    pub id: i64,
    pub text: String,
    pub author: i64,
    pub post: i64,
    #[serde(serialize_with = "as_date")]
    pub created_at: NaiveDateTime,
    #[serde(serialize_with = "as_date")]
    pub updated_at: NaiveDateTime,
}

impl CommentInput {
    pub fn validate_new(self) -> AppResult<NewComment> {
        let mut errors = FieldErrors::default();
        let text = check_text(&mut errors, "text", self.text, COMMENT_TEXT_MAX, true);
        if self.post.is_none() {
            errors.add("post", "This field is required.");
        }
        match (text, self.post) {
            (Some(text), Some(post_id)) if errors.is_empty() => Ok(NewComment { text, post_id }),
            _ => Err(AppError::Validation(errors)),
        }
    }

    /// Update keeps only `text`; a supplied `post` is dropped.
    pub fn validate_update(self, partial: bool) -> AppResult<Option<String>> {
        let mut errors = FieldErrors::default();
        let text = check_text(&mut errors, "text", self.text, COMMENT_TEXT_MAX, !partial);
        errors.into_result()?;
        Ok(text)
    }
}

impl From<&Comment> for CommentOut {
    fn from(comment: &Comment) -> Self {
        Self {
            id: comment.id,
            text: comment.text.clone(),
            author: comment.author_id,
            post: comment.post_id,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}
