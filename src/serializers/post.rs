use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{as_date, check_text, required, FieldErrors, POST_TEXT_MAX, TITLE_MAX};
use crate::db::models::Post;
use crate::error::AppResult;
use crate::media::media_url;

/// Writable post fields. `author` and `liked_by` are never taken from a body.
#[derive(Debug, Default, Deserialize)]
pub struct PostInput {
    pub title: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostOut {
    pub id: i64,
    pub title: String,
    pub text: String,
    pub author: i64,
    pub liked_by: Vec<i64>,
    pub image: Option<String>,
    #[serde(serialize_with = "as_date")]
    pub created_at: NaiveDateTime,
    #[serde(serialize_with = "as_date")]
    pub updated_at: NaiveDateTime,
}

impl PostInput {
    pub fn validate(self, partial: bool) -> AppResult<PostChanges> {
        let mut errors = FieldErrors::default();
        let title = check_text(&mut errors, "title", self.title, TITLE_MAX, !partial);
        let text = check_text(&mut errors, "text", self.text, POST_TEXT_MAX, !partial);
        errors.into_result()?;
        Ok(PostChanges { title, text })
    }

    /// Create needs both fields.
    pub fn validate_new(self) -> AppResult<NewPost> {
        let changes = self.validate(false)?;
        match (changes.title, changes.text) {
            (Some(title), Some(text)) => Ok(NewPost { title, text }),
            (None, _) => Err(required("title")),
            (_, None) => Err(required("text")),
        }
    }
}

impl From<&Post> for PostOut {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id,
            title: post.title.clone(),
            text: post.text.clone(),
            author: post.author_id,
            liked_by: post.liked_by.clone(),
            image: post.image.as_deref().map(media_url),
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn oversized_fields_are_listed() {
        let input = PostInput {
            title: Some("t".repeat(51)),
            text: Some("x".repeat(1001)),
        };
        match input.validate(false) {
            Err(AppError::Validation(errors)) => {
                assert_eq!(errors.fields().collect::<Vec<_>>(), ["text", "title"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn limits_are_inclusive() {
        let input = PostInput {
            title: Some("t".repeat(50)),
            text: Some("x".repeat(1000)),
        };
        let post = input.validate_new().unwrap();
        assert_eq!(post.title.len(), 50);
        assert_eq!(post.text.len(), 1000);
    }

    #[test]
    fn create_requires_text() {
        let input = PostInput {
            title: Some("hi".into()),
            text: None,
        };
        match input.validate_new() {
            Err(AppError::Validation(errors)) => assert!(errors.contains("text")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn partial_update_needs_no_fields() {
        let changes = PostInput::default().validate(true).unwrap();
        assert!(changes.title.is_none() && changes.text.is_none());
    }

    #[test]
    fn author_and_liked_by_in_body_are_ignored() {
        let input: PostInput = serde_json::from_str(
            r#"{"title": "hi", "text": "hello", "author": 42, "liked_by": [1, 2]}"#,
        )
        .unwrap();
        let changes = input.validate(false).unwrap();
        assert_eq!(changes.title.as_deref(), Some("hi"));
    }
}
