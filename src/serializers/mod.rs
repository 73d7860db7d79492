//! Wire shapes. Each entity has an input shape (what a client may write) and an
//! output shape (what is ever returned); fields absent from the input shape are
//! read-only and silently ignored when supplied.

pub mod account;
pub mod comment;
pub mod post;
pub mod profile;

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use account::{AccountInput, AccountOut, NewAccount};
pub use comment::{CommentInput, CommentOut, NewComment};
pub use post::{NewPost, PostChanges, PostInput, PostOut};
pub use profile::{ProfileChanges, ProfileInput, ProfileOut};

pub const EMAIL_MAX: usize = 50;
pub const USERNAME_MAX: usize = 50;
pub const TITLE_MAX: usize = 50;
pub const POST_TEXT_MAX: usize = 1000;
pub const COMMENT_TEXT_MAX: usize = 100;

const REQUIRED: &str = "This field is required.";
const BLANK: &str = "This field may not be blank.";

/// Per-field validation messages, keyed by wire field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), crate::error::AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(crate::error::AppError::Validation(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join(" ")))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Checks a text field: present (when `required`), non-blank, and at most
/// `max` characters. Returns the value when it passed.
pub(crate) fn check_text(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<String>,
    max: usize,
    required: bool,
) -> Option<String> {
    let Some(value) = value else {
        if required {
            errors.add(field, REQUIRED);
        }
        return None;
    };
    if value.trim().is_empty() {
        errors.add(field, BLANK);
        return None;
    }
    if value.chars().count() > max {
        errors.add(
            field,
            format!("Ensure this field has no more than {} characters.", max),
        );
        return None;
    }
    Some(value)
}

pub(crate) fn required(field: &str) -> crate::error::AppError {
    let mut errors = FieldErrors::default();
    errors.add(field, REQUIRED);
    crate::error::AppError::Validation(errors)
}

/// Timestamps go out as calendar dates.
pub(crate) fn as_date<S: Serializer>(dt: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&dt.format("%Y-%m-%d").to_string())
}

/// An id given as a JSON number or as multipart form text.
pub(crate) fn form_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Option::<Raw>::deserialize(d)? {
        None => Ok(None),
        Some(Raw::Number(id)) => Ok(Some(id)),
        Some(Raw::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid id: {text:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_text_reports_missing_only_when_required() {
        let mut errors = FieldErrors::default();
        assert_eq!(check_text(&mut errors, "title", None, 5, false), None);
        assert!(errors.is_empty());

        check_text(&mut errors, "title", None, 5, true);
        assert!(errors.contains("title"));
    }

    #[test]
    fn check_text_counts_characters_not_bytes() {
        let mut errors = FieldErrors::default();
        let value = "é".repeat(5);
        assert_eq!(
            check_text(&mut errors, "title", Some(value.clone()), 5, true),
            Some(value)
        );
        assert!(errors.is_empty());

        check_text(&mut errors, "title", Some("é".repeat(6)), 5, true);
        assert!(errors.contains("title"));
    }

    #[test]
    fn check_text_rejects_blank() {
        let mut errors = FieldErrors::default();
        check_text(&mut errors, "text", Some("   ".into()), 10, true);
        assert!(errors.contains("text"));
    }

    #[test]
    fn field_errors_serialize_as_map() {
        let mut errors = FieldErrors::default();
        errors.add("title", "too long");
        errors.add("text", "blank");
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["title"][0], "too long");
        assert_eq!(json["text"][0], "blank");
        assert_eq!(errors.to_string(), "text: blank; title: too long");
    }
}
