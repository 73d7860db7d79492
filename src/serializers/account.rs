use serde::{Deserialize, Serialize};

use super::{check_text, FieldErrors, EMAIL_MAX};
use crate::db::models::Account;
use crate::error::{AppError, AppResult};

/// Registration body. `password` is write-only: it has no output counterpart.
#[derive(Debug, Default, Deserialize)]
pub struct AccountInput {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountOut {
    pub id: i64,
    pub email: String,
}

impl AccountInput {
    pub fn validate(self) -> AppResult<NewAccount> {
        let mut errors = FieldErrors::default();

        let email = check_text(&mut errors, "email", self.email, EMAIL_MAX, true);
        if let Some(ref email) = email {
            if !looks_like_email(email) {
                errors.add("email", "Enter a valid email address.");
            }
        }
        let password = match self.password {
            Some(p) if !p.is_empty() => Some(p),
            Some(_) => {
                errors.add("password", "This field may not be blank.");
                None
            }
            None => {
                errors.add("password", "This field is required.");
                None
            }
        };

        match (email, password) {
            (Some(email), Some(password)) if errors.is_empty() => {
                Ok(NewAccount { email, password })
            }
            _ => Err(AppError::Validation(errors)),
        }
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.rsplit_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

impl From<&Account> for AccountOut {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
        }
    }
}
