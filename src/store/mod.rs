//! Persistence for the four entities. Every operation round-trips through the
//! pool; nothing here caches rows. Operations that authorise take the
//! requester explicitly.

pub mod accounts;
pub mod comments;
pub mod posts;
pub mod profiles;

pub use accounts::AccountStore;
pub use comments::CommentStore;
pub use posts::PostStore;
pub use profiles::ProfileStore;

use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;

/// Only the owner may write.
fn ensure_owner(owner_id: i64, requester: &CurrentUser) -> AppResult<()> {
    if owner_id == requester.id {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// `QueryReturnedNoRows` becomes `NotFound`.
fn not_found(err: rusqlite::Error) -> AppError {
    match err {
        rusqlite::Error::QueryReturnedNoRows => AppError::NotFound,
        other => AppError::Database(other),
    }
}
