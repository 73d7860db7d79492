use rand::Rng;
use rusqlite::{params, OptionalExtension};

use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::state::DbPool;

/// Create a new session for an account. Returns the session token.
/// Expired sessions are swept on the way.
pub fn create_session(pool: &DbPool, account_id: i64, hours: u64) -> AppResult<String> {
    let conn = pool.get()?;
    let token = generate_token();

    let swept = conn.execute(
        "DELETE FROM session WHERE expires_at <= datetime('now')",
        [],
    )?;
    if swept > 0 {
        tracing::debug!("Removed {} expired sessions", swept);
    }

    conn.execute(
        "INSERT INTO session (token, account_id, expires_at) VALUES (?1, ?2, datetime('now', ?3))",
        params![token, account_id, format!("+{} hours", hours)],
    )?;

    Ok(token)
}

/// Delete a session by token.
pub fn delete_session(pool: &DbPool, token: &str) -> AppResult<()> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM session WHERE token = ?1", params![token])?;
    Ok(())
}

/// Resolves a live token to its account. Expired sessions and inactive
/// accounts resolve to `None`.
pub fn lookup_session(pool: &DbPool, token: &str) -> AppResult<Option<CurrentUser>> {
    let conn = pool.get()?;
    let user = conn
        .query_row(
            "SELECT u.id, u.email, u.is_staff, u.is_superuser FROM session s \
             JOIN user u ON u.id = s.account_id \
             WHERE s.token = ?1 AND s.expires_at > datetime('now') AND u.is_active = 1",
            params![token],
            |row| {
                Ok(CurrentUser {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    is_staff: row.get(2)?,
                    is_superuser: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(user)
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}
