use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Row};

use crate::db::conflict_on_unique;
use crate::db::models::{Profile, Timestamps};
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::serializers::ProfileChanges;
use crate::state::DbPool;

use super::{ensure_owner, not_found};

const PROFILE_COLUMNS: &str = "id, username, owner_id, avatar_image, created_at, updated_at";

pub struct ProfileStore {
    pool: DbPool,
}

impl ProfileStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn list(&self) -> AppResult<Vec<Profile>> {
        let conn = self.pool.get()?;
        let mut stmt =
            conn.prepare(&format!("SELECT {PROFILE_COLUMNS} FROM user_profile ORDER BY id"))?;
        let profiles = stmt
            .query_map([], profile_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(profiles)
    }

    pub fn get(&self, id: i64) -> AppResult<Profile> {
        let conn = self.pool.get()?;
        load(&conn, id)
    }

    /// The profile attached to an account.
    pub fn get_for_owner(&self, account_id: i64) -> AppResult<Profile> {
        let conn = self.pool.get()?;
        conn.query_row(
            &format!("SELECT {PROFILE_COLUMNS} FROM user_profile WHERE owner_id = ?1"),
            params![account_id],
            profile_from_row,
        )
        .map_err(not_found)
    }

    /// Owner is always the requester. A second profile for the same account
    /// is a conflict.
    pub fn create(
        &self,
        owner: &CurrentUser,
        username: &str,
        timestamps: Timestamps,
    ) -> AppResult<Profile> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO user_profile (username, owner_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                username,
                owner.id,
                timestamps.created_at,
                timestamps.updated_at
            ],
        )
        .map_err(|e| conflict_on_unique(e, "This account already has a profile."))?;

        load(&conn, conn.last_insert_rowid())
    }

    pub fn update(
        &self,
        id: i64,
        requester: &CurrentUser,
        changes: ProfileChanges,
        updated_at: NaiveDateTime,
    ) -> AppResult<Profile> {
        let conn = self.pool.get()?;
        let current = load(&conn, id)?;
        ensure_owner(current.owner_id, requester)?;

        let username = changes.username.unwrap_or(current.username);
        conn.execute(
            "UPDATE user_profile SET username = ?1, updated_at = ?2 WHERE id = ?3",
            params![username, updated_at, id],
        )?;
        load(&conn, id)
    }

    /// Points the profile at a stored avatar. Returns the updated profile and
    /// the path it replaced.
    pub fn set_avatar(
        &self,
        id: i64,
        requester: &CurrentUser,
        path: &str,
    ) -> AppResult<(Profile, Option<String>)> {
        let conn = self.pool.get()?;
        let current = load(&conn, id)?;
        ensure_owner(current.owner_id, requester)?;

        conn.execute(
            "UPDATE user_profile SET avatar_image = ?1 WHERE id = ?2",
            params![path, id],
        )?;
        Ok((load(&conn, id)?, current.avatar_image))
    }

    /// Returns the avatar path the deleted profile held.
    pub fn delete(&self, id: i64, requester: &CurrentUser) -> AppResult<Option<String>> {
        let conn = self.pool.get()?;
        let current = load(&conn, id)?;
        ensure_owner(current.owner_id, requester)?;

        conn.execute("DELETE FROM user_profile WHERE id = ?1", params![id])?;
        tracing::info!("Deleted profile {}", id);
        Ok(current.avatar_image)
    }
}

fn load(conn: &Connection, id: i64) -> AppResult<Profile> {
    conn.query_row(
        &format!("SELECT {PROFILE_COLUMNS} FROM user_profile WHERE id = ?1"),
        params![id],
        profile_from_row,
    )
    .map_err(not_found)
}

fn profile_from_row(row: &Row) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: row.get(0)?,
        username: row.get(1)?,
        owner_id: row.get(2)?,
        avatar_image: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}
