use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Row};

use crate::db::models::{Comment, Timestamps};
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::state::DbPool;

use super::{ensure_owner, not_found};

const COMMENT_COLUMNS: &str = "id, text, author_id, post_id, created_at, updated_at";

pub struct CommentStore {
    pool: DbPool,
}

impl CommentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// All comments, or those under one post.
    pub fn list(&self, post_id: Option<i64>) -> AppResult<Vec<Comment>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comment
             WHERE ?1 IS NULL OR post_id = ?1
             ORDER BY id"
        ))?;
        let comments = stmt
            .query_map(params![post_id], comment_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }

    pub fn get(&self, id: i64) -> AppResult<Comment> {
        let conn = self.pool.get()?;
        load(&conn, id)
    }

    /// Author is always the requester; the post must exist.
    pub fn create(
        &self,
        author: &CurrentUser,
        post_id: i64,
        text: &str,
        timestamps: Timestamps,
    ) -> AppResult<Comment> {
        let conn = self.pool.get()?;
        conn.query_row("SELECT id FROM post WHERE id = ?1", params![post_id], |r| {
            r.get::<_, i64>(0)
        })
        .map_err(not_found)?;

        conn.execute(
            "INSERT INTO comment (text, author_id, post_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                text,
                author.id,
                post_id,
                timestamps.created_at,
                timestamps.updated_at
            ],
        )?;
        load(&conn, conn.last_insert_rowid())
    }

    /// Only `text` is writable; author and post stay as created.
    pub fn update(
        &self,
        id: i64,
        requester: &CurrentUser,
        text: Option<String>,
        updated_at: NaiveDateTime,
    ) -> AppResult<Comment> {
        let conn = self.pool.get()?;
        let current = load(&conn, id)?;
        ensure_owner(current.author_id, requester)?;

        let text = text.unwrap_or(current.text);
        conn.execute(
            "UPDATE comment SET text = ?1, updated_at = ?2 WHERE id = ?3",
            params![text, updated_at, id],
        )?;
        load(&conn, id)
    }

    pub fn delete(&self, id: i64, requester: &CurrentUser) -> AppResult<()> {
        let conn = self.pool.get()?;
        let current = load(&conn, id)?;
        ensure_owner(current.author_id, requester)?;

        conn.execute("DELETE FROM comment WHERE id = ?1", params![id])?;
        Ok(())
    }
}

fn load(conn: &Connection, id: i64) -> AppResult<Comment> {
    conn.query_row(
        &format!("SELECT {COMMENT_COLUMNS} FROM comment WHERE id = ?1"),
        params![id],
        comment_from_row,
    )
    .map_err(not_found)
}

fn comment_from_row(row: &Row) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        text: row.get(1)?,
        author_id: row.get(2)?,
        post_id: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}
