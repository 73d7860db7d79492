use std::collections::HashMap;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Row};

use crate::db::models::{Post, Timestamps};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::serializers::PostChanges;
use crate::state::DbPool;

use super::{ensure_owner, not_found};

const POST_COLUMNS: &str = "id, title, text, author_id, image, created_at, updated_at";

pub struct PostStore {
    pool: DbPool,
}

impl PostStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn list(&self) -> AppResult<Vec<Post>> {
        let conn = self.pool.get()?;

        let mut likes: HashMap<i64, Vec<i64>> = HashMap::new();
        {
            let mut stmt = conn.prepare(
                "SELECT post_id, account_id FROM post_liked_by ORDER BY post_id, account_id",
            )?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            for row in rows {
                let (post_id, account_id): (i64, i64) = row?;
                likes.entry(post_id).or_default().push(account_id);
            }
        }

        let mut stmt = conn.prepare(&format!("SELECT {POST_COLUMNS} FROM post ORDER BY id"))?;
        let posts = stmt
            .query_map([], post_from_row)?
            .map(|row| {
                row.map(|mut post| {
                    post.liked_by = likes.remove(&post.id).unwrap_or_default();
                    post
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    }

    pub fn get(&self, id: i64) -> AppResult<Post> {
        let conn = self.pool.get()?;
        load(&conn, id)
    }

    /// Author is always the requester.
    pub fn create(
        &self,
        author: &CurrentUser,
        title: &str,
        text: &str,
        timestamps: Timestamps,
    ) -> AppResult<Post> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO post (title, text, author_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                title,
                text,
                author.id,
                timestamps.created_at,
                timestamps.updated_at
            ],
        )?;
        load(&conn, conn.last_insert_rowid())
    }

    pub fn update(
        &self,
        id: i64,
        requester: &CurrentUser,
        changes: PostChanges,
        updated_at: NaiveDateTime,
    ) -> AppResult<Post> {
        let conn = self.pool.get()?;
        let current = load(&conn, id)?;
        ensure_owner(current.author_id, requester)?;

        let title = changes.title.unwrap_or(current.title);
        let text = changes.text.unwrap_or(current.text);
        conn.execute(
            "UPDATE post SET title = ?1, text = ?2, updated_at = ?3 WHERE id = ?4",
            params![title, text, updated_at, id],
        )?;
        load(&conn, id)
    }

    /// Points the post at a stored image. Returns the updated post and the
    /// path it replaced.
    pub fn set_image(
        &self,
        id: i64,
        requester: &CurrentUser,
        path: &str,
    ) -> AppResult<(Post, Option<String>)> {
        let conn = self.pool.get()?;
        let current = load(&conn, id)?;
        ensure_owner(current.author_id, requester)?;

        conn.execute("UPDATE post SET image = ?1 WHERE id = ?2", params![path, id])?;
        Ok((load(&conn, id)?, current.image))
    }

    /// Adds `account` to `liked_by`. Any account may like any post; liking
    /// twice changes nothing.
    pub fn like(&self, id: i64, account: &CurrentUser) -> AppResult<Post> {
        let conn = self.pool.get()?;
        ensure_exists(&conn, id)?;
        conn.execute(
            "INSERT OR IGNORE INTO post_liked_by (post_id, account_id) VALUES (?1, ?2)",
            params![id, account.id],
        )?;
        load(&conn, id)
    }

    /// Removes `account` from `liked_by`; a non-member is a no-op.
    pub fn unlike(&self, id: i64, account: &CurrentUser) -> AppResult<Post> {
        let conn = self.pool.get()?;
        ensure_exists(&conn, id)?;
        conn.execute(
            "DELETE FROM post_liked_by WHERE post_id = ?1 AND account_id = ?2",
            params![id, account.id],
        )?;
        load(&conn, id)
    }

    /// Author or staff only. Comments and likes go with the post, in one
    /// transaction. Returns the image path the post held.
    pub fn delete(&self, id: i64, requester: &CurrentUser) -> AppResult<Option<String>> {
        let mut conn = self.pool.get()?;
        let current = load(&conn, id)?;
        if current.author_id != requester.id && !requester.is_staff && !requester.is_superuser {
            return Err(AppError::Forbidden);
        }

        let tx = conn.transaction()?;
        tx.execute("DELETE FROM comment WHERE post_id = ?1", params![id])?;
        tx.execute("DELETE FROM post_liked_by WHERE post_id = ?1", params![id])?;
        tx.execute("DELETE FROM post WHERE id = ?1", params![id])?;
        tx.commit()?;

        tracing::info!("Deleted post {} (by account {})", id, requester.id);
        Ok(current.image)
    }
}

fn ensure_exists(conn: &Connection, id: i64) -> AppResult<()> {
    conn.query_row("SELECT id FROM post WHERE id = ?1", params![id], |r| {
        r.get::<_, i64>(0)
    })
    .map_err(not_found)?;
    Ok(())
}

fn load(conn: &Connection, id: i64) -> AppResult<Post> {
    let mut post = conn
        .query_row(
            &format!("SELECT {POST_COLUMNS} FROM post WHERE id = ?1"),
            params![id],
            post_from_row,
        )
        .map_err(not_found)?;

    let mut stmt = conn.prepare(
        "SELECT account_id FROM post_liked_by WHERE post_id = ?1 ORDER BY account_id",
    )?;
    post.liked_by = stmt
        .query_map(params![id], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(post)
}

fn post_from_row(row: &Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        text: row.get(2)?,
        author_id: row.get(3)?,
        image: row.get(4)?,
        liked_by: Vec::new(),
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}
