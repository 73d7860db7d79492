use rusqlite::{params, OptionalExtension, Row};

use crate::auth::password::{hash_password, verify_password};
use crate::db::conflict_on_unique;
use crate::db::models::Account;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::serializers::FieldErrors;
use crate::state::DbPool;

use super::not_found;

const ACCOUNT_COLUMNS: &str = "id, email, is_active, is_staff, is_superuser";

/// Identity store: account creation, lookup, credential checks and the
/// account-delete cascade.
pub struct AccountStore {
    pool: DbPool,
    bcrypt_cost: u32,
}

/// Image paths orphaned by an account delete.
#[derive(Debug, Default, PartialEq)]
pub struct RemovedImages(pub Vec<String>);

impl AccountStore {
    pub fn new(pool: DbPool, bcrypt_cost: u32) -> Self {
        Self { pool, bcrypt_cost }
    }

    pub fn register(&self, email: &str, password: &str) -> AppResult<Account> {
        self.insert(email, password, false)
    }

    /// Same validation as `register`; the account also gets the staff and
    /// superuser capabilities.
    pub fn register_admin(&self, email: &str, password: &str) -> AppResult<Account> {
        self.insert(email, password, true)
    }

    fn insert(&self, email: &str, password: &str, admin: bool) -> AppResult<Account> {
        if email.trim().is_empty() {
            let mut errors = FieldErrors::default();
            errors.add("email", "An email address is required.");
            return Err(AppError::Validation(errors));
        }
        let email = normalize_email(email);
        let hash = hash_password(password, self.bcrypt_cost)?;

        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO user (email, password_hash, is_active, is_staff, is_superuser)
             VALUES (?1, ?2, 1, ?3, ?3)",
            params![email, hash, admin],
        )
        .map_err(|e| conflict_on_unique(e, "An account with this email already exists."))?;

        let id = conn.last_insert_rowid();
        tracing::info!("Registered account {} (admin: {})", id, admin);

        Ok(Account {
            id,
            email,
            is_active: true,
            is_staff: admin,
            is_superuser: admin,
        })
    }

    pub fn get(&self, id: i64) -> AppResult<Account> {
        let conn = self.pool.get()?;
        conn.query_row(
            &format!("SELECT {ACCOUNT_COLUMNS} FROM user WHERE id = ?1"),
            params![id],
            account_from_row,
        )
        .map_err(not_found)
    }

    pub fn find_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        let conn = self.pool.get()?;
        let account = conn
            .query_row(
                &format!("SELECT {ACCOUNT_COLUMNS} FROM user WHERE email = ?1"),
                params![normalize_email(email)],
                account_from_row,
            )
            .optional()?;
        Ok(account)
    }

    /// The active account matching these credentials, if any.
    pub fn verify_credentials(&self, email: &str, password: &str) -> AppResult<Option<Account>> {
        let conn = self.pool.get()?;
        let found = conn
            .query_row(
                &format!(
                    "SELECT {ACCOUNT_COLUMNS}, password_hash FROM user \
                     WHERE email = ?1 AND is_active = 1"
                ),
                params![normalize_email(email)],
                |row| Ok((account_from_row(row)?, row.get::<_, String>(5)?)),
            )
            .optional()?;

        Ok(found.and_then(|(account, hash)| {
            verify_password(password, &hash).then_some(account)
        }))
    }

    /// Deletes an account and everything hanging off it in one transaction:
    /// its likes, comments it wrote or that sit under its posts, its posts,
    /// its profile and its sessions.
    pub fn delete(&self, account_id: i64, requester: &CurrentUser) -> AppResult<RemovedImages> {
        if account_id != requester.id && !requester.is_superuser {
            return Err(AppError::Forbidden);
        }

        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        let mut images: Vec<String> = {
            let mut stmt = tx.prepare(
                "SELECT image FROM post WHERE author_id = ?1 AND image IS NOT NULL
                 UNION ALL
                 SELECT avatar_image FROM user_profile WHERE owner_id = ?1 AND avatar_image IS NOT NULL",
            )?;
            let rows = stmt.query_map(params![account_id], |row| row.get(0))?;
            rows.collect::<Result<_, _>>()?
        };
        images.sort();

        tx.execute(
            "DELETE FROM post_liked_by
             WHERE account_id = ?1
                OR post_id IN (SELECT id FROM post WHERE author_id = ?1)",
            params![account_id],
        )?;
        tx.execute(
            "DELETE FROM comment
             WHERE author_id = ?1
                OR post_id IN (SELECT id FROM post WHERE author_id = ?1)",
            params![account_id],
        )?;
        tx.execute("DELETE FROM post WHERE author_id = ?1", params![account_id])?;
        tx.execute(
            "DELETE FROM user_profile WHERE owner_id = ?1",
            params![account_id],
        )?;
        tx.execute("DELETE FROM session WHERE account_id = ?1", params![account_id])?;
        let deleted = tx.execute("DELETE FROM user WHERE id = ?1", params![account_id])?;
        if deleted == 0 {
            return Err(AppError::NotFound);
        }

        tx.commit()?;
        tracing::info!("Deleted account {} and its content", account_id);
        Ok(RemovedImages(images))
    }
}

/// Lowercases the domain part; the local part is kept as typed.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}

fn account_from_row(row: &Row) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        email: row.get(1)?,
        is_active: row.get(2)?,
        is_staff: row.get(3)?,
        is_superuser: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::store::testing::{register, requester, ts};
    use crate::store::{CommentStore, PostStore, ProfileStore};

    fn store(pool: &DbPool) -> AccountStore {
        AccountStore::new(pool.clone(), 4)
    }

    #[test]
    fn register_creates_plain_active_account() {
        let pool = test_pool();
        let account = store(&pool).register("a@x.com", "pw1").unwrap();
        assert!(account.is_active);
        assert!(!account.is_staff);
        assert!(!account.is_superuser);
        assert_eq!(store(&pool).get(account.id).unwrap(), account);
    }

    #[test]
    fn register_twice_is_conflict() {
        let pool = test_pool();
        store(&pool).register("a@x.com", "pw1").unwrap();
        assert!(matches!(
            store(&pool).register("a@x.com", "other"),
            Err(AppError::Conflict(_))
        ));
        // Domain case does not make a different account
        assert!(matches!(
            store(&pool).register("a@X.COM", "pw1"),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn register_empty_email_is_validation_error() {
        let pool = test_pool();
        assert!(matches!(
            store(&pool).register("", "x"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn register_admin_sets_capabilities() {
        let pool = test_pool();
        let admin = store(&pool).register_admin("root@x.com", "pw").unwrap();
        assert!(admin.is_staff && admin.is_superuser);
        assert!(store(&pool).get(admin.id).unwrap().is_superuser);
    }

    #[test]
    fn password_is_stored_hashed() {
        let pool = test_pool();
        let account = store(&pool).register("a@x.com", "pw1").unwrap();
        let conn = pool.get().unwrap();
        let hash: String = conn
            .query_row(
                "SELECT password_hash FROM user WHERE id = ?1",
                params![account.id],
                |r| r.get(0),
            )
            .unwrap();
        assert_ne!(hash, "pw1");
        assert!(hash.starts_with("$2"));
    }

    #[test]
    fn verify_credentials_checks_password_and_activity() {
        let pool = test_pool();
        let account = store(&pool).register("a@x.com", "pw1").unwrap();
        assert_eq!(
            store(&pool).verify_credentials("a@x.com", "pw1").unwrap(),
            Some(account.clone())
        );
        assert_eq!(store(&pool).verify_credentials("a@x.com", "nope").unwrap(), None);
        assert_eq!(store(&pool).verify_credentials("b@x.com", "pw1").unwrap(), None);

        pool.get()
            .unwrap()
            .execute("UPDATE user SET is_active = 0 WHERE id = ?1", params![account.id])
            .unwrap();
        assert_eq!(store(&pool).verify_credentials("a@x.com", "pw1").unwrap(), None);
    }

    #[test]
    fn normalize_email_lowercases_domain_only() {
        assert_eq!(normalize_email("Alice@Example.COM"), "Alice@example.com");
        assert_eq!(normalize_email("  bob@x.com "), "bob@x.com");
    }

    #[test]
    fn find_by_email_normalizes() {
        let pool = test_pool();
        let account = store(&pool).register("a@x.com", "pw1").unwrap();
        assert_eq!(
            store(&pool).find_by_email("a@X.com").unwrap().map(|a| a.id),
            Some(account.id)
        );
    }

    #[test]
    fn delete_cascades_everything_owned() {
        let pool = test_pool();
        let a = register(&pool, "a@x.com");
        let b = register(&pool, "b@x.com");
        let profiles = ProfileStore::new(pool.clone());
        let posts = PostStore::new(pool.clone());
        let comments = CommentStore::new(pool.clone());

        profiles.create(&a, "alice", ts(1)).unwrap();
        let a_post = posts.create(&a, "hi", "hello", ts(1)).unwrap();
        posts.set_image(a_post.id, &a, "posts/1hi.png").unwrap();
        let b_post = posts.create(&b, "yo", "there", ts(1)).unwrap();
        posts.like(b_post.id, &a).unwrap();
        posts.like(a_post.id, &b).unwrap();
        comments.create(&a, b_post.id, "mine", ts(1)).unwrap();
        comments.create(&b, a_post.id, "on a's post", ts(1)).unwrap();
        let b_comment = comments.create(&b, b_post.id, "b's own", ts(1)).unwrap();

        let removed = store(&pool).delete(a.id, &a).unwrap();
        assert_eq!(removed, RemovedImages(vec!["posts/1hi.png".into()]));

        assert!(matches!(store(&pool).get(a.id), Err(AppError::NotFound)));
        assert!(matches!(profiles.get_for_owner(a.id), Err(AppError::NotFound)));
        assert!(matches!(posts.get(a_post.id), Err(AppError::NotFound)));
        assert!(posts.get(b_post.id).unwrap().liked_by.is_empty());
        assert_eq!(
            comments.list(None).unwrap().iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![b_comment.id]
        );
    }

    #[test]
    fn delete_other_account_is_forbidden_unless_superuser() {
        let pool = test_pool();
        let a = register(&pool, "a@x.com");
        let b = register(&pool, "b@x.com");
        assert!(matches!(
            store(&pool).delete(a.id, &b),
            Err(AppError::Forbidden)
        ));

        let root = store(&pool).register_admin("root@x.com", "pw").unwrap();
        store(&pool).delete(a.id, &requester(&root)).unwrap();
        assert!(matches!(store(&pool).get(a.id), Err(AppError::NotFound)));
    }
}
