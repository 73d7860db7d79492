use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::Config;
use crate::media::ImageStore;
use crate::store::{AccountStore, CommentStore, PostStore, ProfileStore};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub images: Arc<dyn ImageStore>,
}

impl AppState {
    pub fn accounts(&self) -> AccountStore {
        AccountStore::new(self.db.clone(), self.config.auth.bcrypt_cost)
    }

    pub fn profiles(&self) -> ProfileStore {
        ProfileStore::new(self.db.clone())
    }

    pub fn posts(&self) -> PostStore {
        PostStore::new(self.db.clone())
    }

    pub fn comments(&self) -> CommentStore {
        CommentStore::new(self.db.clone())
    }
}
