//! Image store seam and the path-naming policy for uploaded images.
//!
//! Rows hold the relative path (`avatars/1alice.png`); the wire shape renders
//! it under [`MEDIA_PREFIX`].

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::error::{AppError, AppResult};
use crate::serializers::FieldErrors;

pub const MEDIA_PREFIX: &str = "/media";

/// An uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Stores `bytes` at `path`, replacing any existing file. Returns the public URL.
    async fn save(&self, path: &str, bytes: &[u8]) -> AppResult<String>;

    async fn load(&self, path: &str) -> AppResult<Vec<u8>>;

    async fn remove(&self, path: &str) -> AppResult<()>;
}

/// Text after the last `.` of `filename`; the whole name when there is no dot.
pub fn extension_of(filename: &str) -> &str {
    filename.rsplit('.').next().unwrap_or(filename)
}

pub fn avatar_path(owner_id: i64, username: &str, filename: &str) -> String {
    format!("avatars/{}{}.{}", owner_id, username, extension_of(filename))
}

pub fn post_image_path(post_id: i64, title: &str, filename: &str) -> String {
    format!("posts/{}{}.{}", post_id, title, extension_of(filename))
}

pub fn media_url(path: &str) -> String {
    format!("{}/{}", MEDIA_PREFIX, path)
}

/// Rejects paths that would leave the store root. Handlers run this on the
/// planned path before writing any row, so a bad title, username or filename
/// fails the request with nothing persisted.
pub fn check_path(path: &str) -> AppResult<()> {
    let escapes = Path::new(path).components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if path.is_empty() || escapes {
        let mut errors = FieldErrors::default();
        errors.add("img", "Image path is not allowed.");
        return Err(AppError::Validation(errors));
    }
    Ok(())
}

/// Filesystem-backed store rooted at the configured storage directory.
pub struct FsImageStore {
    root: PathBuf,
}

impl FsImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> AppResult<PathBuf> {
        check_path(path)?;
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl ImageStore for FsImageStore {
    async fn save(&self, path: &str, bytes: &[u8]) -> AppResult<String> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        tracing::debug!("Stored image {} ({} bytes)", path, bytes.len());
        Ok(media_url(path))
    }

    async fn load(&self, path: &str) -> AppResult<Vec<u8>> {
        let target = self.resolve(path)?;
        match tokio::fs::read(&target).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AppError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, path: &str) -> AppResult<()> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Removes an image no row points at any more, logging instead of failing
/// the request.
pub async fn discard(images: &dyn ImageStore, path: &str) {
    if let Err(e) = images.remove(path).await {
        tracing::warn!("Could not remove image {}: {}", path, e);
    }
}

/// Removes a superseded image unless the new one landed on the same path.
pub async fn discard_replaced(images: &dyn ImageStore, old: Option<&str>, new: &str) {
    if let Some(old) = old.filter(|old| *old != new) {
        discard(images, old).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_text_after_last_dot() {
        assert_eq!(extension_of("me.png"), "png");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("noext"), "noext");
        assert_eq!(extension_of("trailing."), "");
    }

    #[test]
    fn avatar_path_uses_owner_id_and_username() {
        assert_eq!(avatar_path(7, "alice", "photo.JPG"), "avatars/7alice.JPG");
    }

    #[test]
    fn post_image_path_uses_post_id_and_title() {
        assert_eq!(post_image_path(3, "hi", "cat.gif"), "posts/3hi.gif");
    }

    #[test]
    fn any_extension_is_accepted() {
        assert_eq!(avatar_path(1, "bob", "script.exe"), "avatars/1bob.exe");
    }

    #[test]
    fn check_path_rejects_traversal_from_title_or_extension() {
        assert!(check_path(&post_image_path(1, "hi", "cat.png")).is_ok());
        assert!(check_path(&post_image_path(1, "a/../b", "cat.png")).is_err());
        assert!(check_path(&avatar_path(1, "alice", "x./../y")).is_err());
        // Dots inside one component are just a name
        assert!(check_path(&post_image_path(1, "..", "cat.png")).is_ok());
    }

    #[tokio::test]
    async fn fs_store_round_trips_bytes() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsImageStore::new(tmp.path());

        let url = store.save("avatars/1alice.png", b"png-bytes").await.unwrap();
        assert_eq!(url, "/media/avatars/1alice.png");
        assert!(tmp.path().join("avatars/1alice.png").exists());
        assert_eq!(
            store.load("avatars/1alice.png").await.unwrap(),
            b"png-bytes".to_vec()
        );

        store.remove("avatars/1alice.png").await.unwrap();
        assert!(matches!(
            store.load("avatars/1alice.png").await,
            Err(AppError::NotFound)
        ));
        // Removing twice is fine
        store.remove("avatars/1alice.png").await.unwrap();
    }

    #[tokio::test]
    async fn fs_store_rejects_escaping_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsImageStore::new(tmp.path().join("media"));

        for path in ["avatars/1../../etc.png", "/etc/passwd", "../x.png", ""] {
            assert!(
                matches!(store.save(path, b"x").await, Err(AppError::Validation(_))),
                "{path} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn discard_replaced_keeps_same_path() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsImageStore::new(tmp.path());
        store.save("posts/1a.png", b"1").await.unwrap();

        discard_replaced(&store, Some("posts/1a.png"), "posts/1a.png").await;
        assert!(tmp.path().join("posts/1a.png").exists());

        discard_replaced(&store, Some("posts/1a.png"), "posts/1b.png").await;
        assert!(!tmp.path().join("posts/1a.png").exists());
    }
}
