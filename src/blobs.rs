//! Blob storage for uploaded files (passport scans).
//!
//! Keys are relative, slash-separated paths such as
//! `passports/12-<sha256>.pdf`; the content hash keeps replaced uploads from
//! colliding with the file they replace.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::{AppError, AppResult};

const PASSPORT_PREFIX: &str = "passports";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `key`, replacing any existing blob
    async fn put(&self, key: &str, data: Vec<u8>) -> AppResult<()>;
    async fn get(&self, key: &str) -> AppResult<Vec<u8>>;
    /// Missing blobs are not an error
    async fn delete(&self, key: &str) -> AppResult<()>;
}

/// Key for a passport scan of `equipment_id`
pub fn passport_key(equipment_id: i32, file_name: Option<&str>, data: &[u8]) -> String {
    let digest = hex::encode(Sha256::digest(data));
    match file_name.and_then(extension) {
        Some(ext) => format!("{}/{}-{}.{}", PASSPORT_PREFIX, equipment_id, digest, ext),
        None => format!("{}/{}-{}", PASSPORT_PREFIX, equipment_id, digest),
    }
}

/// Lowercased alphanumeric extension, at most 8 characters
fn extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    if ext.is_empty() || ext.len() > 8 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext)
}

/// MIME type served for a stored key
pub fn content_type(key: &str) -> &'static str {
    match key.rsplit_once('.').map(|(_, ext)| ext) {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("tif") | Some("tiff") => "image/tiff",
        _ => "application/octet-stream",
    }
}

/// Blob store rooted in a local directory
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a key under the root, refusing anything that could escape it
    fn path(&self, key: &str) -> AppResult<PathBuf> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(AppError::BadRequest(format!("Invalid blob key: {}", key)));
        }
        Ok(self.root.join(relative))
    }
}

fn io_error(action: &str, key: &str, err: std::io::Error) -> AppError {
    AppError::Internal(format!("Failed to {} blob {}: {}", action, key, err))
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, data: Vec<u8>) -> AppResult<()> {
        let path = self.path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error("prepare", key, e))?;
        }

        // Readers never observe a half-written file
        let mut staging = path.clone().into_os_string();
        staging.push(".part");
        let staging = PathBuf::from(staging);
        tokio::fs::write(&staging, &data)
            .await
            .map_err(|e| io_error("write", key, e))?;
        tokio::fs::rename(&staging, &path)
            .await
            .map_err(|e| io_error("commit", key, e))?;

        tracing::debug!("Stored blob {} ({} bytes)", key, data.len());
        Ok(())
    }

    async fn get(&self, key: &str) -> AppResult<Vec<u8>> {
        let path = self.path(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::NotFound(format!("Blob {} not found", key)))
            }
            Err(e) => Err(io_error("read", key, e)),
        }
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let path = self.path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("delete", key, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passport_keys_are_content_addressed() {
        let a = passport_key(7, Some("Scan.PDF"), b"first");
        let b = passport_key(7, Some("scan.pdf"), b"second");
        assert!(a.starts_with("passports/7-"));
        assert!(a.ends_with(".pdf"));
        assert_ne!(a, b);
        assert_eq!(a, passport_key(7, Some("other.pdf"), b"first"));
    }

    #[test]
    fn odd_extensions_are_dropped() {
        assert!(!passport_key(1, Some("noext"), b"x").contains('.'));
        assert_eq!(passport_key(1, Some("a.p/df"), b"x").matches('/').count(), 1);
        assert!(!passport_key(1, None, b"x").contains('.'));
    }

    #[test]
    fn content_type_by_extension() {
        assert_eq!(content_type("passports/1-abc.pdf"), "application/pdf");
        assert_eq!(content_type("passports/1-abc.jpeg"), "image/jpeg");
        assert_eq!(content_type("passports/1-abc"), "application/octet-stream");
    }

    #[tokio::test]
    async fn fs_store_round_trip_and_idempotent_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        let key = passport_key(3, Some("scan.pdf"), b"%PDF-1.4");

        store.put(&key, b"%PDF-1.4".to_vec()).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), b"%PDF-1.4".to_vec());

        store.delete(&key).await.unwrap();
        store.delete(&key).await.unwrap();
        assert!(matches!(store.get(&key).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn fs_store_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        for key in ["../etc/passwd", "/etc/passwd", ""] {
            assert!(matches!(store.get(key).await, Err(AppError::BadRequest(_))));
        }
    }
}
