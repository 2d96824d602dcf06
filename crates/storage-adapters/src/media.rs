//! # Cover image storage
//!
//! `LocalBlobStore` writes uploads under a sharded directory tree:
//! `<root>/ab/cd/abcd...`. Blob ids are random, so two codes never share a
//! file and deleting one cover can't break another.

use std::io::Cursor;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use domains::{BlobStore, DomainError, Result};
use image::ImageReader;
use tokio::fs;
use uuid::Uuid;

use crate::error::StorageError;

pub struct LocalBlobStore {
    /// Root directory for all uploads (e.g. "./data/covers").
    root_path: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root.into(),
        }
    }

    /// Generates a sharded path: "ab/cd/abcd..."
    fn sharded_path(&self, blob_id: &str) -> Result<PathBuf> {
        // Ids come back from the database and from URLs; never let one
        // escape the root.
        let well_formed =
            blob_id.len() >= 4 && blob_id.chars().all(|c| c.is_ascii_alphanumeric());
        if !well_formed {
            return Err(DomainError::Validation(format!("invalid blob id {blob_id:?}")));
        }
        let mut path = self.root_path.clone();
        path.push(&blob_id[0..2]);
        path.push(&blob_id[2..4]);
        path.push(blob_id);
        Ok(path)
    }
}

/// Rejects payloads whose bytes are not a known image format, whatever the
/// declared content type says.
pub fn sniff_image(data: &[u8]) -> Result<image::ImageFormat> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()
        .and_then(|reader| reader.format())
        .ok_or_else(|| DomainError::Validation("upload is not a recognised image".into()))
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, data: Bytes, content_type: &mime::Mime) -> Result<String> {
        let format = sniff_image(&data)?;
        let blob_id = Uuid::new_v4().simple().to_string();
        let target = self.sharded_path(&blob_id)?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(StorageError::from)?;
        }
        fs::write(&target, &data).await.map_err(StorageError::from)?;

        tracing::debug!(%blob_id, %content_type, ?format, bytes = data.len(), "cover stored");
        Ok(blob_id)
    }

    async fn delete(&self, blob_id: &str) -> Result<()> {
        let path = self.sharded_path(blob_id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::from(e).into()),
        }
    }
}

/// Keeps blobs in memory. For tests and development only.
#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: DashMap<String, (Bytes, mime::Mime)>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, blob_id: &str) -> bool {
        self.blobs.contains_key(blob_id)
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, data: Bytes, content_type: &mime::Mime) -> Result<String> {
        sniff_image(&data)?;
        let blob_id = Uuid::new_v4().simple().to_string();
        self.blobs
            .insert(blob_id.clone(), (data, content_type.clone()));
        Ok(blob_id)
    }

    async fn delete(&self, blob_id: &str) -> Result<()> {
        self.blobs.remove(blob_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Smallest valid PNG signature plus IHDR start is enough for sniffing.
    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("fanhub-media-{}", Uuid::new_v4().simple()))
    }

    #[tokio::test]
    async fn put_then_delete_round_trip() {
        let root = temp_root();
        let store = LocalBlobStore::new(&root);

        let id = store
            .put(Bytes::from_static(PNG), &mime::IMAGE_PNG)
            .await
            .unwrap();
        let path = store.sharded_path(&id).unwrap();
        assert!(path.starts_with(&root));
        assert!(path.exists());

        store.delete(&id).await.unwrap();
        assert!(!path.exists());
        // Deleting twice is fine.
        tokio_test::assert_ok!(store.delete(&id).await);

        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn non_image_bytes_are_rejected() {
        let store = LocalBlobStore::new(temp_root());
        let err = store
            .put(Bytes::from_static(b"#!/bin/sh\nrm -rf /"), &mime::IMAGE_PNG)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn traversal_ids_are_refused() {
        let store = LocalBlobStore::new("/srv/covers");
        assert!(store.sharded_path("../../etc/passwd").is_err());
        assert!(store.sharded_path("ab").is_err());
        assert!(store.sharded_path("abcdef0123").is_ok());
    }
}
