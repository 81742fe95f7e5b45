//! Media storage: GCS in production, a local directory for development
//!
//! Uploaded files land under a user-namespaced path and come back as a
//! durable public URL the publishers (and the frontend) can fetch.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use bytes::Bytes;
use google_cloud_storage::client::Storage;
use rand::Rng;
use std::path::PathBuf;

use crate::constants::DEFAULT_BUCKET;

#[derive(Clone)]
pub enum MediaStore {
    Gcs {
        client: Storage,
        bucket: String,
    },
    Local {
        root: PathBuf,
        base_url: String,
    },
}

#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
    Gcs(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "{}", e),
            StorageError::Gcs(e) => write!(f, "{}", e),
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}

impl MediaStore {
    /// Local directory when LOCAL_STORAGE_PATH is set, GCS otherwise.
    /// The GCS client picks up GOOGLE_APPLICATION_CREDENTIALS itself.
    pub async fn from_env(public_url: &str) -> Result<Self, StorageError> {
        if let Ok(path) = std::env::var("LOCAL_STORAGE_PATH") {
            return Ok(MediaStore::Local {
                root: PathBuf::from(path),
                base_url: format!("{}/media", public_url.trim_end_matches('/')),
            });
        }

        let client = Storage::builder()
            .build()
            .await
            .map_err(|e| StorageError::Gcs(e.to_string()))?;
        let bucket =
            std::env::var("MEDIA_BUCKET").unwrap_or_else(|_| DEFAULT_BUCKET.to_string());
        Ok(MediaStore::Gcs { client, bucket })
    }

    /// Store a media file under a fresh user-namespaced key and return its
    /// public URL
    pub async fn put_media(
        &self,
        user_id: i64,
        file_name: &str,
        data: Bytes,
    ) -> Result<String, StorageError> {
        let key = object_key(user_id, file_name);
        match self {
            MediaStore::Gcs { client, bucket } => {
                let bucket_path = format!("projects/_/buckets/{}", bucket);
                client
                    .write_object(&bucket_path, &key, data)
                    .send_buffered()
                    .await
                    .map_err(|e| StorageError::Gcs(e.to_string()))?;
                Ok(format!("https://storage.googleapis.com/{}/{}", bucket, key))
            }
            MediaStore::Local { root, base_url } => {
                let full_path = root.join(&key);
                if let Some(parent) = full_path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&full_path, &data).await?;
                Ok(format!("{}/{}", base_url, key))
            }
        }
    }
}

/// `{user_id}/{random}.{ext}`; random part keeps resubmitted files from
/// clobbering each other
fn object_key(user_id: i64, file_name: &str) -> String {
    let bytes: [u8; 9] = rand::rng().random();
    let random = URL_SAFE_NO_PAD.encode(bytes);
    let ext = file_name.rsplit('.').next().filter(|e| e.len() <= 8);
    match ext {
        Some(ext) if !ext.is_empty() && ext != file_name => {
            format!("{}/{}.{}", user_id, random, ext)
        }
        _ => format!("{}/{}", user_id, random),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_key_keeps_extension_and_user_prefix() {
        let key = object_key(7, "clip.mp4");
        assert!(key.starts_with("7/"));
        assert!(key.ends_with(".mp4"));
    }

    #[test]
    fn object_key_handles_missing_extension() {
        let key = object_key(7, "noext");
        assert!(key.starts_with("7/"));
        assert!(!key.contains('.'));
    }

    #[tokio::test]
    async fn local_store_writes_file_and_returns_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::Local {
            root: dir.path().to_path_buf(),
            base_url: "http://localhost:3000/media".to_string(),
        };

        let url = store
            .put_media(1, "clip.mp4", Bytes::from_static(b"video bytes"))
            .await
            .unwrap();

        assert!(url.starts_with("http://localhost:3000/media/1/"));
        let key = url.strip_prefix("http://localhost:3000/media/").unwrap();
        let written = std::fs::read(dir.path().join(key)).unwrap();
        assert_eq!(written, b"video bytes");
    }
}
