use actix_web::error::BlockingError;
use actix_web::web;
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const META_DIR: &str = ".meta";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid object key: {0}")]
    InvalidKey(String),
    #[error("Object already exists: {0}")]
    AlreadyExists(String),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Signature(String),
    #[error("Blocking task failed: {0}")]
    Blocking(#[from] BlockingError),
    #[error("Serde JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Bucketed blob storage with time-limited retrieval links.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn ensure_bucket(&self, bucket: &str) -> Result<(), StorageError>;

    /// Stores a new object. Never overwrites an existing key.
    async fn upload(&self, bucket: &str, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), StorageError>;

    /// Deletes an object and its metadata. Removing a missing key is not an error.
    async fn remove(&self, bucket: &str, key: &str) -> Result<(), StorageError>;

    async fn create_signed_url(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String, StorageError>;
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMeta {
    content_type: String,
}

/// HMAC-SHA256 signatures over `bucket/key:exp`.
#[derive(Clone)]
pub struct UrlSigner {
    secret_key: String,
}

impl UrlSigner {
    pub fn new(secret_key: String) -> Self {
        Self { secret_key }
    }

    fn mac(&self, bucket: &str, key: &str, expires_at: i64) -> Result<HmacSha256, StorageError> {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| StorageError::Signature(format!("HMAC error: {}", e)))?;
        mac.update(format!("{}/{}:{}", bucket, key, expires_at).as_bytes());
        Ok(mac)
    }

    pub fn sign(&self, bucket: &str, key: &str, expires_at: i64) -> Result<String, StorageError> {
        Ok(hex::encode(self.mac(bucket, key, expires_at)?.finalize().into_bytes()))
    }

    /// Checks expiry first, then the signature in constant time.
    pub fn verify(&self, bucket: &str, key: &str, expires_at: i64, signature: &str, now: i64) -> Result<(), StorageError> {
        if now > expires_at {
            return Err(StorageError::Signature("URL expired".to_string()));
        }
        let provided = hex::decode(signature).map_err(|_| StorageError::Signature("Invalid signature".to_string()))?;
        self.mac(bucket, key, expires_at)?
            .verify_slice(&provided)
            .map_err(|_| StorageError::Signature("Invalid signature".to_string()))
    }
}

/// Buckets are directories under `root`; each object's content type sits in `.meta/<key>.json`.
pub struct LocalObjectStorage {
    root: PathBuf,
    signer: UrlSigner,
    public_base_url: String,
}

impl LocalObjectStorage {
    pub fn new(root: PathBuf, signer: UrlSigner, public_base_url: &str) -> Self {
        Self {
            root,
            signer,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn bucket_path(&self, bucket: &str) -> Result<PathBuf, StorageError> {
        validate_component(bucket)?;
        Ok(self.root.join(bucket))
    }

    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        validate_component(key)?;
        Ok(self.bucket_path(bucket)?.join(key))
    }

    fn meta_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        validate_component(key)?;
        Ok(self.bucket_path(bucket)?.join(META_DIR).join(format!("{}.json", key)))
    }

    /// Validates a signed link and returns the object's path and content type.
    pub async fn open_signed(
        &self,
        bucket: &str,
        key: &str,
        expires_at: i64,
        signature: &str,
    ) -> Result<(PathBuf, String), StorageError> {
        self.signer.verify(bucket, key, expires_at, signature, Utc::now().timestamp())?;

        let path = self.object_path(bucket, key)?;
        let meta_path = self.meta_path(bucket, key)?;
        let missing = format!("{}/{}", bucket, key);

        web::block(move || {
            if !path.is_file() {
                return Err(StorageError::NotFound(missing));
            }
            let content_type = read_content_type(&meta_path);
            Ok((path, content_type))
        })
        .await?
    }
}

fn read_content_type(meta_path: &Path) -> String {
    std::fs::read_to_string(meta_path)
        .ok()
        .and_then(|raw| serde_json::from_str::<ObjectMeta>(&raw).ok())
        .map(|meta| meta.content_type)
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
}

/// Raster `image/*` types that are safe to render inline. SVG can carry script.
pub fn is_image_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .and_then(|essence| essence.trim().strip_prefix("image/"))
        .is_some_and(|subtype| !subtype.is_empty() && !subtype.eq_ignore_ascii_case("svg+xml"))
}

fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Bucket names and keys must be one plain path component.
fn validate_component(name: &str) -> Result<(), StorageError> {
    let valid = !name.is_empty()
        && name.len() <= 255
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(name.to_string()))
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn ensure_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        let meta_dir = self.bucket_path(bucket)?.join(META_DIR);
        web::block(move || std::fs::create_dir_all(meta_dir)).await??;
        log::debug!("Bucket '{}' ready", bucket);
        Ok(())
    }

    async fn upload(&self, bucket: &str, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        let path = self.object_path(bucket, key)?;
        let meta_path = self.meta_path(bucket, key)?;
        let meta = serde_json::to_vec(&ObjectMeta {
            content_type: content_type.to_string(),
        })?;
        let object_name = format!("{}/{}", bucket, key);

        web::block(move || -> Result<(), StorageError> {
            if let Some(meta_dir) = meta_path.parent() {
                std::fs::create_dir_all(meta_dir)?;
            }
            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    return Err(StorageError::AlreadyExists(object_name));
                }
                Err(e) => return Err(e.into()),
            };
            let written = file
                .write_all(&data)
                .and_then(|_| file.sync_all())
                .and_then(|_| std::fs::write(&meta_path, meta));
            if let Err(e) = written {
                drop(file);
                remove_if_present(&path)?;
                remove_if_present(&meta_path)?;
                return Err(e.into());
            }
            Ok(())
        })
        .await??;

        log::info!("Stored object {}/{}", bucket, key);
        Ok(())
    }

    async fn remove(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        let path = self.object_path(bucket, key)?;
        let meta_path = self.meta_path(bucket, key)?;
        web::block(move || -> Result<(), StorageError> {
            remove_if_present(&path)?;
            remove_if_present(&meta_path)?;
            Ok(())
        })
        .await??;
        log::info!("Removed object {}/{}", bucket, key);
        Ok(())
    }

    async fn create_signed_url(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String, StorageError> {
        let path = self.object_path(bucket, key)?;
        let exists = web::block(move || path.is_file()).await?;
        if !exists {
            return Err(StorageError::NotFound(format!("{}/{}", bucket, key)));
        }

        let expires_at = Utc::now().timestamp() + ttl.as_secs() as i64;
        let signature = self.signer.sign(bucket, key, expires_at)?;
        Ok(format!(
            "{}/storage/{}/{}?exp={}&sig={}",
            self.public_base_url, bucket, key, expires_at, signature
        ))
    }
}
