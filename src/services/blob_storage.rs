//! Pluggable blob storage for uploaded videos.
//!
//! Video rows only hold the public URL of their object. The bytes live in one
//! of these backends:
//!
//! - **Filesystem**: files under a local directory, served by this process at
//!   `/media/videos/`
//! - **S3**: any S3-compatible object store (requires `s3-storage`)
//!
//! The backend is chosen by `[storage.videos]`.

use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
#[cfg(feature = "s3-storage")]
use tracing::error;
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "s3-storage")]
use crate::config::S3StorageConfig;
use crate::config::{FilesystemStorageConfig, VideoStorageBackend, VideoStorageConfig};

#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("S3 error: {0}")]
    S3(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type BlobStoreResult<T> = Result<T, BlobStoreError>;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `content` under `key` and return its public URL.
    ///
    /// Fails with [`BlobStoreError::AlreadyExists`] rather than overwriting.
    async fn upload(&self, key: &str, content: Bytes, content_type: &str)
    -> BlobStoreResult<String>;

    /// Remove objects. Keys that do not exist are ignored.
    async fn remove(&self, keys: &[String]) -> BlobStoreResult<()>;

    /// Public URL for `key`, whether or not it exists.
    fn public_url(&self, key: &str) -> String;

    fn backend_name(&self) -> &'static str;
}

/// Object key of a stored video: the last path segment of its URL.
///
/// Query strings and fragments are ignored. Returns `None` when the URL has
/// no usable final segment.
pub fn object_key_from_url(file_url: &str) -> Option<String> {
    let path = match url::Url::parse(file_url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => file_url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    path.rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

/// Keys are flat names; anything that could escape the storage root is refused.
fn check_key(key: &str) -> BlobStoreResult<()> {
    if key.is_empty() || key == "." || key == ".." || key.contains(['/', '\\']) {
        return Err(BlobStoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Stores videos as `{path}/{key}` on the local filesystem.
pub struct FilesystemBlobStore {
    config: FilesystemStorageConfig,
    public_url_base: String,
}

impl FilesystemBlobStore {
    /// `public_url_base` is used when the config does not set its own.
    pub fn new(
        config: FilesystemStorageConfig,
        public_url_base: impl Into<String>,
    ) -> BlobStoreResult<Self> {
        if config.create_dir {
            let path = Path::new(&config.path);
            if !path.exists() {
                info!(path = %config.path, "Creating video storage directory");
                std::fs::create_dir_all(path)?;

                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    std::fs::set_permissions(
                        path,
                        std::fs::Permissions::from_mode(config.dir_mode),
                    )?;
                }
            }
        }

        let public_url_base = config
            .public_url_base
            .clone()
            .unwrap_or_else(|| public_url_base.into())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            config,
            public_url_base,
        })
    }

    /// Directory served under `/media/videos/`.
    pub fn root(&self) -> &str {
        &self.config.path
    }
}

async fn write_new_file(path: &Path, content: &[u8], mode: u32) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(content).await?;
    file.flush().await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(())
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    #[instrument(skip(self, content), fields(size = content.len()))]
    async fn upload(
        &self,
        key: &str,
        content: Bytes,
        content_type: &str,
    ) -> BlobStoreResult<String> {
        check_key(key)?;
        let path = self.config.file_path(key);
        if tokio::fs::try_exists(&path).await? {
            return Err(BlobStoreError::AlreadyExists(key.to_string()));
        }

        debug!(key, path = %path.display(), content_type, "Storing video on filesystem");

        let temp_path = path.with_file_name(format!(".{key}.{}.tmp", uuid::Uuid::new_v4()));
        let written = write_new_file(&temp_path, &content, self.config.file_mode).await;
        // hard_link never replaces an existing target, unlike rename.
        let published = match written {
            Ok(()) => tokio::fs::hard_link(&temp_path, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = tokio::fs::remove_file(&temp_path).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %temp_path.display(), error = %e, "Failed to remove temporary upload");
        }
        match published {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(BlobStoreError::AlreadyExists(key.to_string()));
            }
            Err(e) => return Err(BlobStoreError::Io(e)),
        }

        info!(key, path = %path.display(), "Video stored");
        Ok(self.public_url(key))
    }

    #[instrument(skip(self), fields(count = keys.len()))]
    async fn remove(&self, keys: &[String]) -> BlobStoreResult<()> {
        for key in keys {
            check_key(key)?;
            let path = self.config.file_path(key);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!(key, "Video removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!(key, "Video already absent");
                }
                Err(e) => return Err(BlobStoreError::Io(e)),
            }
        }
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_url_base, key)
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}

/// Stores videos in an S3-compatible bucket.
#[cfg(feature = "s3-storage")]
pub struct S3BlobStore {
    config: S3StorageConfig,
    client: aws_sdk_s3::Client,
}

#[cfg(feature = "s3-storage")]
impl S3BlobStore {
    pub async fn new(config: S3StorageConfig) -> BlobStoreResult<Self> {
        info!(bucket = %config.bucket, "Initializing S3 video storage");

        let mut sdk_config_builder = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(region) = &config.region {
            sdk_config_builder = sdk_config_builder.region(aws_config::Region::new(region.clone()));
        }

        if let (Some(access_key), Some(secret_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            let credentials = aws_credential_types::Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None,
                None,
                "cinebaby-config",
            );
            sdk_config_builder = sdk_config_builder.credentials_provider(credentials);
        }

        let sdk_config = sdk_config_builder.load().await;
        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&sdk_config);

        if let Some(endpoint) = &config.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }
        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = aws_sdk_s3::Client::from_conf(s3_config_builder.build());
        Ok(Self { config, client })
    }
}

#[cfg(feature = "s3-storage")]
#[async_trait]
impl BlobStore for S3BlobStore {
    #[instrument(skip(self, content), fields(size = content.len(), bucket = %self.config.bucket))]
    async fn upload(
        &self,
        key: &str,
        content: Bytes,
        content_type: &str,
    ) -> BlobStoreResult<String> {
        check_key(key)?;
        let object_key = self.config.object_key(key);
        debug!(key = %object_key, content_type, "Storing video in S3");

        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&object_key)
            .content_type(content_type)
            .cache_control("max-age=3600")
            .if_none_match("*")
            .body(aws_sdk_s3::primitives::ByteStream::from(content))
            .send()
            .await
            .map_err(|e| {
                let message = e.to_string();
                if message.contains("PreconditionFailed") {
                    BlobStoreError::AlreadyExists(key.to_string())
                } else {
                    error!(error = %message, "Failed to upload to S3");
                    BlobStoreError::S3(message)
                }
            })?;

        info!(key = %object_key, bucket = %self.config.bucket, "Video stored in S3");
        Ok(self.public_url(key))
    }

    #[instrument(skip(self), fields(count = keys.len(), bucket = %self.config.bucket))]
    async fn remove(&self, keys: &[String]) -> BlobStoreResult<()> {
        for key in keys {
            check_key(key)?;
            let object_key = self.config.object_key(key);
            // DeleteObject succeeds for missing keys.
            self.client
                .delete_object()
                .bucket(&self.config.bucket)
                .key(&object_key)
                .send()
                .await
                .map_err(|e| {
                    error!(error = %e, key = %object_key, "Failed to delete from S3");
                    BlobStoreError::S3(e.to_string())
                })?;
            debug!(key = %object_key, "Video removed from S3");
        }
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        self.config.public_url(key)
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}

/// Build the configured video store.
///
/// `default_public_base` is the server's public base URL; filesystem objects
/// are published under `{default_public_base}/media/videos` unless configured
/// otherwise.
pub async fn create_blob_store(
    config: &VideoStorageConfig,
    default_public_base: &str,
) -> BlobStoreResult<Arc<dyn BlobStore>> {
    match config.backend {
        VideoStorageBackend::Filesystem => {
            let fs_config = config.filesystem_or_default();
            info!(path = %fs_config.path, "Using filesystem video storage backend");
            Ok(Arc::new(FilesystemBlobStore::new(
                fs_config,
                format!("{}/media/videos", default_public_base.trim_end_matches('/')),
            )?))
        }
        #[cfg(feature = "s3-storage")]
        VideoStorageBackend::S3 => {
            let s3_config = config.s3.clone().ok_or_else(|| {
                BlobStoreError::Config(
                    "S3 backend requires [storage.videos.s3] config".to_string(),
                )
            })?;
            Ok(Arc::new(S3BlobStore::new(s3_config).await?))
        }
        #[cfg(not(feature = "s3-storage"))]
        VideoStorageBackend::S3 => Err(BlobStoreError::Config(
            "S3 video storage requires the 's3-storage' feature. \
                Rebuild with: cargo build --features s3-storage"
                .to_string(),
        )),
    }
}
