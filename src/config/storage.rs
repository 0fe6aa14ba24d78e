//! Blob storage configuration for uploaded ultrasound videos.
//!
//! Video metadata lives in the database; this config decides where the bytes
//! live and which public URL is recorded for them.
//!
//! # Example Configuration
//!
//! ```toml
//! [storage.videos]
//! backend = "s3"
//!
//! [storage.videos.s3]
//! bucket = "videos"
//! region = "sa-east-1"
//! public_url_base = "https://cdn.cinebaby.app/videos"
//!
//! [storage.videos.filesystem]
//! path = "/var/lib/cinebaby/videos"
//! ```

use serde::{Deserialize, Serialize};

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Video blob storage.
    #[serde(default)]
    pub videos: VideoStorageConfig,
}

/// Video blob storage backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct VideoStorageConfig {
    /// Storage backend to use.
    #[serde(default)]
    pub backend: VideoStorageBackend,

    /// S3 configuration (required when backend = "s3").
    #[serde(default)]
    pub s3: Option<S3StorageConfig>,

    /// Filesystem configuration. Defaults apply when omitted.
    #[serde(default)]
    pub filesystem: Option<FilesystemStorageConfig>,
}

impl VideoStorageConfig {
    /// Validate the storage configuration.
    pub fn validate(&self) -> Result<(), String> {
        match self.backend {
            VideoStorageBackend::S3 => match &self.s3 {
                Some(s3) => s3.validate(),
                None => Err(
                    "S3 storage backend requires [storage.videos.s3] configuration".to_string(),
                ),
            },
            VideoStorageBackend::Filesystem => match &self.filesystem {
                Some(fs) => fs.validate(),
                None => Ok(()),
            },
        }
    }

    /// Filesystem settings, falling back to defaults.
    pub fn filesystem_or_default(&self) -> FilesystemStorageConfig {
        self.filesystem.clone().unwrap_or_default()
    }
}

/// Storage backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum VideoStorageBackend {
    /// Local directory served by this process under `/media/videos/`.
    #[default]
    Filesystem,

    /// S3-compatible object storage (AWS S3, MinIO, R2, Supabase storage...).
    S3,
}

/// S3-compatible object storage configuration.
#[derive(Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct S3StorageConfig {
    /// Bucket name.
    pub bucket: String,

    /// Region (e.g., "sa-east-1").
    #[serde(default)]
    pub region: Option<String>,

    /// Custom endpoint URL for S3-compatible services.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Access key ID. Falls back to the default AWS credential chain.
    #[serde(default)]
    pub access_key_id: Option<String>,

    /// Secret access key.
    #[serde(default)]
    pub secret_access_key: Option<String>,

    /// Use path-style URLs. Required for MinIO.
    #[serde(default)]
    pub force_path_style: bool,

    /// Key prefix for all stored objects.
    #[serde(default)]
    pub key_prefix: Option<String>,

    /// Base of the public URL recorded for uploaded videos. Object keys are
    /// appended to it. Defaults to `{endpoint}/{bucket}` or the AWS
    /// virtual-hosted URL.
    #[serde(default)]
    pub public_url_base: Option<String>,
}

impl std::fmt::Debug for S3StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3StorageConfig")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field(
                "access_key_id",
                &self.access_key_id.as_ref().map(|_| "****"),
            )
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "****"),
            )
            .field("force_path_style", &self.force_path_style)
            .field("key_prefix", &self.key_prefix)
            .field("public_url_base", &self.public_url_base)
            .finish()
    }
}

impl S3StorageConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.bucket.is_empty() {
            return Err("S3 bucket name cannot be empty".to_string());
        }
        if self.region.is_none() && self.endpoint.is_none() {
            return Err("S3 requires either 'region' or 'endpoint' to be specified".to_string());
        }
        Ok(())
    }

    /// Full object key for a stored video.
    pub fn object_key(&self, key: &str) -> String {
        match &self.key_prefix {
            Some(prefix) if !prefix.trim_matches('/').is_empty() => {
                format!("{}/{}", prefix.trim_matches('/'), key)
            }
            _ => key.to_string(),
        }
    }

    /// Public URL under which `key` is reachable.
    pub fn public_url(&self, key: &str) -> String {
        let object_key = self.object_key(key);
        if let Some(base) = &self.public_url_base {
            return format!("{}/{}", base.trim_end_matches('/'), key);
        }
        match (&self.endpoint, &self.region) {
            (Some(endpoint), _) => format!(
                "{}/{}/{}",
                endpoint.trim_end_matches('/'),
                self.bucket,
                object_key
            ),
            (None, Some(region)) => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, region, object_key
            ),
            (None, None) => object_key,
        }
    }
}

/// Local filesystem storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct FilesystemStorageConfig {
    /// Base directory. Videos are stored as `{path}/{key}`.
    #[serde(default = "default_path")]
    pub path: String,

    /// Create the directory if it doesn't exist.
    #[serde(default = "default_true")]
    pub create_dir: bool,

    /// File permissions (Unix mode) for new files.
    #[serde(default = "default_file_mode")]
    pub file_mode: u32,

    /// Directory permissions (Unix mode) for new directories.
    #[serde(default = "default_dir_mode")]
    pub dir_mode: u32,

    /// Base of the public URL recorded for uploaded videos.
    /// Defaults to `{server.public_base_url}/media/videos`.
    #[serde(default)]
    pub public_url_base: Option<String>,
}

impl FilesystemStorageConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.path.is_empty() {
            return Err("Filesystem storage path cannot be empty".to_string());
        }
        Ok(())
    }

    /// Full path for a stored video.
    pub fn file_path(&self, key: &str) -> std::path::PathBuf {
        std::path::PathBuf::from(&self.path).join(key)
    }
}

impl Default for FilesystemStorageConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            create_dir: true,
            file_mode: default_file_mode(),
            dir_mode: default_dir_mode(),
            public_url_base: None,
        }
    }
}

fn default_path() -> String {
    "./data/videos".to_string()
}

fn default_true() -> bool {
    true
}

fn default_file_mode() -> u32 {
    0o644
}

fn default_dir_mode() -> u32 {
    0o755
}
