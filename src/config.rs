//! Configuration for the OCR gateway
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `OCR__<SECTION>__<KEY>` environment variables.

use crate::error::Result;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Bucket the service historically wrote PDFs to.
pub const DEFAULT_BUCKET: &str = "possible-point-477719-n3-pdfs";

/// Ceiling on a single batch annotation job.
pub const DEFAULT_BATCH_TIMEOUT_SECS: u64 = 420;

/// Upper bound on `vision.batch_timeout_secs` (one day)
pub const MAX_BATCH_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub vision: VisionConfig,
    #[serde(default)]
    pub gcp: GcpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted request body, in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Local directory uploads are spooled to
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
}

/// Cloud Storage settings
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_bucket")]
    pub bucket: String,

    #[serde(default = "default_storage_endpoint")]
    pub endpoint: String,
}

/// Cloud Vision settings
#[derive(Debug, Clone, Deserialize)]
pub struct VisionConfig {
    #[serde(default = "default_vision_endpoint")]
    pub endpoint: String,

    /// API key sent as `?key=`. Bearer auth is used when unset.
    #[serde(default)]
    pub api_key: Option<SecretString>,

    /// Deadline for a batch annotation job
    #[serde(default = "default_batch_timeout_secs")]
    pub batch_timeout_secs: u64,

    /// Delay between operation status checks
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Pages per output shard
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

/// Credentials and transport settings shared by both Google APIs
#[derive(Debug, Clone, Deserialize)]
pub struct GcpConfig {
    /// Fixed OAuth access token. The metadata server is used when unset.
    #[serde(default)]
    pub access_token: Option<SecretString>,

    #[serde(default = "default_metadata_endpoint")]
    pub metadata_endpoint: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human readable output
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_max_upload_bytes() -> usize { 20 * 1024 * 1024 }
fn default_upload_dir() -> PathBuf { PathBuf::from("uploads") }
fn default_bucket() -> String { DEFAULT_BUCKET.to_string() }
fn default_storage_endpoint() -> String { "https://storage.googleapis.com".to_string() }
fn default_vision_endpoint() -> String { "https://vision.googleapis.com".to_string() }
fn default_batch_timeout_secs() -> u64 { DEFAULT_BATCH_TIMEOUT_SECS }
fn default_poll_interval_ms() -> u64 { 2000 }
fn default_batch_size() -> u32 { 1 }
fn default_metadata_endpoint() -> String { "http://metadata.google.internal".to_string() }
fn default_request_timeout_secs() -> u64 { 120 }
fn default_log_level() -> String { "info".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
            upload_dir: default_upload_dir(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            endpoint: default_storage_endpoint(),
        }
    }
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_vision_endpoint(),
            api_key: None,
            batch_timeout_secs: default_batch_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            metadata_endpoint: default_metadata_endpoint(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Load configuration from an optional file plus `OCR__*` environment variables
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("OCR")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string, without the environment
    pub fn from_toml(contents: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(contents, config::FileFormat::Toml))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.storage.bucket.trim().is_empty() {
            return Err(crate::error::Error::Config("storage.bucket cannot be empty".into()));
        }
        if self.vision.poll_interval_ms == 0 {
            return Err(crate::error::Error::Config("vision.poll_interval_ms must be positive".into()));
        }
        if self.vision.batch_timeout_secs == 0
            || self.vision.batch_timeout_secs > MAX_BATCH_TIMEOUT_SECS
        {
            return Err(crate::error::Error::Config(format!(
                "vision.batch_timeout_secs must be between 1 and {}",
                MAX_BATCH_TIMEOUT_SECS
            )));
        }
        if self.vision.poll_interval_ms > self.vision.batch_timeout_secs * 1000 {
            return Err(crate::error::Error::Config(
                "vision.poll_interval_ms cannot exceed the batch timeout".into(),
            ));
        }
        if self.vision.batch_size == 0 {
            return Err(crate::error::Error::Config("vision.batch_size must be positive".into()));
        }
        Ok(())
    }
}

impl VisionConfig {
    /// Get batch timeout as Duration
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }

    /// Get poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl GcpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
