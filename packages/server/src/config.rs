use common::storage::S3Settings;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    #[serde(default)]
    pub allow_origins: Vec<String>,
    #[serde(default = "default_cors_max_age")]
    pub max_age: u64,
}

fn default_cors_max_age() -> u64 {
    3600
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origins: Vec::new(),
            max_age: default_cors_max_age(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Identity-service and session settings.
///
/// `jwt_secret` verifies the session tokens issued by the identity service
/// and never leaves the server. `identity_url` and `identity_public_key` are
/// safe to hand to browsers.
#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "default_jwt_audience")]
    pub jwt_audience: String,
    pub identity_url: String,
    pub identity_public_key: String,
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,
    /// Mark the session cookie `Secure`. Turn off only for plain-HTTP development.
    #[serde(default = "default_cookie_secure")]
    pub cookie_secure: bool,
}

fn default_jwt_audience() -> String {
    "authenticated".into()
}
fn default_session_cookie() -> String {
    "access_token".into()
}
fn default_cookie_secure() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Storage provider domain, e.g. `s3.bitiful.net`. Public object URLs are
    /// `https://{bucket}.{domain}/{key}`.
    pub domain: String,
    /// Signing endpoint. Defaults to `https://{domain}`.
    #[serde(default)]
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    #[serde(default)]
    pub path_style: bool,
    /// Lifetime of a pre-signed upload URL.
    #[serde(default = "default_presign_ttl_secs")]
    pub presign_ttl_secs: u32,
    /// Random symbols appended to generated object keys.
    #[serde(default = "default_key_suffix_len")]
    pub key_suffix_len: usize,
    /// Provider resize parameters appended to preview URLs.
    #[serde(default = "default_thumbnail_query")]
    pub thumbnail_query: String,
}

fn default_presign_ttl_secs() -> u32 {
    300
}
fn default_key_suffix_len() -> usize {
    6
}
fn default_thumbnail_query() -> String {
    "w=50&h=50&mode=clip".into()
}

impl StorageConfig {
    pub fn endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://{}", self.domain))
    }

    pub fn s3_settings(&self) -> S3Settings {
        S3Settings {
            bucket: self.bucket.clone(),
            region: self.region.clone(),
            endpoint: self.endpoint(),
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
            path_style: self.path_style,
        }
    }

    /// Public URL of an object.
    pub fn public_url(&self, key: &str) -> String {
        format!("https://{}.{}/{}", self.bucket, self.domain, key)
    }

    /// Public URL of a resized preview of an object.
    pub fn preview_url(&self, key: &str) -> String {
        let url = self.public_url(key);
        if self.thumbnail_query.is_empty() {
            url
        } else {
            format!("{url}?{}", self.thumbnail_query)
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    /// Largest accepted file size in bytes. Default: 50 MiB.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: i64,
    /// How often the pending-upload sweep runs.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Extra time after URL expiry before a pending upload is reconciled.
    #[serde(default = "default_sweep_grace_secs")]
    pub sweep_grace_secs: u64,
}

fn default_max_file_size() -> i64 {
    50 * 1024 * 1024
}
fn default_sweep_interval_secs() -> u64 {
    60
}
fn default_sweep_grace_secs() -> u64 {
    60
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            sweep_interval_secs: default_sweep_interval_secs(),
            sweep_grace_secs: default_sweep_grace_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

/// `IMGOOD__STORAGE__SECRET_ACCESS_KEY` sets `storage.secret_access_key`.
fn env_overrides() -> Environment {
    Environment::with_prefix("IMGOOD").separator("__")
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("IMGOOD_CONFIG").unwrap_or_else(|_| "config/config".to_string());

        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .add_source(File::with_name(&config_path).required(false))
            .add_source(env_overrides())
            .build()?;

        s.try_deserialize()
    }

    /// How long a pending record may wait for its object before it is settled:
    /// the upload URL lifetime plus the sweep grace period.
    pub fn pending_max_age(&self) -> chrono::Duration {
        let secs = u64::from(self.storage.presign_ttl_secs)
            .saturating_add(self.upload.sweep_grace_secs);
        i64::try_from(secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }
}
