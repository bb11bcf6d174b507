//! Client configuration.
//!
//! Loaded from `~/.config/vimeo/config.toml`, then overridden by the
//! `VIMEO_*` environment variables.
//!
//! ```toml
//! consumer_key = "..."
//! consumer_secret = "..."
//! timeout_secs = 30
//! upload_timeout_secs = 3600
//!
//! [cache]
//! backend = "file"
//! root = "/tmp/vimeo-cache"
//! expiry_secs = 600
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::auth::{Credentials, Token};
use crate::cache::CacheBackend;
use crate::error::ApiError;

pub const API_REST_URL: &str = "http://vimeo.com/api/rest/v2";
pub const API_AUTH_URL: &str = "http://vimeo.com/oauth/authorize";
pub const API_ACCESS_TOKEN_URL: &str = "http://vimeo.com/oauth/access_token";
pub const API_REQUEST_TOKEN_URL: &str = "http://vimeo.com/oauth/request_token";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CACHE_EXPIRY_SECS: u64 = 600;

/// Remote URLs. Overridable so a local mock can stand in for the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub rest_url: String,
    pub authorize_url: String,
    pub access_token_url: String,
    pub request_token_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            rest_url: API_REST_URL.to_string(),
            authorize_url: API_AUTH_URL.to_string(),
            access_token_url: API_ACCESS_TOKEN_URL.to_string(),
            request_token_url: API_REQUEST_TOKEN_URL.to_string(),
        }
    }
}

impl Endpoints {
    /// All endpoints rooted at `base` (e.g. a mock server URL).
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            rest_url: format!("{base}/api/rest/v2"),
            authorize_url: format!("{base}/oauth/authorize"),
            access_token_url: format!("{base}/oauth/access_token"),
            request_token_url: format!("{base}/oauth/request_token"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub root: Option<PathBuf>,
    pub expiry_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::None,
            root: None,
            expiry_secs: DEFAULT_CACHE_EXPIRY_SECS,
        }
    }
}

impl CacheConfig {
    pub fn expiry(&self) -> Duration {
        Duration::from_secs(self.expiry_secs)
    }

    /// Configured root, or `<cache dir>/vimeo/rest`.
    pub fn root_or_default(&self) -> Option<PathBuf> {
        self.root
            .clone()
            .or_else(|| dirs::cache_dir().map(|d| d.join("vimeo/rest")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub token: Option<String>,
    pub token_secret: Option<String>,
    #[serde(flatten)]
    pub endpoints: Endpoints,
    pub timeout_secs: u64,
    /// Overall limit for file uploads. Unset means only connecting is
    /// bounded, by `timeout_secs`.
    pub upload_timeout_secs: Option<u64>,
    pub cache: CacheConfig,
    /// Parent directory for chunk scratch directories. System temp if unset.
    pub chunk_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            consumer_key: String::new(),
            consumer_secret: String::new(),
            token: None,
            token_secret: None,
            endpoints: Endpoints::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            upload_timeout_secs: None,
            cache: CacheConfig::default(),
            chunk_dir: None,
        }
    }
}

impl ClientConfig {
    pub fn new(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            ..Self::default()
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self, ApiError> {
        toml::from_str(contents).map_err(|e| ApiError::Config(format!("invalid config: {}", e)))
    }

    /// Read a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ApiError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ApiError::Config(format!("{}: {}", path.display(), e))),
        }
    }

    /// Load from the default path and apply environment overrides.
    pub fn load_default() -> Result<Self, ApiError> {
        let mut config = match default_config_path() {
            Some(path) => Self::load(&path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Override fields from `VIMEO_*` variables that are set and non-empty.
    pub fn apply_env(&mut self) {
        self.apply_vars(|name| std::env::var(name).ok());
    }

    fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());
        if let Some(v) = var("VIMEO_CONSUMER_KEY") {
            self.consumer_key = v;
        }
        if let Some(v) = var("VIMEO_CONSUMER_SECRET") {
            self.consumer_secret = v;
        }
        if let Some(v) = var("VIMEO_TOKEN") {
            self.token = Some(v);
        }
        if let Some(v) = var("VIMEO_TOKEN_SECRET") {
            self.token_secret = Some(v);
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn upload_timeout(&self) -> Option<Duration> {
        self.upload_timeout_secs.map(Duration::from_secs)
    }

    pub fn credentials(&self) -> Result<Credentials, ApiError> {
        if self.consumer_key.is_empty() || self.consumer_secret.is_empty() {
            return Err(ApiError::Config(
                "consumer_key and consumer_secret are required".into(),
            ));
        }
        let mut creds = Credentials::new(&self.consumer_key, &self.consumer_secret);
        if let (Some(token), Some(secret)) = (&self.token, &self.token_secret) {
            creds = creds.with_token(Token::new(token, secret));
        }
        Ok(creds)
    }
}

/// `~/.config/vimeo/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|c| c.join("vimeo/config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.cache.backend, CacheBackend::None);
        assert_eq!(config.cache.expiry(), Duration::from_secs(600));
        assert_eq!(config.endpoints.rest_url, API_REST_URL);
        assert_eq!(config.upload_timeout(), None);
    }

    #[test]
    fn test_default_cache_root_is_its_own_directory() {
        if let Some(root) = CacheConfig::default().root_or_default() {
            assert!(root.ends_with("vimeo/rest"), "{}", root.display());
        }
    }

    #[test]
    fn test_from_toml() {
        let config = ClientConfig::from_toml(
            r#"
            consumer_key = "ck"
            consumer_secret = "cs"
            token = "t"
            token_secret = "ts"
            rest_url = "http://localhost:9000/api/rest/v2"
            timeout_secs = 5
            upload_timeout_secs = 600

            [cache]
            backend = "file"
            root = "/tmp/vimeo-test"
            expiry_secs = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.consumer_key, "ck");
        assert_eq!(config.endpoints.rest_url, "http://localhost:9000/api/rest/v2");
        assert_eq!(config.endpoints.authorize_url, API_AUTH_URL);
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.upload_timeout(), Some(Duration::from_secs(600)));
        assert_eq!(config.cache.backend, CacheBackend::File);
        assert_eq!(config.cache.root, Some(PathBuf::from("/tmp/vimeo-test")));
        assert_eq!(config.cache.expiry_secs, 60);

        let creds = config.credentials().unwrap();
        assert_eq!(creds.token_key(), Some("t"));
        assert_eq!(creds.token_secret(), Some("ts"));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            ClientConfig::from_toml("timeout_secs = \"soon\""),
            Err(ApiError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("VIMEO_CONSUMER_KEY", "env-key"),
            ("VIMEO_TOKEN", "env-token"),
            ("VIMEO_TOKEN_SECRET", ""),
        ]
        .into_iter()
        .collect();

        let mut config = ClientConfig::new("file-key", "file-secret");
        config.apply_vars(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.consumer_key, "env-key");
        assert_eq!(config.consumer_secret, "file-secret");
        assert_eq!(config.token.as_deref(), Some("env-token"));
        assert_eq!(config.token_secret, None);
        // token without a secret is not a usable token
        assert!(config.credentials().unwrap().token.is_none());
    }

    #[test]
    fn test_credentials_required() {
        assert!(matches!(
            ClientConfig::default().credentials(),
            Err(ApiError::Config(_))
        ));
    }

    #[test]
    fn test_endpoints_with_base() {
        let endpoints = Endpoints::with_base("http://127.0.0.1:4000/");
        assert_eq!(endpoints.rest_url, "http://127.0.0.1:4000/api/rest/v2");
        assert_eq!(endpoints.request_token_url, "http://127.0.0.1:4000/oauth/request_token");
    }
}
