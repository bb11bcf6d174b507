//! oEmbed client.
//!
//! Unsigned `GET <base>.json?url=...&maxwidth=...`, decoded as JSON and
//! cached on disk for a week. Shares the fingerprint and file cache of
//! `vimeo-api`; there are no OAuth fields here, so nothing is stripped
//! before hashing.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use vimeo_api::cache::{is_writable_dir, CacheStore, FileCache, Fingerprint};
use vimeo_api::{ApiError, ApiParams};

pub const OEMBED_URL: &str = "http://vimeo.com/api/oembed";
pub const DEFAULT_EXPIRY_SECS: u64 = 7 * 24 * 60 * 60;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const RESPONSE_FORMAT: &str = "json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedConfig {
    pub base_url: String,
    /// Cache directory. `<cache dir>/vimeo/oembed` when unset.
    pub root: Option<PathBuf>,
    pub expiry_secs: u64,
    pub enabled: bool,
    pub timeout_secs: u64,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            base_url: OEMBED_URL.to_string(),
            root: None,
            expiry_secs: DEFAULT_EXPIRY_SECS,
            enabled: true,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl EmbedConfig {
    pub fn root_or_default(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("vimeo/oembed")
        })
    }
}

/// The fields every oEmbed video response carries. Anything else lands in
/// `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OEmbed {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
    pub html: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

pub struct EmbedClient {
    http: reqwest::blocking::Client,
    base_url: String,
    root: PathBuf,
    expiry: Duration,
    cache: Option<FileCache>,
    enabled: bool,
}

impl EmbedClient {
    /// Build a client. A cache root that is not writable is cleared and
    /// recreated; if that fails too, caching stays off.
    pub fn new(config: &EmbedConfig) -> Self {
        let root = config.root_or_default();
        let expiry = Duration::from_secs(config.expiry_secs);
        let cache = open_cache(&root, expiry);

        Self {
            http: reqwest::blocking::Client::builder()
                .user_agent(format!("vimeo-embed/{}", env!("CARGO_PKG_VERSION")))
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_else(|e| {
                    log::warn!("falling back to default HTTP client: {e}");
                    reqwest::blocking::Client::new()
                }),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            root,
            expiry,
            enabled: config.enabled && cache.is_some(),
            cache,
        }
    }

    pub fn is_cache_enabled(&self) -> bool {
        self.enabled
    }

    pub fn cache_root(&self) -> &Path {
        &self.root
    }

    pub fn enable_cache(&mut self) {
        if self.cache.is_none() {
            self.cache = open_cache(&self.root, self.expiry);
        }
        self.enabled = self.cache.is_some();
    }

    pub fn disable_cache(&mut self) {
        self.enabled = false;
    }

    /// Remove every cached response.
    pub fn clear_cache(&mut self) -> Result<(), ApiError> {
        FileCache::clear_dir(&self.root)?;
        if self.cache.is_none() {
            self.cache = open_cache(&self.root, self.expiry);
        }
        Ok(())
    }

    /// Full request URL for a parameter set. `format` is implied by the path.
    pub fn request_url(&self, params: &ApiParams) -> Result<String, ApiError> {
        let endpoint = format!("{}.{}", self.base_url, RESPONSE_FORMAT);
        let pairs: Vec<(&str, &str)> = params.iter().filter(|(k, _)| *k != "format").collect();
        reqwest::Url::parse_with_params(&endpoint, &pairs)
            .map(|u| u.to_string())
            .map_err(|e| ApiError::Config(format!("invalid oEmbed URL {endpoint}: {e}")))
    }

    /// oEmbed data for `video_url`, with optional styling params
    /// (`maxwidth`, `autoplay`, `byline`, ...).
    pub fn call(&self, video_url: &str, params: ApiParams) -> Result<Value, ApiError> {
        let params = params.with("url", video_url);
        let fingerprint = Fingerprint::of(params.iter());

        let cache = self.cache.as_ref().filter(|_| self.enabled);
        if let Some(cache) = cache {
            if let Some(value) = cache.get(&fingerprint) {
                log::debug!("oembed cache hit {fingerprint} for {video_url}");
                return Ok(value);
            }
        }

        let url = self.request_url(&params)?;
        log::debug!("GET {url}");
        let response = self.http.get(&url).send().map_err(ApiError::transport)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(ApiError::transport)?;
        if !(200..300).contains(&status) {
            return Err(ApiError::Http(status, body));
        }

        let value: Value = serde_json::from_str(body.trim())
            .map_err(|e| ApiError::MalformedResponse(format!("invalid oEmbed JSON: {e}")))?;

        if let Some(cache) = cache {
            if let Err(e) = cache.put(&fingerprint, &value) {
                log::warn!("not caching oEmbed response: {e}");
            }
        }
        Ok(value)
    }

    /// Typed view of [`call`](Self::call).
    pub fn embed(&self, video_url: &str, params: ApiParams) -> Result<OEmbed, ApiError> {
        let value = self.call(video_url, params)?;
        serde_json::from_value(value)
            .map_err(|e| ApiError::MalformedResponse(format!("unexpected oEmbed shape: {e}")))
    }
}

fn open_cache(root: &Path, expiry: Duration) -> Option<FileCache> {
    if !is_writable_dir(root) {
        if let Err(e) = FileCache::clear_dir(root) {
            log::warn!("oEmbed cache disabled: {e}");
            return None;
        }
    }
    match FileCache::open(root, expiry) {
        Ok(cache) if cache.is_writable() => Some(cache),
        Ok(_) => {
            log::warn!("oEmbed cache disabled: {} is not writable", root.display());
            None
        }
        Err(e) => {
            log::warn!("oEmbed cache disabled: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn config(server: &MockServer, root: &Path) -> EmbedConfig {
        EmbedConfig {
            base_url: server.url("/api/oembed"),
            root: Some(root.to_path_buf()),
            ..EmbedConfig::default()
        }
    }

    fn oembed_body() -> Value {
        json!({
            "type": "video",
            "version": "1.0",
            "provider_name": "Vimeo",
            "title": "Sample",
            "width": 640,
            "height": 360,
            "html": "<iframe src=\"https://player.vimeo.com/video/20800127\"></iframe>",
            "video_id": 20800127
        })
    }

    #[test]
    fn test_request_url_drops_format() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start();
        let client = EmbedClient::new(&config(&server, dir.path()));

        let params = ApiParams::new()
            .with("url", "https://vimeo.com/20800127")
            .with("format", "xml")
            .with("maxwidth", "400");
        let url = client.request_url(&params).unwrap();

        assert!(url.starts_with(&format!("{}.json?", server.url("/api/oembed"))));
        assert!(url.contains("maxwidth=400"));
        assert!(url.contains("url=https%3A%2F%2Fvimeo.com%2F20800127"));
        assert!(!url.contains("format="));
    }

    #[test]
    fn test_call_fetches_then_serves_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/oembed.json")
                .query_param("url", "https://vimeo.com/20800127")
                .query_param("byline", "false");
            then.status(200).json_body(oembed_body());
        });

        let client = EmbedClient::new(&config(&server, dir.path()));
        let params = ApiParams::new().with("byline", "false");

        let first = client.call("https://vimeo.com/20800127", params.clone()).unwrap();
        let second = client.call("https://vimeo.com/20800127", params).unwrap();

        assert_eq!(first, second);
        mock.assert_calls(1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_disabled_cache_always_fetches() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/oembed.json");
            then.status(200).json_body(oembed_body());
        });

        let mut client = EmbedClient::new(&config(&server, dir.path()));
        client.disable_cache();
        client.call("https://vimeo.com/1", ApiParams::new()).unwrap();
        client.call("https://vimeo.com/1", ApiParams::new()).unwrap();
        mock.assert_calls(2);

        client.enable_cache();
        assert!(client.is_cache_enabled());
        client.call("https://vimeo.com/1", ApiParams::new()).unwrap();
        client.call("https://vimeo.com/1", ApiParams::new()).unwrap();
        mock.assert_calls(3);
    }

    #[test]
    fn test_typed_embed() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/oembed.json");
            then.status(200).json_body(oembed_body());
        });

        let client = EmbedClient::new(&config(&server, dir.path()));
        let embed = client.embed("https://vimeo.com/20800127", ApiParams::new()).unwrap();
        assert_eq!(embed.kind, "video");
        assert!(embed.html.starts_with("<iframe"));
        assert_eq!(embed.width, Some(640));
        assert_eq!(embed.extra["provider_name"], "Vimeo");
    }

    #[test]
    fn test_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/oembed.json");
            then.status(404).body("404 Not Found");
        });

        let client = EmbedClient::new(&config(&server, dir.path()));
        let err = client.call("https://vimeo.com/0", ApiParams::new()).unwrap_err();
        assert!(matches!(err, ApiError::Http(404, _)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_root_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("does/not/exist");
        let server = MockServer::start();

        let client = EmbedClient::new(&config(&server, &root));
        assert!(client.is_cache_enabled());
        assert!(root.is_dir());
    }

    #[test]
    fn test_root_that_is_a_file_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("cache");
        std::fs::write(&root, "not a directory").unwrap();
        let server = MockServer::start();

        let client = EmbedClient::new(&config(&server, &root));
        assert!(client.is_cache_enabled());
        assert!(root.is_dir());
    }

    #[test]
    fn test_clear_cache() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/oembed.json");
            then.status(200).json_body(oembed_body());
        });

        let mut client = EmbedClient::new(&config(&server, dir.path()));
        client.call("https://vimeo.com/1", ApiParams::new()).unwrap();
        client.call("https://vimeo.com/2", ApiParams::new()).unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);

        client.clear_cache().unwrap();
        assert!(dir.path().is_dir());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_default_config() {
        let config = EmbedConfig::default();
        assert_eq!(config.expiry_secs, 604_800);
        assert!(config.enabled);
        assert_eq!(config.base_url, OEMBED_URL);
    }

    #[test]
    fn test_default_root_is_outside_rest_cache() {
        let embed_root = EmbedConfig::default().root_or_default();
        if let Some(rest_root) = vimeo_api::CacheConfig::default().root_or_default() {
            assert!(!embed_root.starts_with(&rest_root), "{}", embed_root.display());
            assert!(!rest_root.starts_with(&embed_root), "{}", rest_root.display());
        }
    }
}
