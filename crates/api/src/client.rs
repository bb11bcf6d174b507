//! Signed REST client.
//!
//! Blocking reqwest client (no Tokio runtime required).
//! Every call: build OAuth + API params → sign → cache lookup → send →
//! decode envelope → cache store.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::multipart::Form;
use serde_json::Value;

use crate::auth::{Credentials, Permission, Token, TokenKind, TokenStore};
use crate::cache::{CacheBackend, CacheStore, FileCache};
use crate::config::{ClientConfig, Endpoints, DEFAULT_TIMEOUT_SECS};
use crate::envelope::Envelope;
use crate::error::ApiError;
use crate::params::{ApiParams, OAuthParams, SignedParams};
use crate::signer;
use crate::upload::{Upload, Uploader};

/// Response body format requested from the API.
pub const RESPONSE_FORMAT: &str = "json";

const METHOD_PREFIX: &str = "vimeo.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// Per-call transport options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    pub http_method: HttpMethod,
    /// Target URL. The REST endpoint when unset.
    pub url: Option<String>,
    /// Consult and fill the response cache.
    pub cache: bool,
    /// Send OAuth fields in an `Authorization` header instead of the query/body.
    pub auth_header: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            http_method: HttpMethod::Get,
            url: None,
            cache: true,
            auth_header: true,
        }
    }
}

impl RequestOptions {
    pub fn post() -> Self {
        Self { http_method: HttpMethod::Post, ..Self::default() }
    }

    pub fn uncached(mut self) -> Self {
        self.cache = false;
        self
    }

    pub fn at(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn params_in_request(mut self) -> Self {
        self.auth_header = false;
        self
    }
}

/// What a request produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Decoded payload of a successful API method call.
    Api(Value),
    /// Undecoded body of a call made without a method name.
    Raw(String),
}

impl Reply {
    pub fn into_value(self) -> Result<Value, ApiError> {
        match self {
            Self::Api(value) => Ok(value),
            Self::Raw(body) => serde_json::from_str(&body)
                .map_err(|e| ApiError::MalformedResponse(format!("invalid JSON: {e}"))),
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Api(value) => value.to_string(),
            Self::Raw(body) => body,
        }
    }
}

/// `videos.getInfo` → `vimeo.videos.getInfo`.
pub fn normalize_method(name: &str) -> String {
    if name.starts_with(METHOD_PREFIX) {
        name.to_string()
    } else {
        format!("{METHOD_PREFIX}{name}")
    }
}

/// Vimeo API client (blocking).
#[derive(Clone)]
pub struct VimeoClient {
    http: reqwest::blocking::Client,
    /// File and manifest POSTs. Only connecting is bounded by `timeout`
    /// unless an upload timeout is set.
    upload_http: reqwest::blocking::Client,
    timeout: Duration,
    upload_timeout: Option<Duration>,
    credentials: Credentials,
    endpoints: Endpoints,
    cache: Option<Arc<dyn CacheStore>>,
    chunk_dir: Option<PathBuf>,
}

impl std::fmt::Debug for VimeoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VimeoClient")
            .field("credentials", &self.credentials)
            .field("endpoints", &self.endpoints)
            .field("cache", &self.cache.is_some())
            .field("chunk_dir", &self.chunk_dir)
            .finish()
    }
}

impl VimeoClient {
    /// Client against the public endpoints with the default timeout and no cache.
    pub fn new(credentials: Credentials) -> Self {
        let timeout = Duration::from_secs(DEFAULT_TIMEOUT_SECS);
        Self {
            http: build_http(timeout, Some(timeout)),
            upload_http: build_http(timeout, None),
            timeout,
            upload_timeout: None,
            credentials,
            endpoints: Endpoints::default(),
            cache: None,
            chunk_dir: None,
        }
    }

    /// Client built from a loaded config, cache included.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        let mut client = Self::new(config.credentials()?)
            .with_endpoints(config.endpoints.clone())
            .with_timeout(config.timeout())
            .with_upload_timeout(config.upload_timeout());
        client.chunk_dir = config.chunk_dir.clone();

        if config.cache.backend != CacheBackend::None {
            let root = config.cache.root_or_default().ok_or_else(|| {
                ApiError::Config("cache enabled but no cache root could be determined".into())
            })?;
            client.enable_cache(config.cache.backend, &root, config.cache.expiry())?;
        }
        Ok(client)
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.http = build_http(timeout, Some(timeout));
        self.upload_http = build_http(timeout, self.upload_timeout);
        self
    }

    /// Overall limit for upload POSTs. `None` bounds only the connect phase,
    /// so large files are not cut off by the call timeout.
    pub fn with_upload_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.upload_timeout = timeout;
        self.upload_http = build_http(self.timeout, timeout);
        self
    }

    /// Parent directory for chunk scratch directories.
    pub fn with_chunk_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.chunk_dir = Some(dir.into());
        self
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn chunk_dir(&self) -> Option<&Path> {
        self.chunk_dir.as_deref()
    }

    // ── Tokens ──────────────────────────────────────────────────────

    pub fn token(&self) -> Option<&Token> {
        self.credentials.token.as_ref()
    }

    /// Use `token` for subsequent calls, optionally persisting it.
    pub fn set_token(
        &mut self,
        token: Token,
        kind: TokenKind,
        store: Option<&dyn TokenStore>,
    ) -> Result<(), ApiError> {
        if let Some(store) = store {
            store.save(kind, &token)?;
        }
        self.credentials.token = Some(token);
        Ok(())
    }

    /// Fetch a request token. `callback` is `"oob"` for out-of-band verification.
    pub fn request_token(&self, callback: &str) -> Result<Token, ApiError> {
        let url = self.endpoints.request_token_url.clone();
        let oauth = OAuthParams::fresh(&self.credentials.consumer_key, None).with_callback(callback);
        let opts = RequestOptions::default().at(url).uncached().params_in_request();
        let reply = self.execute(oauth, None, ApiParams::new(), &opts)?;
        Token::from_form(&reply.into_text())
    }

    /// Page the user visits to grant `permission` to a request token.
    pub fn authorize_url(&self, token: &Token, permission: Permission) -> Result<String, ApiError> {
        let url = url::Url::parse_with_params(
            &self.endpoints.authorize_url,
            &[("oauth_token", token.key.as_str()), ("permission", permission.as_str())],
        )
        .map_err(|e| ApiError::Config(format!("invalid authorize URL: {e}")))?;
        Ok(url.to_string())
    }

    /// Exchange the current request token and `verifier` for an access token.
    pub fn access_token(&self, verifier: &str) -> Result<Token, ApiError> {
        let url = self.endpoints.access_token_url.clone();
        let oauth = self.fresh_oauth().with_verifier(verifier);
        let opts = RequestOptions::default().at(url).uncached();
        let reply = self.execute(oauth, None, ApiParams::new(), &opts)?;
        Token::from_form(&reply.into_text())
    }

    // ── Cache ───────────────────────────────────────────────────────

    /// Configure the response cache and drop expired entries.
    pub fn enable_cache(
        &mut self,
        backend: CacheBackend,
        root: &Path,
        expiry: Duration,
    ) -> Result<(), ApiError> {
        match backend {
            CacheBackend::None => {
                self.disable_cache();
                Ok(())
            }
            CacheBackend::File => {
                let cache = FileCache::open(root, expiry)?;
                match cache.sweep() {
                    Ok(0) => {}
                    Ok(n) => log::debug!("removed {n} expired cache entries from {}", root.display()),
                    Err(e) => log::warn!("cache sweep failed: {e}"),
                }
                self.cache = Some(Arc::new(cache));
                Ok(())
            }
        }
    }

    /// Use a custom store.
    pub fn set_cache(&mut self, store: Arc<dyn CacheStore>) {
        self.cache = Some(store);
    }

    pub fn disable_cache(&mut self) {
        self.cache = None;
    }

    pub fn cache(&self) -> Option<&Arc<dyn CacheStore>> {
        self.cache.as_ref()
    }

    // ── Calls ───────────────────────────────────────────────────────

    /// Call an API method and return its decoded payload.
    pub fn call(&self, method: &str, params: ApiParams, opts: &RequestOptions) -> Result<Value, ApiError> {
        self.request(Some(method), params, opts)?.into_value()
    }

    /// Signed request. With a method name the envelope is decoded and the
    /// payload returned; without one the raw body comes back.
    pub fn request(
        &self,
        method: Option<&str>,
        params: ApiParams,
        opts: &RequestOptions,
    ) -> Result<Reply, ApiError> {
        self.execute(self.fresh_oauth(), method, params, opts)
    }

    fn execute(
        &self,
        oauth: OAuthParams,
        method: Option<&str>,
        params: ApiParams,
        opts: &RequestOptions,
    ) -> Result<Reply, ApiError> {
        let method = method.map(normalize_method);
        let url = opts.url.as_deref().unwrap_or(self.endpoints.rest_url.as_str());

        let mut api = ApiParams::new().with("format", RESPONSE_FORMAT);
        if let Some(ref name) = method {
            api.insert("method", name.as_str());
        }
        api.extend(params);

        let signed = self.sign(oauth, api, opts.http_method, url);

        // only decoded method responses are cacheable
        let cache = match (&self.cache, &method) {
            (Some(cache), Some(_)) if opts.cache => Some(cache),
            _ => None,
        };
        let fingerprint = cache.map(|_| signed.fingerprint());
        if let (Some(cache), Some(fp)) = (cache, &fingerprint) {
            if let Some(value) = cache.get(fp) {
                log::debug!("cache hit {fp} for {}", method.as_deref().unwrap_or(url));
                return Ok(Reply::Api(value));
            }
            log::debug!("cache miss {fp}");
        }

        log::debug!(
            "{} {} method={}",
            opts.http_method.as_str(),
            url,
            method.as_deref().unwrap_or("-")
        );
        let (status, body) = self.send(&signed, opts.http_method, url, opts.auth_header)?;

        let Some(method) = method else {
            if !response_ok(status) {
                return Err(ApiError::Http(status, body));
            }
            return Ok(Reply::Raw(body));
        };

        let value = decode_reply(status, &body)?;
        if let (Some(cache), Some(fp)) = (cache, &fingerprint) {
            if let Err(e) = cache.put(fp, &value) {
                log::warn!("not caching {method}: {e}");
            }
        }
        Ok(Reply::Api(value))
    }

    /// Fresh OAuth set for the current consumer and token.
    pub(crate) fn fresh_oauth(&self) -> OAuthParams {
        OAuthParams::fresh(&self.credentials.consumer_key, self.credentials.token_key())
    }

    /// Sign `oauth` + `api` for `method url` and attach the signature.
    pub(crate) fn sign(
        &self,
        mut oauth: OAuthParams,
        api: ApiParams,
        method: HttpMethod,
        url: &str,
    ) -> SignedParams {
        oauth.signature = None;
        let unsigned = SignedParams { oauth, api };
        let signature = signer::sign(
            &unsigned.merged(),
            method.as_str(),
            url,
            &self.credentials.consumer_secret,
            self.credentials.token_secret(),
        );
        let mut signed = unsigned;
        signed.oauth.signature = Some(signature);
        signed
    }

    fn send(
        &self,
        signed: &SignedParams,
        method: HttpMethod,
        url: &str,
        auth_header: bool,
    ) -> Result<(u16, String), ApiError> {
        let params = if auth_header { signed.api_pairs() } else { signed.merged() };

        let mut req = match method {
            HttpMethod::Get => self.http.get(url).query(&params),
            HttpMethod::Post => self.http.post(url).form(&params),
        };
        if auth_header {
            req = req.header(reqwest::header::AUTHORIZATION, signed.authorization_header());
        }

        let response = req.send().map_err(ApiError::transport)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(ApiError::transport)?;
        Ok((status, body))
    }

    /// POST to `url` with `query` in the URL and an optional multipart body.
    /// Returns status and body; the caller decides what counts as success.
    pub(crate) fn post_upload(
        &self,
        url: &str,
        query: &[(String, String)],
        form: Option<Form>,
    ) -> Result<(u16, String), ApiError> {
        let mut req = self.upload_http.post(url);
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(form) = form {
            req = req.multipart(form);
        }

        let response = req.send().map_err(ApiError::transport)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(ApiError::transport)?;
        Ok((status, body))
    }

    // ── Upload ──────────────────────────────────────────────────────

    /// Upload a video in one request.
    pub fn upload(&self, path: &Path) -> Result<Upload, ApiError> {
        Uploader::new(self).upload(path)
    }

    /// Upload a video in `chunk_size` pieces.
    pub fn upload_multi(&self, path: &Path, chunk_size: u64) -> Result<Upload, ApiError> {
        Uploader::new(self).with_chunk_size(chunk_size).upload_multi(path)
    }
}

/// Decode an API method response. A non-2xx status whose body is not an
/// envelope becomes [`ApiError::Http`].
pub(crate) fn decode_reply(status: u16, body: &str) -> Result<Value, ApiError> {
    match Envelope::decode(body) {
        Ok(envelope) => envelope.into_result(),
        Err(_) if !response_ok(status) => Err(ApiError::Http(status, body.to_string())),
        Err(e) => Err(e),
    }
}

pub(crate) fn response_ok(status: u16) -> bool {
    (200..300).contains(&status)
}

fn build_http(connect: Duration, total: Option<Duration>) -> reqwest::blocking::Client {
    reqwest::blocking::Client::builder()
        .user_agent(format!("vimeo-api/{}", env!("CARGO_PKG_VERSION")))
        .connect_timeout(connect)
        .timeout(total)
        .build()
        .unwrap_or_else(|e| {
            log::warn!("falling back to default HTTP client: {e}");
            reqwest::blocking::Client::new()
        })
}
