//! Vimeo API client.
//!
//! OAuth 1.0 (HMAC-SHA1) signed calls against the REST endpoint, an
//! optional file cache for decoded responses, and single-shot or chunked
//! video upload.
//!
//! Blocking I/O only. No retries: a failed call or upload is reported and
//! left to the caller to start again.

pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod encode;
pub mod envelope;
pub mod error;
pub mod params;
pub mod signer;
pub mod upload;

pub use auth::{
    default_token_path, Credentials, FileTokenStore, MemoryTokenStore, Permission, Token, TokenKind,
    TokenStore,
};
pub use cache::{CacheBackend, CacheStore, FileCache, Fingerprint};
pub use client::{normalize_method, HttpMethod, Reply, RequestOptions, VimeoClient};
pub use config::{default_config_path, CacheConfig, ClientConfig, Endpoints};
pub use envelope::Envelope;
pub use error::{ApiError, IntegrityStage};
pub use params::{ApiParams, OAuthParams, SignedParams};
pub use upload::{Upload, UploadTicket, Uploader, DEFAULT_CHUNK_SIZE};
