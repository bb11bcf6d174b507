//! Credentials and token persistence.
//!
//! The consumer key/secret identify the application; the token pair
//! identifies the user. Persisting tokens is the job of an injected
//! [`TokenStore`]. [`FileTokenStore`] keeps them in
//! `~/.config/vimeo/tokens.json` (0600 on Unix).

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// An OAuth token and its secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub key: String,
    pub secret: String,
}

impl Token {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self { key: key.into(), secret: secret.into() }
    }

    /// Parse an `oauth_token=...&oauth_token_secret=...` response body.
    pub fn from_form(body: &str) -> Result<Self, ApiError> {
        let mut key = None;
        let mut secret = None;
        for (k, v) in url::form_urlencoded::parse(body.trim().as_bytes()) {
            match k.as_ref() {
                "oauth_token" => key = Some(v.into_owned()),
                "oauth_token_secret" => secret = Some(v.into_owned()),
                _ => {}
            }
        }
        match (key, secret) {
            (Some(key), Some(secret)) => Ok(Self { key, secret }),
            _ => Err(ApiError::MalformedResponse(format!(
                "token response without oauth_token/oauth_token_secret: {}",
                body.trim()
            ))),
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Whether a token is a temporary request token or a long-lived access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Request,
    Access,
}

/// Access level asked for on the authorization page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Permission {
    #[default]
    Read,
    Write,
    Delete,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Delete => "delete",
        }
    }
}

impl std::str::FromStr for Permission {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "delete" => Ok(Self::Delete),
            other => Err(ApiError::Config(format!("unknown permission '{other}'"))),
        }
    }
}

/// Consumer credentials plus the current user token, if any.
#[derive(Clone)]
pub struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub token: Option<Token>,
}

impl Credentials {
    pub fn new(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: Token) -> Self {
        self.token = Some(token);
        self
    }

    pub fn token_key(&self) -> Option<&str> {
        self.token.as_ref().map(|t| t.key.as_str())
    }

    pub fn token_secret(&self) -> Option<&str> {
        self.token.as_ref().map(|t| t.secret.as_str())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<redacted>")
            .field("token", &self.token)
            .finish()
    }
}

// ── Token persistence ───────────────────────────────────────────────

/// Somewhere to keep tokens between runs.
pub trait TokenStore {
    fn load(&self, kind: TokenKind) -> Option<Token>;
    fn save(&self, kind: TokenKind, token: &Token) -> Result<(), ApiError>;
    fn delete(&self, kind: TokenKind) -> Result<(), ApiError>;
}

/// In-process store, mainly for tests and short-lived tools.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<HashMap<TokenKind, Token>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self, kind: TokenKind) -> Option<Token> {
        self.tokens.lock().ok()?.get(&kind).cloned()
    }

    fn save(&self, kind: TokenKind, token: &Token) -> Result<(), ApiError> {
        self.tokens
            .lock()
            .map_err(|_| ApiError::Io("token store lock poisoned".into()))?
            .insert(kind, token.clone());
        Ok(())
    }

    fn delete(&self, kind: TokenKind) -> Result<(), ApiError> {
        self.tokens
            .lock()
            .map_err(|_| ApiError::Io("token store lock poisoned".into()))?
            .remove(&kind);
        Ok(())
    }
}

/// JSON file holding one token per kind.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default location, if a config directory exists.
    pub fn at_default_path() -> Option<Self> {
        default_token_path().map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> HashMap<TokenKind, Token> {
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    fn write_all(&self, tokens: &HashMap<TokenKind, Token>) -> Result<(), ApiError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ApiError::Io(format!("Failed to create config directory: {}", e)))?;
        }

        let contents = serde_json::to_string_pretty(tokens)
            .map_err(|e| ApiError::Io(format!("Failed to serialize tokens: {}", e)))?;

        std::fs::write(&self.path, &contents)
            .map_err(|e| ApiError::Io(format!("Failed to write token file: {}", e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.path, permissions)
                .map_err(|e| ApiError::Io(format!("Failed to set file permissions: {}", e)))?;
        }

        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self, kind: TokenKind) -> Option<Token> {
        self.read_all().remove(&kind)
    }

    fn save(&self, kind: TokenKind, token: &Token) -> Result<(), ApiError> {
        let mut tokens = self.read_all();
        tokens.insert(kind, token.clone());
        self.write_all(&tokens)
    }

    fn delete(&self, kind: TokenKind) -> Result<(), ApiError> {
        let mut tokens = self.read_all();
        if tokens.remove(&kind).is_none() {
            return Ok(());
        }
        if tokens.is_empty() {
            std::fs::remove_file(&self.path)
                .map_err(|e| ApiError::Io(format!("Failed to delete token file: {}", e)))
        } else {
            self.write_all(&tokens)
        }
    }
}

/// `~/.config/vimeo/tokens.json`
pub fn default_token_path() -> Option<PathBuf> {
    dirs::config_dir().map(|c| c.join("vimeo/tokens.json"))
}
