// Command implementations: upload, call, embed, auth, cache.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use vimeo_api::{
    ApiParams, CacheBackend, ClientConfig, FileCache, FileTokenStore, Permission, RequestOptions,
    Token, TokenKind, TokenStore, Upload, VimeoClient,
};
use vimeo_embed::{EmbedClient, EmbedConfig};

use crate::exit_codes::*;
use crate::{CliError, GlobalArgs};

// ── Setup ───────────────────────────────────────────────────────────

/// Resolve config: file, then `VIMEO_*` env, then flags.
fn load_config(global: &GlobalArgs) -> Result<ClientConfig, CliError> {
    let mut config = match global.config {
        Some(ref path) => ClientConfig::load(path)?,
        None => match vimeo_api::default_config_path() {
            Some(path) => ClientConfig::load(&path)?,
            None => ClientConfig::default(),
        },
    };
    config.apply_env();

    if let Some(ref v) = global.consumer_key {
        config.consumer_key = v.clone();
    }
    if let Some(ref v) = global.consumer_secret {
        config.consumer_secret = v.clone();
    }
    if let Some(ref v) = global.token {
        config.token = Some(v.clone());
    }
    if let Some(ref v) = global.token_secret {
        config.token_secret = Some(v.clone());
    }
    if let Some(ref dir) = global.cache_dir {
        config.cache.backend = CacheBackend::File;
        config.cache.root = Some(dir.join("rest"));
    }
    Ok(config)
}

fn token_store(global: &GlobalArgs) -> Result<FileTokenStore, CliError> {
    global
        .token_file
        .clone()
        .map(FileTokenStore::new)
        .or_else(FileTokenStore::at_default_path)
        .ok_or_else(|| {
            CliError::new(EXIT_CONFIG, "no config directory for the token file")
                .with_hint("pass --token-file or set VIMEO_TOKEN_FILE")
        })
}

/// Client with credentials from config and, failing that, the stored
/// access token.
fn client(global: &GlobalArgs) -> Result<VimeoClient, CliError> {
    let mut config = load_config(global)?;
    if config.token.is_none() {
        if let Some(token) = token_store(global).ok().and_then(|s| s.load(TokenKind::Access)) {
            config.token = Some(token.key);
            config.token_secret = Some(token.secret);
        }
    }
    Ok(VimeoClient::from_config(&config)?)
}

/// `key=value` arguments into API params.
pub fn parse_params(args: &[String]) -> Result<ApiParams, CliError> {
    let mut params = ApiParams::new();
    for arg in args {
        let (key, value) = arg.split_once('=').ok_or_else(|| {
            CliError::args(format!("invalid parameter '{}'", arg))
                .with_hint("parameters are written as key=value")
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(CliError::args(format!("empty parameter name in '{}'", arg)));
        }
        params.insert(key, value);
    }
    Ok(params)
}

fn print_line(line: &str) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", line).map_err(|e| CliError::new(EXIT_IO, e.to_string()))
}

fn print_json(value: &serde_json::Value) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::new(EXIT_ERROR, e.to_string()))?;
    print_line(&text)
}

// ── upload ──────────────────────────────────────────────────────────

pub fn cmd_upload(
    global: &GlobalArgs,
    file: PathBuf,
    chunk_size: Option<u64>,
    title: Option<String>,
    description: Option<String>,
    json: bool,
) -> Result<(), CliError> {
    let client = client(global)?;

    let outcome = match chunk_size {
        Some(size) => client.upload_multi(&file, size)?,
        None => client.upload(&file)?,
    };
    let video_id = match outcome {
        Upload::Confirmed(id) => id,
        Upload::FileNotFound(path) => {
            return Err(CliError::new(
                EXIT_UPLOAD_NOT_FOUND,
                format!("file not found: {}", path.display()),
            ));
        }
    };

    set_metadata(&client, &video_id, "videos.setTitle", "title", title.as_deref())?;
    set_metadata(&client, &video_id, "videos.setDescription", "description", description.as_deref())?;

    if json {
        print_json(&serde_json::json!({ "video_id": video_id }))
    } else {
        print_line(&video_id)
    }
}

fn set_metadata(
    client: &VimeoClient,
    video_id: &str,
    method: &str,
    field: &str,
    value: Option<&str>,
) -> Result<(), CliError> {
    let Some(value) = value else { return Ok(()) };
    let params = ApiParams::new().with("video_id", video_id).with(field, value);
    client
        .call(method, params, &RequestOptions::post().uncached())
        .map_err(|e| CliError::api(e).with_hint(format!("video {} was uploaded; only the {} was not set", video_id, field)))?;
    Ok(())
}

// ── call ────────────────────────────────────────────────────────────

pub fn cmd_call(
    global: &GlobalArgs,
    method: String,
    params: Vec<String>,
    post: bool,
    no_cache: bool,
) -> Result<(), CliError> {
    let params = parse_params(&params)?;
    let client = client(global)?;

    let mut opts = if post { RequestOptions::post() } else { RequestOptions::default() };
    if no_cache {
        opts = opts.uncached();
    }

    let value = client.call(&method, params, &opts)?;
    print_json(&value)
}

// ── embed ───────────────────────────────────────────────────────────

fn embed_config(global: &GlobalArgs, endpoint: Option<String>) -> EmbedConfig {
    let mut config = EmbedConfig::default();
    if let Some(endpoint) = endpoint {
        config.base_url = endpoint;
    }
    if let Some(ref dir) = global.cache_dir {
        config.root = Some(dir.join("oembed"));
    }
    config
}

pub fn cmd_embed(
    global: &GlobalArgs,
    url: String,
    params: Vec<String>,
    endpoint: String,
    json: bool,
    no_cache: bool,
) -> Result<(), CliError> {
    let params = parse_params(&params)?;
    let mut client = EmbedClient::new(&embed_config(global, Some(endpoint)));
    if no_cache {
        client.disable_cache();
    }

    if json {
        let value = client.call(&url, params)?;
        print_json(&value)
    } else {
        let embed = client.embed(&url, params)?;
        print_line(&embed.html)
    }
}

// ── auth ────────────────────────────────────────────────────────────

pub fn cmd_auth_request(
    global: &GlobalArgs,
    callback: String,
    permission: Permission,
) -> Result<(), CliError> {
    let client = client(global)?;
    let store = token_store(global)?;

    let token = client.request_token(&callback)?;
    store.save(TokenKind::Request, &token)?;

    let url = client.authorize_url(&token, permission)?;
    eprintln!("Open this page, approve access, then run `vimeo auth access <verifier>`:");
    print_line(&url)
}

pub fn cmd_auth_authorize(global: &GlobalArgs, permission: Permission) -> Result<(), CliError> {
    let client = client(global)?;
    let token = stored_request_token(&token_store(global)?)?;
    let url = client.authorize_url(&token, permission)?;
    print_line(&url)
}

pub fn cmd_auth_access(global: &GlobalArgs, verifier: String) -> Result<(), CliError> {
    let mut client = client(global)?;
    let store = token_store(global)?;
    let request = stored_request_token(&store)?;

    client.set_token(request, TokenKind::Request, None)?;
    let access = client.access_token(verifier.trim())?;

    store.save(TokenKind::Access, &access)?;
    store.delete(TokenKind::Request)?;
    eprintln!("Access token saved to {}", store.path().display());
    Ok(())
}

fn stored_request_token(store: &FileTokenStore) -> Result<Token, CliError> {
    store.load(TokenKind::Request).ok_or_else(|| {
        CliError::new(EXIT_CONFIG, "no request token stored")
            .with_hint("run `vimeo auth request` first")
    })
}

// ── cache ───────────────────────────────────────────────────────────

pub fn cmd_cache_clear(global: &GlobalArgs, api: bool, embed: bool) -> Result<(), CliError> {
    if api {
        let config = load_config(global)?;
        match config.cache.root_or_default() {
            Some(root) => clear(&root)?,
            None => log::warn!("no API cache directory to clear"),
        }
    }
    if embed {
        let mut client = EmbedClient::new(&embed_config(global, None));
        client.clear_cache()?;
        eprintln!("Cleared {}", client.cache_root().display());
    }
    Ok(())
}

fn clear(root: &Path) -> Result<(), CliError> {
    FileCache::clear_dir(root)?;
    eprintln!("Cleared {}", root.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_params() {
        let params = parse_params(&args(&["video_id=42", "title=a=b", "empty="])).unwrap();
        assert_eq!(params.get("video_id"), Some("42"));
        assert_eq!(params.get("title"), Some("a=b"));
        assert_eq!(params.get("empty"), Some(""));
    }

    #[test]
    fn test_parse_params_rejects_bad_input() {
        let err = parse_params(&args(&["video_id"])).unwrap_err();
        assert_eq!(err.code, EXIT_USAGE);
        assert!(err.hint.is_some());
        assert_eq!(parse_params(&args(&["=1"])).unwrap_err().code, EXIT_USAGE);
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "consumer_key = \"file-key\"\nconsumer_secret = \"file-secret\"\n").unwrap();

        let global = GlobalArgs {
            config: Some(path),
            consumer_secret: Some("flag-secret".into()),
            cache_dir: Some(dir.path().join("cache")),
            ..GlobalArgs::default()
        };
        let config = load_config(&global).unwrap();

        assert_eq!(config.consumer_secret, "flag-secret");
        assert_eq!(config.cache.backend, CacheBackend::File);
        assert_eq!(config.cache.root, Some(dir.path().join("cache/rest")));
    }

    #[test]
    fn test_embed_config_uses_cache_dir() {
        let global = GlobalArgs { cache_dir: Some(PathBuf::from("/tmp/v")), ..GlobalArgs::default() };
        let config = embed_config(&global, Some("http://localhost:1/api/oembed".into()));
        assert_eq!(config.root, Some(PathBuf::from("/tmp/v/oembed")));
        assert_eq!(config.base_url, "http://localhost:1/api/oembed");
    }
}
