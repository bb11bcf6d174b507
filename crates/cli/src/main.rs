// Vimeo CLI - signed API calls, uploads and oEmbed lookups from the shell

mod commands;
mod exit_codes;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vimeo_api::{ApiError, Permission, DEFAULT_CHUNK_SIZE};

use exit_codes::{api_exit_code, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "vimeo")]
#[command(about = "Vimeo API from the command line (OAuth 1.0 signed calls, uploads, oEmbed)")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command. Flags override `VIMEO_*` variables,
/// which override the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Config file [default: ~/.config/vimeo/config.toml]
    #[arg(long, global = true, env = "VIMEO_CONFIG")]
    pub config: Option<PathBuf>,

    /// OAuth consumer key
    #[arg(long, global = true)]
    pub consumer_key: Option<String>,

    /// OAuth consumer secret
    #[arg(long, global = true)]
    pub consumer_secret: Option<String>,

    /// Access token (otherwise the stored one is used)
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Access token secret
    #[arg(long, global = true)]
    pub token_secret: Option<String>,

    /// Where tokens are kept [default: ~/.config/vimeo/tokens.json]
    #[arg(long, global = true, env = "VIMEO_TOKEN_FILE")]
    pub token_file: Option<PathBuf>,

    /// Cache responses under this directory
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// More log output (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a video file
    #[command(after_help = "\
Examples:
  vimeo upload clip.mp4
  vimeo upload clip.mp4 --chunked --chunk-size 2097152
  vimeo upload clip.mp4 --title 'Holiday' --description 'Shot on a phone'")]
    Upload {
        /// Video file to upload
        file: PathBuf,

        /// Send the file in pieces and verify them with a manifest
        #[arg(long)]
        chunked: bool,

        /// Piece size in bytes for --chunked
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE, requires = "chunked")]
        chunk_size: u64,

        /// Title to set once the upload is confirmed
        #[arg(long)]
        title: Option<String>,

        /// Description to set once the upload is confirmed
        #[arg(long)]
        description: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Call an API method and print the response
    #[command(after_help = "\
Examples:
  vimeo call videos.getInfo video_id=20800127
  vimeo call vimeo.people.getInfo user_id=brad
  vimeo call videos.setTitle video_id=20800127 title='New title' --post")]
    Call {
        /// Method name; the `vimeo.` prefix is optional
        method: String,

        /// Parameters as key=value
        params: Vec<String>,

        /// Send as POST instead of GET
        #[arg(long)]
        post: bool,

        /// Skip the response cache
        #[arg(long)]
        no_cache: bool,
    },

    /// Fetch oEmbed data for a video URL and print the embed HTML
    #[command(after_help = "\
Examples:
  vimeo embed https://vimeo.com/20800127
  vimeo embed https://vimeo.com/20800127 maxwidth=480 byline=false --json")]
    Embed {
        /// Video page URL
        url: String,

        /// oEmbed styling parameters as key=value
        params: Vec<String>,

        /// oEmbed endpoint (without the .json suffix)
        #[arg(long, env = "VIMEO_OEMBED_URL", default_value = vimeo_embed::OEMBED_URL)]
        endpoint: String,

        /// Print the whole response instead of the HTML
        #[arg(long)]
        json: bool,

        /// Skip the response cache
        #[arg(long)]
        no_cache: bool,
    },

    /// Obtain and store OAuth tokens
    #[command(subcommand)]
    Auth(AuthCommands),

    /// Manage local response caches
    #[command(subcommand)]
    Cache(CacheCommands),
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Get a request token and print the page to authorize it
    Request {
        /// Callback URL, or `oob` to be shown a verifier code
        #[arg(long, default_value = "oob")]
        callback: String,

        /// Access level to ask for: read, write or delete
        #[arg(long, default_value = "read")]
        permission: Permission,
    },

    /// Print the authorization page for the stored request token
    Authorize {
        #[arg(long, default_value = "read")]
        permission: Permission,
    },

    /// Exchange the stored request token and a verifier for an access token
    Access {
        /// Verifier shown after authorizing
        verifier: String,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Delete every cached response
    Clear {
        /// Only the API response cache
        #[arg(long, conflicts_with = "embed")]
        api: bool,

        /// Only the oEmbed cache
        #[arg(long)]
        embed: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    let global = &cli.global;
    let result = match cli.command {
        Commands::Upload { file, chunked, chunk_size, title, description, json } => {
            let chunk_size = chunked.then_some(chunk_size);
            commands::cmd_upload(global, file, chunk_size, title, description, json)
        }
        Commands::Call { method, params, post, no_cache } => {
            commands::cmd_call(global, method, params, post, no_cache)
        }
        Commands::Embed { url, params, endpoint, json, no_cache } => {
            commands::cmd_embed(global, url, params, endpoint, json, no_cache)
        }
        Commands::Auth(auth) => match auth {
            AuthCommands::Request { callback, permission } => {
                commands::cmd_auth_request(global, callback, permission)
            }
            AuthCommands::Authorize { permission } => commands::cmd_auth_authorize(global, permission),
            AuthCommands::Access { verifier } => commands::cmd_auth_access(global, verifier),
        },
        Commands::Cache(CacheCommands::Clear { api, embed }) => {
            // neither flag means both caches
            commands::cmd_cache_clear(global, api || !embed, embed || !api)
        }
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

/// Install a fmt subscriber on stderr. Library `log` records are forwarded.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    /// Create error from an API error with the matching exit code.
    pub fn api(err: ApiError) -> Self {
        let code = api_exit_code(&err);
        let hint = match &err {
            ApiError::Config(_) => Some(
                "set VIMEO_CONSUMER_KEY and VIMEO_CONSUMER_SECRET or add them to the config file"
                    .to_string(),
            ),
            ApiError::RemoteApi { code: 401, .. } => {
                Some("run `vimeo auth request` to obtain an access token".to_string())
            }
            ApiError::IntegrityMismatch { .. } => {
                Some("the upload was not confirmed; run the upload again".to_string())
            }
            ApiError::Timeout(_) => Some("raise timeout_secs in the config file".to_string()),
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ApiError> for CliError {
    fn from(err: ApiError) -> Self {
        Self::api(err)
    }
}
