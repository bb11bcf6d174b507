//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 3-9     | local            | Configuration, file I/O, cache           |
//! | 10-19   | api              | Remote API and transport failures        |
//! | 20-29   | upload           | Upload-specific outcomes                 |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Map it in `api_exit_code` if it comes from an `ApiError`

use vimeo_api::ApiError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, malformed `key=value` params.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Local (3-9)
// =============================================================================

/// Missing consumer credentials or an unreadable config file.
pub const EXIT_CONFIG: u8 = 3;

/// Local file I/O failed (reading the source video, writing tokens).
pub const EXIT_IO: u8 = 4;

/// Cache directory could not be created or cleared.
pub const EXIT_CACHE: u8 = 5;

// =============================================================================
// API (10-19)
// =============================================================================

/// The API answered `stat: fail`. The server's code and message are printed.
pub const EXIT_API_REMOTE: u8 = 10;

/// The response could not be decoded or lacked a required field.
pub const EXIT_API_MALFORMED: u8 = 11;

/// Non-success HTTP status without an API error body.
pub const EXIT_API_HTTP: u8 = 12;

/// Connection failed (DNS, refused, TLS).
pub const EXIT_API_NETWORK: u8 = 13;

/// Request exceeded the configured timeout.
pub const EXIT_API_TIMEOUT: u8 = 14;

// =============================================================================
// Upload (20-29)
// =============================================================================

/// The file to upload does not exist. Nothing was sent.
pub const EXIT_UPLOAD_NOT_FOUND: u8 = 20;

/// The server's checksum for the uploaded bytes differs from the local one.
pub const EXIT_UPLOAD_INTEGRITY: u8 = 21;

/// Map an API error to its exit code.
pub fn api_exit_code(err: &ApiError) -> u8 {
    match err {
        ApiError::RemoteApi { .. } => EXIT_API_REMOTE,
        ApiError::IntegrityMismatch { .. } => EXIT_UPLOAD_INTEGRITY,
        ApiError::MalformedResponse(_) => EXIT_API_MALFORMED,
        ApiError::CacheUnavailable(_) => EXIT_CACHE,
        ApiError::Network(_) => EXIT_API_NETWORK,
        ApiError::Timeout(_) => EXIT_API_TIMEOUT,
        ApiError::Http(..) => EXIT_API_HTTP,
        ApiError::Io(_) => EXIT_IO,
        ApiError::Config(_) => EXIT_CONFIG,
    }
}
