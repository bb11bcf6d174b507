use std::fmt;

/// Which integrity check rejected an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityStage {
    /// The ticket endpoint echoed a checksum for the whole file.
    Transfer,
    /// The ticket endpoint echoed a checksum for one chunk (zero-based index).
    Chunk(usize),
    /// The manifest verification call reported the assembled file checksum.
    Manifest,
}

impl fmt::Display for IntegrityStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transfer => write!(f, "transfer"),
            Self::Chunk(index) => write!(f, "chunk {index}"),
            Self::Manifest => write!(f, "manifest"),
        }
    }
}

/// Error type for every client operation.
#[derive(Debug)]
pub enum ApiError {
    /// The API answered with `stat != "ok"`. Message and code are the server's.
    RemoteApi { code: i64, msg: String },
    /// Uploaded bytes do not hash to what we sent. Never retried.
    IntegrityMismatch {
        stage: IntegrityStage,
        expected: String,
        actual: String,
    },
    /// Response envelope could not be decoded or lacked a required field
    MalformedResponse(String),
    /// Cache backend could not be written; callers may keep going uncached
    CacheUnavailable(String),
    /// Connection-level failure
    Network(String),
    /// Request exceeded the configured timeout
    Timeout(String),
    /// Non-success HTTP status without a decodable API error
    Http(u16, String),
    /// Local file I/O error
    Io(String),
    /// Invalid or missing configuration
    Config(String),
}

impl ApiError {
    /// True for errors reported by the remote API itself.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::RemoteApi { .. })
    }

    /// True for checksum failures during upload.
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::IntegrityMismatch { .. })
    }

    /// True for failures a caller may reasonably retry from the start.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }

    /// Map a transport failure to `Timeout` or `Network`.
    pub fn transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemoteApi { code, msg } => write!(f, "API error {code}: {msg}"),
            Self::IntegrityMismatch { stage, expected, actual } => write!(
                f,
                "uploaded file checksum does not match ({stage}): expected {expected}, got {actual}"
            ),
            Self::MalformedResponse(msg) => write!(f, "malformed response: {msg}"),
            Self::CacheUnavailable(msg) => write!(f, "cache unavailable: {msg}"),
            Self::Network(msg) => write!(f, "network error: {msg}"),
            Self::Timeout(msg) => write!(f, "timeout: {msg}"),
            Self::Http(code, body) => write!(f, "HTTP {code}: {body}"),
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
            Self::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_keeps_message_and_code() {
        let err = ApiError::RemoteApi { code: 401, msg: "Invalid signature".into() };
        assert!(err.is_remote());
        assert!(!err.is_integrity());
        assert_eq!(err.to_string(), "API error 401: Invalid signature");
    }

    #[test]
    fn test_integrity_error_is_distinct() {
        let err = ApiError::IntegrityMismatch {
            stage: IntegrityStage::Manifest,
            expected: "aaa".into(),
            actual: "bbb".into(),
        };
        assert!(err.is_integrity());
        assert!(!err.is_remote());
        assert!(!err.is_transient());
        assert!(err.to_string().contains("(manifest)"));
    }
}
