use thiserror::Error;

/// Top-level error type for the `tunnelkeeper-api` crate.
///
/// Covers every failure mode of the REST backend: transport, URL
/// construction, error responses and body decoding. `tunnelkeeper-core`
/// wraps these into its `rest` error kind.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS setup error (unreadable or invalid CA certificate).
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Server ──────────────────────────────────────────────────────
    /// Non-success HTTP response from the backend.
    #[error("Server error (HTTP {status}): {message}")]
    Server {
        status: u16,
        code: Option<String>,
        message: String,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

/// Coarse classification of a REST failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request never produced a usable response.
    Network,
    /// A response arrived but its body could not be decoded.
    Decode,
    /// The backend answered with an error status.
    Server,
}

impl Error {
    /// Classify this error into network, decode or server failures.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(e) if e.is_decode() => ErrorKind::Decode,
            Self::Transport(_) | Self::InvalidUrl(_) | Self::Timeout { .. } | Self::Tls(_) => {
                ErrorKind::Network
            }
            Self::Server { .. } => ErrorKind::Server,
            Self::Deserialization { .. } => ErrorKind::Decode,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } => true,
            Self::Server { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Server { status: 404, .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if the backend rejected the access token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Server { status: 401, .. })
    }

    /// Extract the backend error code, if available.
    pub fn api_error_code(&self) -> Option<&str> {
        match self {
            Self::Server { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(status: u16) -> Error {
        Error::Server {
            status,
            code: None,
            message: "boom".into(),
        }
    }

    #[test]
    fn server_errors_classify_by_status() {
        assert_eq!(server(500).kind(), ErrorKind::Server);
        assert!(server(503).is_transient());
        assert!(server(429).is_transient());
        assert!(!server(400).is_transient());
        assert!(server(404).is_not_found());
        assert!(server(401).is_unauthorized());
    }

    #[test]
    fn deserialization_is_a_decode_failure() {
        let err = Error::Deserialization {
            message: "expected value".into(),
            body: "<html>".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert!(!err.is_transient());
    }

    #[test]
    fn timeouts_are_transient_network_failures() {
        let err = Error::Timeout { timeout_secs: 10 };
        assert_eq!(err.kind(), ErrorKind::Network);
        assert!(err.is_transient());
    }
}
