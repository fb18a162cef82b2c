use thiserror::Error;

/// Errors raised while talking to the upstream forum.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Network request failed: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    #[error("Upstream did not answer within {0}s")]
    Timeout(u64),

    #[error("HTTP client unavailable: {0}")]
    ClientUnavailable(String),
}

impl NetworkError {
    /// Classify a transport error, keeping timeouts distinct from other failures.
    #[must_use]
    pub fn from_transport(err: reqwest::Error, timeout_seconds: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout_seconds)
        } else if err.is_connect() {
            Self::UpstreamUnreachable(err.to_string())
        } else {
            Self::Reqwest(err)
        }
    }
}
