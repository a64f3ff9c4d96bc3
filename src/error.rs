use thiserror::Error;

/// Failure of a single remote call (listing, generation or submission).
///
/// These never abort a batch; the orchestrator counts them and moves on.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl RemoteError {
    /// Build an HTTP error, keeping only the head of the response body
    pub fn http(status: reqwest::StatusCode, body: &str) -> Self {
        Self::Http {
            status: status.as_u16(),
            body: body.chars().take(150).collect(),
        }
    }
}
