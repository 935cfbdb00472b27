use cadenza_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Invalid remote URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Network request failed: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Network request failed after retries: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),

    #[error("{url} returned status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
}

pub type Result<T> = std::result::Result<T, RemoteError>;

impl From<RemoteError> for CoreError {
    fn from(err: RemoteError) -> Self {
        Self::Remote {
            reason: err.to_string(),
        }
    }
}
