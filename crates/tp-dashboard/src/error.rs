use thiserror::Error;

/// Failure of one pull request. Rendered inline in the pane that asked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("HTTP {status}")]
    Status { status: u16 },
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid response: {0}")]
    Decode(String),
    #[error("invalid request url: {0}")]
    Url(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return ApiError::Decode(err.to_string());
        }
        if let Some(status) = err.status() {
            return ApiError::Status {
                status: status.as_u16(),
            };
        }
        ApiError::Network(err.to_string())
    }
}
