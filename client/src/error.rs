use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {path} failed after {attempts} attempt(s): {source}")]
    Transport {
        path: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
    #[error("API error: HTTP {} - {body}", status.as_u16())]
    Status { status: StatusCode, body: String },
    #[error("failed to decode response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error(transparent)]
    Logo(#[from] LogoError),
    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failures of the out-of-band logo upload.
#[derive(Debug, Error)]
pub enum LogoError {
    #[error("invalid logo URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("invalid image format for {url:?}. Supported formats: PNG, JPEG, JPG, GIF, SVG")]
    UnsupportedFormat { url: String },
    #[error("failed to download logo from {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to download logo: HTTP {}", status.as_u16())]
    DownloadStatus { status: StatusCode },
    #[error("logo file size exceeds {limit} byte limit")]
    TooLarge { limit: usize },
}
