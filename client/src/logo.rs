//! OIDC client logo handling.
//!
//! Logos are fetched from an arbitrary URL and re-uploaded to Pocket ID as a
//! multipart form. The format is decided by the URL's path extension, and the
//! download is cut off as soon as it exceeds [`MAX_LOGO_BYTES`].

use futures_util::StreamExt;
use reqwest::StatusCode;
use url::Url;

use crate::LogoError;
use crate::retry::{Replay, RetryConfig, RetryOutcome, send_with_retry};

/// Largest logo Pocket ID accepts.
pub const MAX_LOGO_BYTES: usize = 2 * 1024 * 1024;

const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpeg", "jpg", "gif", "svg"];
const DEFAULT_FILE_NAME: &str = "logo";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Parses the logo URL and checks its extension before anything is fetched.
///
/// Returns the URL and the file name sent with the upload (the last path
/// segment, or `logo` when the path has none).
pub fn validate_logo_url(raw: &str) -> Result<(Url, String), LogoError> {
    let url = Url::parse(raw).map_err(|e| LogoError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LogoError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme {:?}", url.scheme()),
        });
    }

    let file_name = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .unwrap_or(DEFAULT_FILE_NAME)
        .to_string();

    let supported = file_name
        .rsplit_once('.')
        .is_some_and(|(_, ext)| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
    if !supported {
        return Err(LogoError::UnsupportedFormat {
            url: raw.to_string(),
        });
    }

    Ok((url, file_name))
}

/// Downloads a logo. Anything but `200 OK` is a failure.
pub async fn download_logo(
    http: &reqwest::Client,
    raw_url: &str,
    retry: &RetryConfig,
) -> Result<LogoFile, LogoError> {
    let (url, file_name) = validate_logo_url(raw_url)?;

    let build = || http.get(url.clone());
    let response = match send_with_retry(build, Replay::Idempotent, retry).await {
        RetryOutcome::Success(response) | RetryOutcome::HttpError(response) => response,
        RetryOutcome::ConnectionError { source, .. } => {
            return Err(LogoError::Download {
                url: raw_url.to_string(),
                source,
            });
        }
    };
    if response.status() != StatusCode::OK {
        return Err(LogoError::DownloadStatus {
            status: response.status(),
        });
    }
    if response
        .content_length()
        .is_some_and(|len| len > MAX_LOGO_BYTES as u64)
    {
        return Err(LogoError::TooLarge {
            limit: MAX_LOGO_BYTES,
        });
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|source| LogoError::Download {
            url: raw_url.to_string(),
            source,
        })?;
        if bytes.len() + chunk.len() > MAX_LOGO_BYTES {
            return Err(LogoError::TooLarge {
                limit: MAX_LOGO_BYTES,
            });
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(LogoFile { file_name, bytes })
}
