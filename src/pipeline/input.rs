//! Input resolution: turn a user-supplied path or URL into validated PDF bytes.
//!
//! pdfium renders straight from a byte slice, so nothing is staged on disk.
//! The `%PDF` magic is checked up front so callers get a meaningful error
//! rather than a pdfium failure deep in rasterisation.

use crate::error::PodcastError;
use std::path::PathBuf;
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load the PDF named by `input` (local path or HTTP/HTTPS URL).
pub async fn load_pdf(input: &str, timeout_secs: u64) -> Result<Vec<u8>, PodcastError> {
    let bytes = if is_url(input) {
        download_url(input, timeout_secs).await?
    } else {
        read_local(input).await?
    };
    ensure_pdf(&bytes, input)?;
    Ok(bytes)
}

/// Reject bytes that do not start with the `%PDF` magic.
pub fn ensure_pdf(bytes: &[u8], source_name: &str) -> Result<(), PodcastError> {
    if bytes.starts_with(PDF_MAGIC) {
        Ok(())
    } else {
        Err(PodcastError::NotAPdf {
            source_name: source_name.to_string(),
            magic: bytes.iter().take(4).copied().collect(),
        })
    }
}

async fn read_local(path_str: &str) -> Result<Vec<u8>, PodcastError> {
    let path = PathBuf::from(path_str);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());
            Ok(bytes)
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(PodcastError::PermissionDenied { path })
        }
        Err(_) => Err(PodcastError::FileNotFound { path }),
    }
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, PodcastError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| PodcastError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            PodcastError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            PodcastError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(PodcastError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| PodcastError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}
