//! Content sources for documents and prompts.
//!
//! A source is an `http(s)://` URL, `-` for stdin, or a filesystem path.
//! Object-store references (`s3://`) are recognized but not supported.

use odin_core::Result;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Errors from reading a content source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The HTTP request failed.
    Http { url: String, reason: String },
    /// The server answered with a non-success status.
    Status { url: String, status: u16 },
    /// The file could not be read.
    Io { path: PathBuf, reason: String },
    /// Stdin could not be read.
    Stdin { reason: String },
    /// The source scheme is not supported.
    Unsupported { source: String },
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http { url, reason } => write!(f, "request to {url} failed: {reason}"),
            Self::Status { url, status } => write!(f, "{url} returned status {status}"),
            Self::Io { path, reason } => {
                write!(f, "failed to read {}: {reason}", path.display())
            }
            Self::Stdin { reason } => write!(f, "failed to read stdin: {reason}"),
            Self::Unsupported { source } => write!(f, "unsupported source: {source}"),
        }
    }
}

impl std::error::Error for FetchError {}

/// Where content is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Stdin,
    Url(String),
    ObjectStore(String),
    File(PathBuf),
}

impl Source {
    /// Classifies a source string.
    #[must_use]
    pub fn parse(source: &str) -> Self {
        if source == "-" {
            Self::Stdin
        } else if source.starts_with("http://") || source.starts_with("https://") {
            Self::Url(source.to_string())
        } else if source.starts_with("s3://") {
            Self::ObjectStore(source.to_string())
        } else {
            Self::File(PathBuf::from(source))
        }
    }

    /// Returns true if this source names something to read rather than
    /// literal text: a URL, object-store reference, or an existing file.
    #[must_use]
    pub fn is_reference(&self) -> bool {
        match self {
            Self::Stdin => false,
            Self::Url(_) | Self::ObjectStore(_) => true,
            Self::File(path) => path.is_file(),
        }
    }
}

/// Reads the full text of `source`.
///
/// # Errors
///
/// Returns an error if the source cannot be read or is not supported.
pub async fn fetch(source: &str) -> Result<String, FetchError> {
    match Source::parse(source) {
        Source::Stdin => read_stdin().await,
        Source::Url(url) => fetch_url(&url).await,
        Source::ObjectStore(reference) => Err(FetchError::Unsupported { source: reference }.into()),
        Source::File(path) => read_file(&path),
    }
}

/// Reads all of stdin.
///
/// # Errors
///
/// Returns an error if stdin cannot be read or is not UTF-8.
pub async fn read_stdin() -> Result<String, FetchError> {
    let mut text = String::new();
    tokio::io::stdin()
        .read_to_string(&mut text)
        .await
        .map_err(|e| FetchError::Stdin {
            reason: e.to_string(),
        })?;
    Ok(text)
}

async fn fetch_url(url: &str) -> Result<String, FetchError> {
    debug!(url, "fetching source");
    let response = reqwest::get(url).await.map_err(|e| FetchError::Http {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        }
        .into());
    }

    response.text().await.map_err(|e| {
        FetchError::Http {
            url: url.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

fn read_file(path: &Path) -> Result<String, FetchError> {
    debug!(path = %path.display(), "reading source");
    std::fs::read_to_string(path).map_err(|e| {
        FetchError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
        .into()
    })
}
