use std::fmt;

use serde::Serialize;

use crate::persist::PersistError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    Decode,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::Decode => write!(f, "undecodable body"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

/// Failures of an embed provider. Every variant is scoped to one episode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("embed page fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("no redirect url found in embed page")]
    NoRedirect,
    #[error("no video source found")]
    NoVideoSource,
    #[error("no preview available: {0}")]
    NoPreview(String),
    #[error("provider '{0}' does not support this operation")]
    Unsupported(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("provider '{0}' not found")]
    ProviderNotFound(String),
    #[error("unknown language: {0}")]
    UnknownLanguage(String),
    #[error("{provider} url not found for language: {language}")]
    LinkNotFound { provider: String, language: String },
    #[error("page fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("failed to start {tool}: {message}")]
    ToolLaunch { tool: String, message: String },
    #[error("{tool} exited with {}", exit_label(.code))]
    ToolExit { tool: String, code: Option<i32> },
    #[error("download cancelled")]
    Cancelled,
    #[error(transparent)]
    OutputDir(#[from] PersistError),
}

impl DownloadError {
    /// Input errors are raised before any network or process IO.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            DownloadError::InvalidUrl(_)
                | DownloadError::ProviderNotFound(_)
                | DownloadError::UnknownLanguage(_)
        )
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "no exit code (killed by signal)".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("downloader '{0}' not found")]
    UnknownDownloader(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoInfo {
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}
