use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Container requested from the fetch utility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    #[default]
    Mp4,
    Mkv,
    Mp3,
}

impl MediaFormat {
    pub fn extension(self) -> &'static str {
        match self {
            MediaFormat::Mp4 => "mp4",
            MediaFormat::Mkv => "mkv",
            MediaFormat::Mp3 => "mp3",
        }
    }

    pub fn is_audio_only(self) -> bool {
        matches!(self, MediaFormat::Mp3)
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for MediaFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp4" => Ok(MediaFormat::Mp4),
            "mkv" => Ok(MediaFormat::Mkv),
            "mp3" => Ok(MediaFormat::Mp3),
            other => Err(format!("unsupported format: {other}")),
        }
    }
}

/// Per-job options. Everything is optional; downloaders fill gaps from their
/// own configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadOptions {
    /// Embed provider name, matched case-insensitively.
    pub provider: Option<String>,
    /// Site-specific language label, e.g. `German Sub`.
    pub language: Option<String>,
    pub quality: Option<String>,
    pub format: Option<MediaFormat>,
    /// Overrides the download root.
    pub output_path: Option<PathBuf>,
    /// Overrides the generated file name (single episodes only).
    pub filename: Option<String>,
}

impl DownloadOptions {
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// A submitted download. Immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    url: String,
    options: DownloadOptions,
}

impl Job {
    pub fn new(url: impl Into<String>, options: DownloadOptions) -> Self {
        Self {
            url: url.into(),
            options,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn options(&self) -> &DownloadOptions {
        &self.options
    }
}

/// Read-only snapshot of the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub is_processing: bool,
    pub current_downloader: Option<String>,
    pub queue_length: usize,
    pub queue: Vec<Job>,
}
