use std::path::PathBuf;

use anifin_core::{DownloadOptions, LogBook};
use tokio_util::sync::CancellationToken;

use crate::{DownloadError, VideoInfo};

/// A site-specific downloader the orchestrator can drain jobs into.
#[async_trait::async_trait]
pub trait Downloader: Send + Sync {
    /// Registry key, e.g. `aniworld`.
    fn name(&self) -> &str;

    /// Downloads everything `url` addresses and returns the produced file or
    /// directory. Bulk scopes fail for input errors, cancellation, or when the
    /// season listing (season scope) or series page (series scope) cannot be
    /// fetched. Per-episode failures, and in series scope a failed season
    /// listing, are logged and skipped.
    async fn download(
        &self,
        url: &str,
        options: &DownloadOptions,
        cancel: CancellationToken,
    ) -> Result<PathBuf, DownloadError>;

    async fn video_info(
        &self,
        url: &str,
        options: &DownloadOptions,
    ) -> Result<VideoInfo, DownloadError>;

    fn logs(&self) -> &LogBook;
}
