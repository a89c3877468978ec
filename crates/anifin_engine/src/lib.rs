//! Anifin engine: page fetching, embed providers, site downloaders and the
//! serial download queue.
pub mod aniworld;
mod decode;
mod downloader;
mod fetch;
mod filename;
mod orchestrator;
mod persist;
pub mod providers;
mod tool;
mod types;
mod upload;

pub use decode::{decode_body, DecodeError};
pub use downloader::Downloader;
pub use fetch::{FetchMetadata, FetchSettings, FetchedPage, Fetcher, ReqwestFetcher, DEFAULT_USER_AGENT};
pub use filename::{episode_file_name, sanitize_component};
pub use orchestrator::{DownloaderLogEntry, DrainOutcome, Orchestrator};
pub use persist::{ensure_output_dir, series_directory, PersistError};
pub use tool::{
    classify_stderr, classify_stdout, FetchTool, ToolLine, ToolRequest,
    DEFAULT_CONCURRENT_FRAGMENTS, DEFAULT_PROGRAM,
};
pub use types::{DownloadError, FailureKind, FetchError, ProviderError, QueueError, VideoInfo};
pub use upload::{
    ScpUploadRelay, SshSettings, Transfer, UploadError, UploadRelay, DEFAULT_REMOTE_PATH,
    DEFAULT_SSH_PORT,
};
