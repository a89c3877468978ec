use std::path::PathBuf;

use anifin_core::{DownloadOptions, MediaFormat};
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "anifin", version, about = "Queue-driven anime episode downloader")]
pub struct Cli {
    /// RON configuration file.
    #[arg(long, env = "ANIFIN_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Overrides the configured log level (error, warn, info, debug, trace).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Queue one or more episode, season or series URLs and download them in order.
    Download(DownloadArgs),
    /// Print title and preview image of an episode as JSON.
    Info(InfoArgs),
}

#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Embed provider, e.g. `voe`.
    #[arg(long)]
    pub provider: Option<String>,

    /// Language label: `German Dub`, `German Sub` or `English Sub`.
    #[arg(long)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct DownloadArgs {
    #[arg(required = true, value_name = "URL")]
    pub urls: Vec<String>,

    #[command(flatten)]
    pub source: SourceArgs,

    /// Format selector handed to the fetch utility (`-f`).
    #[arg(long)]
    pub quality: Option<String>,

    /// Output container: mp4, mkv or mp3.
    #[arg(long)]
    pub format: Option<MediaFormat>,

    /// Download root, overriding DOWNLOAD_PATH.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// File name for a single-episode URL.
    #[arg(long)]
    pub filename: Option<String>,
}

impl DownloadArgs {
    pub fn options(&self) -> DownloadOptions {
        DownloadOptions {
            provider: self.source.provider.clone(),
            language: self.source.language.clone(),
            quality: self.quality.clone(),
            format: self.format,
            output_path: self.output.clone(),
            filename: self.filename.clone(),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct InfoArgs {
    #[arg(value_name = "URL")]
    pub url: String,

    #[command(flatten)]
    pub source: SourceArgs,
}

impl InfoArgs {
    pub fn options(&self) -> DownloadOptions {
        DownloadOptions {
            provider: self.source.provider.clone(),
            language: self.source.language.clone(),
            ..DownloadOptions::default()
        }
    }
}
