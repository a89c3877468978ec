//! Downloader for the aniworld streaming site.

mod listing;
mod scope;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anifin_core::{DownloadOptions, EpisodeRef, LogBook, LogEntry, LogLevel};
use engine_logging::{engine_error, engine_info, engine_warn};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::filename::{episode_file_name, sanitize_component};
use crate::persist::series_directory;
use crate::providers::{EmbedProvider, ProviderRegistry};
use crate::tool::{FetchTool, ToolLine, ToolRequest};
use crate::upload::UploadRelay;
use crate::{DownloadError, Downloader, Fetcher, VideoInfo};

pub use listing::{
    any_redirect, episode_numbers, language_code, language_redirect, season_numbers, LANGUAGES,
};
pub use scope::{classify, episode_url, season_url, series_title, Scope};

pub const DOWNLOADER_NAME: &str = "aniworld";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AniworldSettings {
    pub download_dir: PathBuf,
    pub default_language: String,
    pub fallback_language: Option<String>,
    pub auto_upload: bool,
}

impl Default for AniworldSettings {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("./downloads"),
            default_language: "German Dub".to_string(),
            fallback_language: Some("German Sub".to_string()),
            auto_upload: false,
        }
    }
}

/// Resolved per-job inputs shared by every episode of one download call.
struct Request<'a> {
    provider: String,
    language: &'a str,
    root: PathBuf,
    options: &'a DownloadOptions,
    cancel: &'a CancellationToken,
}

pub struct AniworldDownloader {
    settings: AniworldSettings,
    fetcher: Arc<dyn Fetcher>,
    providers: ProviderRegistry,
    tool: FetchTool,
    relay: Option<Arc<dyn UploadRelay>>,
    logs: LogBook,
}

impl AniworldDownloader {
    pub fn new(settings: AniworldSettings, fetcher: Arc<dyn Fetcher>, tool: FetchTool) -> Self {
        Self {
            settings,
            fetcher,
            providers: ProviderRegistry::new(),
            tool,
            relay: None,
            logs: LogBook::new(),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn EmbedProvider>) -> Self {
        self.providers.register(provider);
        self
    }

    pub fn with_default_provider(mut self, name: &str) -> Result<Self, DownloadError> {
        self.providers.set_default(name)?;
        Ok(self)
    }

    pub fn with_upload_relay(mut self, relay: Arc<dyn UploadRelay>) -> Self {
        self.relay = Some(relay);
        self
    }

    pub fn settings(&self) -> &AniworldSettings {
        &self.settings
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Finds the embed URL for `episode_url` in the requested language,
    /// falling back to the configured fallback language and then to any
    /// hoster link. The redirect must land on a URL naming the provider.
    pub async fn resolve_embed(
        &self,
        episode_url: &str,
        provider: Option<&str>,
        language: Option<&str>,
    ) -> Result<(String, Arc<dyn EmbedProvider>), DownloadError> {
        let provider = self.providers.resolve(provider)?;
        let language = language.unwrap_or(&self.settings.default_language);
        let code = language_code(language)
            .ok_or_else(|| DownloadError::UnknownLanguage(language.to_string()))?;
        let base = Url::parse(episode_url)
            .map_err(|err| DownloadError::InvalidUrl(format!("{episode_url}: {err}")))?;
        let not_found = || DownloadError::LinkNotFound {
            provider: provider.name().to_string(),
            language: language.to_string(),
        };

        let page = self.fetcher.fetch(episode_url, None).await?;
        self.log(
            LogLevel::Info,
            format!("Looking for {} with language: {language}", provider.name()),
        );

        let mut href = language_redirect(&page.html, code);
        if href.is_none() {
            href = self.fallback_redirect(&page.html, language);
        }
        let href = href
            .or_else(|| any_redirect(&page.html))
            .ok_or_else(not_found)?;
        let redirect = base
            .join(&href)
            .map_err(|err| DownloadError::InvalidUrl(format!("{href}: {err}")))?;

        self.log(LogLevel::Info, format!("Following redirect: {redirect}"));
        let landed = self
            .fetcher
            .fetch(redirect.as_str(), Some(episode_url))
            .await?;
        let embed_url = landed.metadata.final_url;
        if !names_provider(&embed_url, provider.name()) {
            return Err(not_found());
        }
        self.log(
            LogLevel::Success,
            format!("Found {} URL: {embed_url}", provider.name()),
        );
        Ok((embed_url, provider))
    }

    fn fallback_redirect(&self, html: &str, language: &str) -> Option<String> {
        let fallback = self
            .settings
            .fallback_language
            .as_deref()
            .filter(|fallback| !fallback.eq_ignore_ascii_case(language))?;
        let Some(code) = language_code(fallback) else {
            self.log(
                LogLevel::Warning,
                format!("Fallback language {fallback} is unknown"),
            );
            return None;
        };
        self.log(
            LogLevel::Warning,
            format!("Language {language} not found, trying fallback: {fallback}"),
        );
        language_redirect(html, code)
    }

    /// Ships `dir` to the relay when auto-upload is on. Failures are logged,
    /// never returned.
    pub async fn upload(&self, dir: &Path) -> bool {
        self.log(
            LogLevel::Info,
            format!("Start uploading {}...", dir.display()),
        );
        if !self.settings.auto_upload {
            self.log(
                LogLevel::Warning,
                format!("Auto-upload disabled, keeping {} locally", dir.display()),
            );
            return false;
        }
        let Some(relay) = &self.relay else {
            self.log(LogLevel::Warning, "No upload relay configured");
            return false;
        };
        match relay.upload_directory(dir, None).await {
            Ok(()) => {
                self.log(LogLevel::Success, format!("Uploaded {}", dir.display()));
                true
            }
            Err(err) => {
                self.log(LogLevel::Error, format!("Upload failed: {err}"));
                false
            }
        }
    }

    async fn download_episode(
        &self,
        request: &Request<'_>,
        url: &str,
        episode: &EpisodeRef,
        single: bool,
    ) -> Result<PathBuf, DownloadError> {
        self.log(LogLevel::Info, format!("Processing: {url}"));
        self.log(
            LogLevel::Info,
            format!("Downloading: {episode} [{}]", request.language),
        );

        let series_dir = series_directory(&request.root, episode.series_title())?;
        let (embed_url, provider) = self
            .resolve_embed(url, Some(request.provider.as_str()), Some(request.language))
            .await?;
        let direct_link = provider.extract_direct_link(&embed_url).await?;

        let format = request.options.format.unwrap_or_default();
        let file_name = match request.options.filename.as_deref() {
            Some(custom) if single => sanitize_component(custom),
            _ => episode_file_name(episode, request.language, format),
        };
        let output = series_dir.join(&file_name);
        let tool_request = ToolRequest {
            url: direct_link,
            output: output.clone(),
            quality: request.options.quality.clone(),
            format: request.options.format,
        };
        self.tool
            .run(&tool_request, |line| self.log_tool_line(line), request.cancel)
            .await?;

        self.log(LogLevel::Success, format!("Completed: {file_name}"));
        if single {
            self.upload(&series_dir).await;
        }
        Ok(output)
    }

    async fn download_season(
        &self,
        request: &Request<'_>,
        series_url: &str,
        title: &str,
        season: u32,
    ) -> Result<PathBuf, DownloadError> {
        let series_dir = series_directory(&request.root, title)?;
        self.log(
            LogLevel::Info,
            format!("Downloading season {season} [{}]...", request.language),
        );
        self.warn_ignored_filename(request);

        let episodes = self.list_episodes(series_url, season).await?;
        self.log(LogLevel::Info, format!("Found {} episodes", episodes.len()));
        self.download_episodes(request, series_url, title, season, &episodes)
            .await?;

        self.log(LogLevel::Success, format!("Season {season} completed!"));
        self.upload(&series_dir).await;
        Ok(series_dir)
    }

    async fn download_series(
        &self,
        request: &Request<'_>,
        series_url: &str,
        title: &str,
    ) -> Result<PathBuf, DownloadError> {
        let series_dir = series_directory(&request.root, title)?;
        self.log(
            LogLevel::Info,
            format!("Downloading entire series: {title} [{}]", request.language),
        );
        self.warn_ignored_filename(request);

        let page = self.fetcher.fetch(series_url, None).await?;
        let seasons = season_numbers(&page.html);
        self.log(LogLevel::Info, format!("Found {} seasons", seasons.len()));

        for season in seasons {
            if request.cancel.is_cancelled() {
                return Err(DownloadError::Cancelled);
            }
            self.log(LogLevel::Info, format!("Season {season}"));
            match self.list_episodes(series_url, season).await {
                Ok(episodes) => {
                    self.log(LogLevel::Info, format!("Found {} episodes", episodes.len()));
                    self.download_episodes(request, series_url, title, season, &episodes)
                        .await?;
                }
                Err(err) => self.log(
                    LogLevel::Error,
                    format!("Failed to list season {season}: {err}"),
                ),
            }
        }

        self.log(LogLevel::Success, "Download completed!");
        self.upload(&series_dir).await;
        Ok(series_dir)
    }

    /// Downloads `episodes` in order. Only cancellation stops the loop.
    async fn download_episodes(
        &self,
        request: &Request<'_>,
        series_url: &str,
        title: &str,
        season: u32,
        episodes: &[u32],
    ) -> Result<usize, DownloadError> {
        let mut completed = 0;
        for &number in episodes {
            if request.cancel.is_cancelled() {
                return Err(DownloadError::Cancelled);
            }
            let Some(episode) = EpisodeRef::new(title, season, number) else {
                continue;
            };
            let url = episode_url(series_url, season, number);
            match self.download_episode(request, &url, &episode, false).await {
                Ok(_) => completed += 1,
                Err(DownloadError::Cancelled) => return Err(DownloadError::Cancelled),
                Err(err) => self.log(
                    LogLevel::Error,
                    format!("Failed S{season:02}E{number:02}: {err}"),
                ),
            }
        }
        Ok(completed)
    }

    async fn list_episodes(&self, series_url: &str, season: u32) -> Result<Vec<u32>, DownloadError> {
        let page = self
            .fetcher
            .fetch(&season_url(series_url, season), None)
            .await?;
        Ok(episode_numbers(&page.html))
    }

    fn warn_ignored_filename(&self, request: &Request<'_>) {
        if request.options.filename.is_some() {
            self.log(
                LogLevel::Warning,
                "Custom filename only applies to single episodes, using generated names",
            );
        }
    }

    fn log_tool_line(&self, line: ToolLine) {
        match line {
            ToolLine::Progress(text) => self.log(LogLevel::Info, text),
            ToolLine::Merging => self.log(LogLevel::Info, "Merging fragments..."),
            ToolLine::Warning(text) => self.log(LogLevel::Warning, text),
        }
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        let entry = self.logs.push(level, message);
        mirror(&entry);
    }
}

#[async_trait::async_trait]
impl Downloader for AniworldDownloader {
    fn name(&self) -> &str {
        DOWNLOADER_NAME
    }

    async fn download(
        &self,
        url: &str,
        options: &DownloadOptions,
        cancel: CancellationToken,
    ) -> Result<PathBuf, DownloadError> {
        let scope = classify(url)?;
        let provider = self.providers.resolve(options.provider.as_deref())?;
        let language = options
            .language
            .as_deref()
            .unwrap_or(&self.settings.default_language);
        if language_code(language).is_none() {
            return Err(DownloadError::UnknownLanguage(language.to_string()));
        }

        let request = Request {
            provider: provider.name().to_string(),
            language,
            root: options
                .output_path
                .clone()
                .unwrap_or_else(|| self.settings.download_dir.clone()),
            options,
            cancel: &cancel,
        };

        match scope {
            Scope::Episode { url, episode } => {
                self.download_episode(&request, &url, &episode, true).await
            }
            Scope::Season {
                series_url,
                series_title,
                season,
            } => {
                self.download_season(&request, &series_url, &series_title, season)
                    .await
            }
            Scope::Series {
                series_url,
                series_title,
            } => {
                self.download_series(&request, &series_url, &series_title)
                    .await
            }
        }
    }

    async fn video_info(
        &self,
        url: &str,
        options: &DownloadOptions,
    ) -> Result<VideoInfo, DownloadError> {
        let Scope::Episode { url, episode } = classify(url)? else {
            return Err(DownloadError::InvalidUrl(format!(
                "{url}: video info needs an episode url"
            )));
        };
        let (embed_url, provider) = self
            .resolve_embed(&url, options.provider.as_deref(), options.language.as_deref())
            .await?;
        let thumbnail = match provider.extract_preview_image(&embed_url).await {
            Ok(image) => Some(image),
            Err(err) => {
                self.log(LogLevel::Warning, err.to_string());
                None
            }
        };
        Ok(VideoInfo {
            title: episode.to_string(),
            url,
            thumbnail,
        })
    }

    fn logs(&self) -> &LogBook {
        &self.logs
    }
}

fn names_provider(url: &str, provider: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let haystack = format!("{}{}", parsed.host_str().unwrap_or_default(), parsed.path());
    haystack
        .to_ascii_lowercase()
        .contains(&provider.to_ascii_lowercase())
}

fn mirror(entry: &LogEntry) {
    match entry.level {
        LogLevel::Info | LogLevel::Success => {
            engine_info!("[{DOWNLOADER_NAME}] {}", entry.message)
        }
        LogLevel::Warning => engine_warn!("[{DOWNLOADER_NAME}] {}", entry.message),
        LogLevel::Error => engine_error!("[{DOWNLOADER_NAME}] {}", entry.message),
    }
}

#[cfg(test)]
mod tests {
    use super::names_provider;

    #[test]
    fn provider_must_appear_in_host_or_path() {
        assert!(names_provider("https://voe.sx/e/abc", "voe"));
        assert!(names_provider("http://127.0.0.1:9000/VOE/e/abc", "voe"));
        assert!(!names_provider("https://streamtape.com/e/abc?src=voe", "voe"));
        assert!(!names_provider("not a url", "voe"));
    }
}
