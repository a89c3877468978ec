//! URL shapes of the streaming site.
//!
//! ```text
//! /anime/stream/<slug>                          series
//! /anime/stream/<slug>/staffel-<n>              season
//! /anime/stream/<slug>/staffel-<n>/episode-<m>  episode
//! ```

use std::sync::LazyLock;

use anifin_core::EpisodeRef;
use regex::{Captures, Regex};
use url::Url;

use crate::DownloadError;

static EPISODE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/anime/stream/([^/]+)/staffel-(\d+)/episode-(\d+)$").expect("valid regex")
});
static SEASON_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/anime/stream/([^/]+)/staffel-(\d+)$").expect("valid regex"));
static SERIES_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/anime/stream/([^/]+)$").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Episode {
        url: String,
        episode: EpisodeRef,
    },
    Season {
        series_url: String,
        series_title: String,
        season: u32,
    },
    Series {
        series_url: String,
        series_title: String,
    },
}

/// Checked most specific first. A trailing slash is ignored; the query and
/// fragment are dropped.
pub fn classify(url: &str) -> Result<Scope, DownloadError> {
    let trimmed = url.trim();
    let parsed = Url::parse(trimmed)
        .map_err(|err| DownloadError::InvalidUrl(format!("{trimmed}: {err}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(DownloadError::InvalidUrl(format!(
            "{trimmed}: unsupported scheme {}",
            parsed.scheme()
        )));
    }
    let origin = parsed.origin().ascii_serialization();
    let path = parsed.path().trim_end_matches('/');

    if let Some(caps) = EPISODE_PATH.captures(path) {
        let slug = &caps[1];
        let season = number(&caps, 2, trimmed)?;
        let episode = number(&caps, 3, trimmed)?;
        let episode = EpisodeRef::new(series_title(slug), season, episode).ok_or_else(|| {
            DownloadError::InvalidUrl(format!("{trimmed}: season and episode start at 1"))
        })?;
        return Ok(Scope::Episode {
            url: episode_url(&series_url(&origin, slug), season, episode.episode()),
            episode,
        });
    }

    if let Some(caps) = SEASON_PATH.captures(path) {
        let slug = &caps[1];
        let season = number(&caps, 2, trimmed)?;
        if season == 0 {
            return Err(DownloadError::InvalidUrl(format!(
                "{trimmed}: seasons start at 1"
            )));
        }
        return Ok(Scope::Season {
            series_url: series_url(&origin, slug),
            series_title: series_title(slug),
            season,
        });
    }

    if let Some(caps) = SERIES_PATH.captures(path) {
        let slug = &caps[1];
        return Ok(Scope::Series {
            series_url: series_url(&origin, slug),
            series_title: series_title(slug),
        });
    }

    Err(DownloadError::InvalidUrl(format!(
        "{trimmed}: not an /anime/stream/ url"
    )))
}

/// Slug with hyphens turned into spaces.
pub fn series_title(slug: &str) -> String {
    slug.replace('-', " ")
}

pub fn season_url(series_url: &str, season: u32) -> String {
    format!("{series_url}/staffel-{season}")
}

pub fn episode_url(series_url: &str, season: u32, episode: u32) -> String {
    format!("{series_url}/staffel-{season}/episode-{episode}")
}

fn series_url(origin: &str, slug: &str) -> String {
    format!("{origin}/anime/stream/{slug}")
}

fn number(caps: &Captures<'_>, group: usize, url: &str) -> Result<u32, DownloadError> {
    caps[group]
        .parse()
        .map_err(|_| DownloadError::InvalidUrl(format!("{url}: number out of range")))
}
