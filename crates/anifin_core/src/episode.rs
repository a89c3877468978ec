use std::fmt;

use serde::Serialize;

/// Series/season/episode triple derived from an episode URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeRef {
    series_title: String,
    season: u32,
    episode: u32,
}

impl EpisodeRef {
    /// Returns `None` when season or episode is zero.
    pub fn new(series_title: impl Into<String>, season: u32, episode: u32) -> Option<Self> {
        if season == 0 || episode == 0 {
            return None;
        }
        Some(Self {
            series_title: series_title.into(),
            season,
            episode,
        })
    }

    pub fn series_title(&self) -> &str {
        &self.series_title
    }

    pub fn season(&self) -> u32 {
        self.season
    }

    pub fn episode(&self) -> u32 {
        self.episode
    }
}

impl fmt::Display for EpisodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} S{}E{}", self.series_title, self.season, self.episode)
    }
}
