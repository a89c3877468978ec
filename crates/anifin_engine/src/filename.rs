use anifin_core::{EpisodeRef, MediaFormat};

/// `{title} - S01E02 - (German Sub).mp4`
pub fn episode_file_name(episode: &EpisodeRef, language: &str, format: MediaFormat) -> String {
    format!(
        "{} - S{:02}E{:02} - ({}).{}",
        sanitize_component(episode.series_title()),
        episode.season(),
        episode.episode(),
        sanitize_component(language),
        format.extension()
    )
}

/// Windows-safe single path component.
pub fn sanitize_component(input: &str) -> String {
    let mut cleaned: String = input
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    cleaned = cleaned.trim_matches(&['_', ' ', '.'][..]).to_string();
    if cleaned.is_empty() {
        cleaned = "untitled".to_string();
    }
    let mut compacted = String::with_capacity(cleaned.len());
    let mut prev_underscore = false;
    for c in cleaned.chars() {
        if c == '_' && prev_underscore {
            continue;
        }
        prev_underscore = c == '_';
        compacted.push(c);
    }
    if compacted.chars().count() > 120 {
        compacted = compacted.chars().take(120).collect();
    }
    if is_reserved_windows_name(&compacted) {
        compacted.push('_');
    }
    compacted
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn episode_names_are_zero_padded() {
        let ep = EpisodeRef::new("my show", 1, 2).unwrap();
        assert_eq!(
            episode_file_name(&ep, "German Sub", MediaFormat::Mp4),
            "my show - S01E02 - (German Sub).mp4"
        );
        let ep = EpisodeRef::new("my show", 12, 104).unwrap();
        assert_eq!(
            episode_file_name(&ep, "English Sub", MediaFormat::Mkv),
            "my show - S12E104 - (English Sub).mkv"
        );
    }

    #[test]
    fn separators_and_reserved_names_are_neutralised() {
        assert_eq!(sanitize_component("a/b\\c: d?"), "a_b_c_ d");
        assert_eq!(sanitize_component("  ..  "), "untitled");
        assert_eq!(sanitize_component("con"), "con_");
    }
}
