//! Scraping helpers for series, season and episode pages.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

static SEASON_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"staffel-(\d+)").expect("valid regex"));
static EPISODE_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"episode-(\d+)").expect("valid regex"));

const REDIRECT_SEGMENT: &str = "/redirect/";

/// Language labels and the `data-lang-key` the site uses for each.
pub const LANGUAGES: [(&str, u8); 3] = [("German Dub", 1), ("German Sub", 2), ("English Sub", 3)];

pub fn language_code(label: &str) -> Option<u8> {
    let label = label.trim();
    LANGUAGES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(label))
        .map(|(_, code)| *code)
}

/// Season numbers linked from a series page, ascending and distinct.
pub fn season_numbers(html: &str) -> Vec<u32> {
    distinct_numbers(html, &SEASON_REF)
}

/// Episode numbers linked from a season page, ascending and distinct.
pub fn episode_numbers(html: &str) -> Vec<u32> {
    distinct_numbers(html, &EPISODE_REF)
}

fn distinct_numbers(html: &str, pattern: &Regex) -> Vec<u32> {
    pattern
        .captures_iter(html)
        .filter_map(|caps| caps[1].parse::<u32>().ok())
        .filter(|n| *n > 0)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Redirect link of the hoster entry tagged with `code`.
pub fn language_redirect(html: &str, code: u8) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(&format!(r#"[data-lang-key="{code}"]"#)).ok()?;
    let found = document.select(&selector).find_map(redirect_target);
    found
}

/// First redirect link anywhere on the page.
pub fn any_redirect(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"a[href*="/redirect/"]"#).ok()?;
    let found = document
        .select(&selector)
        .filter_map(|anchor| anchor.value().attr("href"))
        .map(str::to_string)
        .next();
    found
}

fn redirect_target(element: ElementRef<'_>) -> Option<String> {
    for attr in ["href", "data-link-target"] {
        if let Some(value) = element.value().attr(attr).filter(|v| is_redirect(v)) {
            return Some(value.to_string());
        }
    }
    let anchors = Selector::parse("a[href]").ok()?;
    let nested = element
        .select(&anchors)
        .filter_map(|anchor| anchor.value().attr("href"))
        .find(|href| is_redirect(href))
        .map(str::to_string);
    nested
}

fn is_redirect(href: &str) -> bool {
    href.contains(REDIRECT_SEGMENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const EPISODE_PAGE: &str = r#"
        <ul class="row">
          <li class="episodeLink1" data-lang-key="1" data-link-target="/redirect/111">
            <a class="watchEpisode" href="/redirect/111"><h4>VOE</h4></a>
          </li>
          <li class="episodeLink2" data-lang-key="3">
            <div><a href="/redirect/333" target="_blank">VOE</a></div>
          </li>
        </ul>"#;

    #[test]
    fn numbers_are_distinct_and_sorted() {
        let html = r#"<a href="episode-3"></a><a href="episode-1"></a>
                      <a href="episode-3"></a><a href="episode-2"></a><a href="episode-0"></a>"#;
        assert_eq!(episode_numbers(html), vec![1, 2, 3]);

        let html = r#"<a href="/anime/stream/x/staffel-10">10</a><a href="/anime/stream/x/staffel-2">2</a>"#;
        assert_eq!(season_numbers(html), vec![2, 10]);
        assert!(season_numbers("<html></html>").is_empty());
    }

    #[test]
    fn language_labels_map_to_site_codes() {
        assert_eq!(language_code("German Dub"), Some(1));
        assert_eq!(language_code("german sub"), Some(2));
        assert_eq!(language_code(" English Sub "), Some(3));
        assert_eq!(language_code("Klingon"), None);
    }

    #[test]
    fn redirect_found_on_attribute_or_nested_anchor() {
        assert_eq!(language_redirect(EPISODE_PAGE, 1).as_deref(), Some("/redirect/111"));
        assert_eq!(language_redirect(EPISODE_PAGE, 3).as_deref(), Some("/redirect/333"));
        assert_eq!(language_redirect(EPISODE_PAGE, 2), None);
    }

    #[test]
    fn generic_redirect_is_first_in_document() {
        assert_eq!(any_redirect(EPISODE_PAGE).as_deref(), Some("/redirect/111"));
        assert_eq!(any_redirect("<a href=\"/other\">x</a>"), None);
    }
}
