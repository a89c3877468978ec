//! VOE embed pages.
//!
//! The embed page usually bounces to a landing page through an inline
//! `window.location` script. The landing page carries the media URL in one of
//! several obfuscated shapes; they are tried oldest-format-last until one
//! yields a source.

use std::sync::{Arc, LazyLock};

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use engine_logging::engine_debug;
use regex::Regex;

use super::EmbedProvider;
use crate::{Fetcher, ProviderError};

static REDIRECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^'"<>]+"#).expect("valid regex"));
static JSON_SCRIPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<script type="application/json">([^<]+)</script>"#).expect("valid regex")
});
static BASE64_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"var a168c='([^']+)'").expect("valid regex"));
static HLS_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'hls': '(?P<hls>[^']+)'").expect("valid regex"));
static DIRECT_MEDIA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)https?://[^"']*\.(?:m3u8|mp4)[^"']*"#).expect("valid regex")
});

const JUNK_TOKENS: [&str; 7] = ["@$", "^^", "~@", "%?", "*~", "!!", "#&"];
const PLACEHOLDER: char = '_';
const GUARD_LEN: usize = 2;
const CHAR_SHIFT: u32 = 3;
const PREVIEW_SUFFIX: &str = "_storyboard_L2.jpg";

/// Accepts padded and unpadded input, like browser `atob` shims.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

type Stage = fn(&str) -> Option<String>;

const STAGES: [(&str, Stage); 4] = [
    ("json script", from_json_script),
    ("a168c variable", from_base64_variable),
    ("hls key", from_hls_key),
    ("direct media url", from_direct_url),
];

pub struct VoeProvider {
    fetcher: Arc<dyn Fetcher>,
}

impl VoeProvider {
    pub const NAME: &'static str = "voe";

    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait::async_trait]
impl EmbedProvider for VoeProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn extract_direct_link(&self, embed_url: &str) -> Result<String, ProviderError> {
        let embed = self.fetcher.fetch(embed_url, None).await?;
        let html = match find_redirect(&embed.html) {
            Some(landing) => {
                engine_debug!("voe embed {embed_url} redirects to {landing}");
                self.fetcher.fetch(&landing, Some(embed_url)).await?.html
            }
            None => embed.html,
        };
        extract_source(&html).ok_or(ProviderError::NoVideoSource)
    }

    async fn extract_preview_image(&self, embed_url: &str) -> Result<String, ProviderError> {
        let lookup = async {
            let embed = self.fetcher.fetch(embed_url, None).await?;
            let landing = find_redirect(&embed.html).ok_or(ProviderError::NoRedirect)?;
            let image = preview_url_for(&landing);
            self.fetcher.probe(&image).await?;
            Ok::<_, ProviderError>(image)
        };
        lookup
            .await
            .map_err(|err| ProviderError::NoPreview(err.to_string()))
    }
}

/// Runs every extraction stage in order and returns the first source found.
pub fn extract_source(html: &str) -> Option<String> {
    STAGES.iter().find_map(|&(label, stage)| {
        let found = stage(html);
        match &found {
            Some(_) => engine_debug!("voe source found via {label}"),
            None => engine_debug!("voe stage '{label}' found nothing"),
        }
        found
    })
}

/// `/e/<id>` landing URL to its storyboard thumbnail.
pub fn preview_url_for(landing_url: &str) -> String {
    format!("{}{PREVIEW_SUFFIX}", landing_url.replacen("/e/", "/cache/", 1))
}

fn find_redirect(html: &str) -> Option<String> {
    REDIRECT.find(html).map(|m| m.as_str().to_string())
}

fn from_json_script(html: &str) -> Option<String> {
    let payload = JSON_SCRIPT.captures(html)?.get(1)?.as_str();
    let inner = strip_guard(payload.trim())?;
    let decoded = deobfuscate(&inner)?;
    source_field(&decoded)
}

fn from_base64_variable(html: &str) -> Option<String> {
    let encoded = BASE64_VAR.captures(html)?.get(1)?.as_str();
    let decoded = decode_text(encoded)?;
    let json: String = decoded.chars().rev().collect();
    source_field(&json)
}

fn from_hls_key(html: &str) -> Option<String> {
    let encoded = HLS_KEY.captures(html)?.name("hls")?.as_str();
    decode_text(encoded).filter(|url| !url.trim().is_empty())
}

fn from_direct_url(html: &str) -> Option<String> {
    DIRECT_MEDIA.find(html).map(|m| m.as_str().to_string())
}

/// Drops the two guard characters on each end of the script payload.
fn strip_guard(payload: &str) -> Option<String> {
    let chars: Vec<char> = payload.chars().collect();
    if chars.len() <= GUARD_LEN * 2 {
        return None;
    }
    Some(chars[GUARD_LEN..chars.len() - GUARD_LEN].iter().collect())
}

/// rot13, junk tokens removed, base64, every char shifted down by three,
/// reversed, base64 again.
fn deobfuscate(encoded: &str) -> Option<String> {
    let rotated = rot13(encoded);
    let cleaned = strip_junk(&rotated);
    let first = decode_text(&cleaned)?;
    let shifted = shift_down(&first, CHAR_SHIFT)?;
    let reversed: String = shifted.chars().rev().collect();
    decode_text(&reversed)
}

fn rot13(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            'a'..='z' => rotate(c, b'a'),
            'A'..='Z' => rotate(c, b'A'),
            _ => c,
        })
        .collect()
}

fn rotate(c: char, base: u8) -> char {
    (((c as u8 - base + 13) % 26) + base) as char
}

fn strip_junk(input: &str) -> String {
    let mut out = input.to_string();
    for token in JUNK_TOKENS {
        out = out.replace(token, "_");
    }
    out.retain(|c| c != PLACEHOLDER);
    out
}

fn shift_down(input: &str, by: u32) -> Option<String> {
    input
        .chars()
        .map(|c| (c as u32).checked_sub(by).and_then(char::from_u32))
        .collect()
}

fn decode_text(encoded: &str) -> Option<String> {
    let bytes = LENIENT.decode(encoded.trim()).ok()?;
    String::from_utf8(bytes).ok()
}

fn source_field(json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(json).ok()?;
    value
        .get("source")?
        .as_str()
        .filter(|source| !source.is_empty())
        .map(str::to_string)
}
