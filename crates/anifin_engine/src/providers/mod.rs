//! Embed providers turn an embed-page URL into a direct media URL.

mod voe;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::{DownloadError, ProviderError};

pub use voe::{extract_source, preview_url_for, VoeProvider};

#[async_trait::async_trait]
pub trait EmbedProvider: Send + Sync {
    /// Lowercase key, also matched against the host/path of resolved embed URLs.
    fn name(&self) -> &str;

    async fn extract_direct_link(&self, embed_url: &str) -> Result<String, ProviderError>;

    async fn extract_preview_image(&self, _embed_url: &str) -> Result<String, ProviderError> {
        Err(ProviderError::Unsupported(self.name().to_string()))
    }
}

/// Name to provider map. The first registered provider becomes the default.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn EmbedProvider>>,
    default: Option<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn EmbedProvider>) {
        let key = provider.name().to_ascii_lowercase();
        if self.default.is_none() {
            self.default = Some(key.clone());
        }
        self.providers.insert(key, provider);
    }

    pub fn set_default(&mut self, name: &str) -> Result<(), DownloadError> {
        let key = name.to_ascii_lowercase();
        if !self.providers.contains_key(&key) {
            return Err(DownloadError::ProviderNotFound(name.to_string()));
        }
        self.default = Some(key);
        Ok(())
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// Looks up `name`, or the default when `None`.
    pub fn resolve(&self, name: Option<&str>) -> Result<Arc<dyn EmbedProvider>, DownloadError> {
        let requested = match name {
            Some(name) => name.to_string(),
            None => self
                .default
                .clone()
                .ok_or_else(|| DownloadError::ProviderNotFound("<default>".to_string()))?,
        };
        self.providers
            .get(&requested.to_ascii_lowercase())
            .cloned()
            .ok_or(DownloadError::ProviderNotFound(requested))
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .field("default", &self.default)
            .finish()
    }
}
