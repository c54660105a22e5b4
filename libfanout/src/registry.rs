//! Platform identifier to adapter mapping

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::PlatformsConfig;
use crate::error::{FanoutError, Result};
use crate::platforms::facebook::FacebookAdapter;
use crate::platforms::instagram::InstagramAdapter;
use crate::platforms::linkedin::LinkedInAdapter;
use crate::platforms::youtube::YouTubeAdapter;
use crate::platforms::PlatformAdapter;
use crate::types::Credential;

/// Builds an adapter for one account's credential
pub type AdapterFactory = Arc<dyn Fn(&Credential) -> Box<dyn PlatformAdapter> + Send + Sync>;

/// Maps lowercase platform identifiers to adapter factories.
///
/// Platform-wide settings (page tokens, business ids, API base URLs) are
/// captured by the factories when the registry is built, so resolving an
/// adapter only needs the account's own credential.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    factories: BTreeMap<String, AdapterFactory>,
}

impl AdapterRegistry {
    /// Empty registry; every lookup fails until something is registered
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the four built-in platforms
    pub fn from_config(config: &PlatformsConfig) -> Self {
        let mut registry = Self::new();

        let facebook = config.facebook.clone();
        registry.register(
            "facebook",
            Arc::new(move |credential: &Credential| {
                Box::new(FacebookAdapter::new(&facebook, credential)) as Box<dyn PlatformAdapter>
            }),
        );

        let instagram = config.instagram.clone();
        registry.register(
            "instagram",
            Arc::new(move |credential: &Credential| {
                Box::new(InstagramAdapter::new(&instagram, credential)) as Box<dyn PlatformAdapter>
            }),
        );

        let linkedin = config.linkedin.clone();
        registry.register(
            "linkedin",
            Arc::new(move |credential: &Credential| {
                Box::new(LinkedInAdapter::new(&linkedin, credential)) as Box<dyn PlatformAdapter>
            }),
        );

        let youtube = config.youtube.clone();
        registry.register(
            "youtube",
            Arc::new(move |credential: &Credential| {
                Box::new(YouTubeAdapter::new(&youtube, credential)) as Box<dyn PlatformAdapter>
            }),
        );

        registry
    }

    /// Add or replace the factory for `platform`
    pub fn register(&mut self, platform: &str, factory: AdapterFactory) {
        self.factories
            .insert(platform.trim().to_lowercase(), factory);
    }

    /// Build the adapter for `platform` (case-insensitive)
    pub fn resolve(
        &self,
        platform: &str,
        credential: &Credential,
    ) -> Result<Box<dyn PlatformAdapter>> {
        let key = platform.trim().to_lowercase();
        self.factories
            .get(&key)
            .map(|factory| factory(credential))
            .ok_or_else(|| FanoutError::UnsupportedPlatform(platform.to_string()))
    }

    pub fn supports(&self, platform: &str) -> bool {
        self.factories.contains_key(&platform.trim().to_lowercase())
    }

    /// Registered identifiers, sorted
    pub fn platforms(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }
}
