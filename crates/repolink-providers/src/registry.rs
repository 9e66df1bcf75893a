//! Adapter selection by provider tag.

use crate::bitbucket::BitbucketProvider;
use crate::config::ProviderSettings;
use crate::error::Result;
use crate::gitea::GiteaProvider;
use crate::github::GithubProvider;
use crate::gitlab::GitlabProvider;
use crate::provider::GitProvider;
use repolink_types::ProviderKind;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One adapter per supported platform.
///
/// Every platform has an adapter; those without credentials are disabled
/// and fail their operations with `ProviderError::Disabled`.
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: BTreeMap<ProviderKind, Arc<dyn GitProvider>>,
}

impl ProviderRegistry {
    /// Build every adapter from `settings`.
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self> {
        let mut registry = Self::empty();
        registry.insert(Arc::new(GithubProvider::new(settings)?));
        registry.insert(Arc::new(GitlabProvider::new(settings)?));
        registry.insert(Arc::new(GiteaProvider::new(settings)?));
        registry.insert(Arc::new(BitbucketProvider::new(settings)?));
        Ok(registry)
    }

    /// A registry with no adapters.
    pub fn empty() -> Self {
        Self {
            providers: BTreeMap::new(),
        }
    }

    /// Add or replace the adapter for its platform.
    pub fn insert(&mut self, provider: Arc<dyn GitProvider>) {
        self.providers.insert(provider.kind(), provider);
    }

    /// Adapter for `kind`.
    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn GitProvider>> {
        self.providers.get(&kind).cloned()
    }

    /// Platforms whose adapters have credentials.
    pub fn enabled(&self) -> Vec<ProviderKind> {
        self.providers
            .iter()
            .filter(|(_, provider)| provider.is_enabled())
            .map(|(kind, _)| *kind)
            .collect()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("enabled", &self.enabled())
            .finish()
    }
}
