//! Declarative adapter registry.
//!
//! Builds the enabled, resilience-wrapped provider set from configuration.
//! The orchestrator only ever sees this registry; adding a provider means
//! adding an adapter module and a config entry, never touching the engine.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::cir::CirProvider;
use super::cosing::CosingProvider;
use super::ewg::EwgProvider;
use super::faers::FaersProvider;
use super::iarc::IarcProvider;
use super::iccr::IccrProvider;
use super::inci_beauty::InciBeautyProvider;
use super::invima::InvimaProvider;
use super::pubchem::PubchemProvider;
use super::sccs::SccsProvider;
use super::SourceProvider;
use crate::config::{EngineConfig, ProviderConfig};
use crate::resilience::ResilientProvider;
use crate::types::ProviderId;

/// The enabled provider set, each wrapped in its resilience stack.
#[derive(Debug)]
pub struct ProviderRegistry {
    providers: Vec<Arc<ResilientProvider>>,
}

impl ProviderRegistry {
    /// Build all enabled adapters from configuration.
    ///
    /// API keys are read from each provider's `auth_env` variable here, at
    /// construction; an absent key leaves the adapter unauthenticated
    /// rather than disabled.
    pub fn from_config(config: &EngineConfig) -> Self {
        let adapters = config
            .providers
            .iter()
            .filter(|p| p.enabled)
            .filter_map(build_adapter)
            .collect::<Vec<_>>();
        Self::wrap(config, adapters)
    }

    /// Wrap externally-constructed adapters (used by tests to substitute
    /// deterministic sources). Adapters without a config entry get defaults.
    pub fn from_adapters(config: &EngineConfig, adapters: Vec<Arc<dyn SourceProvider>>) -> Self {
        Self::wrap(config, adapters)
    }

    fn wrap(config: &EngineConfig, adapters: Vec<Arc<dyn SourceProvider>>) -> Self {
        let providers = adapters
            .into_iter()
            .map(|adapter| {
                let wrapped = match config.provider(adapter.id()) {
                    Some(provider_config) => ResilientProvider::new(adapter, provider_config),
                    None => {
                        let fallback = default_provider_config(adapter.id());
                        ResilientProvider::new(adapter, &fallback)
                    }
                };
                Arc::new(wrapped)
            })
            .collect::<Vec<_>>();
        info!(count = providers.len(), "provider registry built");
        Self { providers }
    }

    /// The wrapped providers, fan-out order.
    pub fn providers(&self) -> &[Arc<ResilientProvider>] {
        &self.providers
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether no provider is enabled.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

fn build_adapter(config: &ProviderConfig) -> Option<Arc<dyn SourceProvider>> {
    let client = http_client(config);
    let api_key = read_api_key(config);
    let base = config.base_url.clone();
    match config.id {
        ProviderId::Faers => Some(Arc::new(FaersProvider::new(base, api_key, client))),
        ProviderId::Pubchem => Some(Arc::new(PubchemProvider::new(base, client))),
        ProviderId::Ewg => Some(Arc::new(EwgProvider::new(base, client))),
        ProviderId::Cir => Some(Arc::new(CirProvider::new(base, client))),
        ProviderId::Sccs => Some(Arc::new(SccsProvider::new(base, client))),
        ProviderId::Iccr => Some(Arc::new(IccrProvider::new(base, client))),
        ProviderId::Invima => Some(Arc::new(InvimaProvider::new(base, client))),
        ProviderId::Iarc => Some(Arc::new(IarcProvider::new(base, client))),
        ProviderId::InciBeauty => Some(Arc::new(InciBeautyProvider::new(base, api_key, client))),
        ProviderId::Cosing => Some(Arc::new(CosingProvider::new(base, client))),
        // Rejected by config validation.
        ProviderId::LocalSeed => None,
    }
}

fn http_client(config: &ProviderConfig) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_millis(config.per_call_deadline_ms))
        .build()
        .unwrap_or_default()
}

fn read_api_key(config: &ProviderConfig) -> Option<String> {
    if config.auth_env.is_empty() {
        return None;
    }
    match std::env::var(&config.auth_env) {
        Ok(key) if !key.is_empty() => Some(key),
        _ => {
            info!(provider = %config.id, auth_env = %config.auth_env, "no API key set");
            None
        }
    }
}

/// Defaults for adapters injected without a config entry.
fn default_provider_config(id: ProviderId) -> ProviderConfig {
    let defaults = EngineConfig::default();
    defaults
        .provider(id)
        .cloned()
        .unwrap_or_else(|| ProviderConfig {
            id,
            enabled: true,
            base_url: String::new(),
            auth_env: String::new(),
            priority: u32::MAX,
            weight: 0.1,
            ttl_seconds: 24 * 60 * 60,
            rate_limit: crate::config::RateLimitConfig::default(),
            breaker: crate::config::BreakerConfig::default(),
            bulkhead: crate::config::BulkheadConfig::default(),
            retry: crate::config::RetryConfig::default(),
            per_call_deadline_ms: 5_000,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_builds_all_enabled_providers() {
        let config = EngineConfig::default();
        let registry = ProviderRegistry::from_config(&config);
        assert_eq!(registry.len(), 10);
    }

    #[test]
    fn test_disabled_providers_are_skipped() {
        let mut config = EngineConfig::default();
        for p in &mut config.providers {
            if p.id != ProviderId::Ewg {
                p.enabled = false;
            }
        }
        let registry = ProviderRegistry::from_config(&config);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.providers()[0].id(), ProviderId::Ewg);
    }
}
