//! Provider Registry
//!
//! Owns the provider adapter instances and their lifecycle: construction
//! from descriptors at startup, independent health probes, and best-effort
//! shutdown.
//!
//! Construction dispatches on the closed [`ProviderKind`] enum — one match
//! arm per adapter constructor, so there is no string-keyed instantiation
//! to fail at runtime.

use std::collections::HashMap;
use std::sync::Arc;

use super::config::{ProviderDescriptor, ProviderKind};
use super::error::RouterError;
use crate::provider::{HostedProvider, LmStudioProvider, OllamaProvider, Provider, ProviderError};

/// Registry of initialized provider adapters, immutable after
/// [`ProviderRegistry::initialize`].
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn Provider>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ProviderRegistry {
    /// Instantiate one adapter per descriptor. A single adapter's failure
    /// to construct is logged and that provider excluded; initialization
    /// fails only when no adapter survives.
    pub fn initialize(descriptors: &[ProviderDescriptor]) -> Result<Self, RouterError> {
        let mut providers: HashMap<ProviderKind, Arc<dyn Provider>> = HashMap::new();

        for descriptor in descriptors {
            if providers.contains_key(&descriptor.kind) {
                tracing::warn!(provider = %descriptor.kind, "duplicate descriptor ignored");
                continue;
            }
            match Self::construct(descriptor) {
                Ok(provider) => {
                    tracing::info!(
                        provider = %descriptor.kind,
                        model = %descriptor.model,
                        "initialized provider"
                    );
                    providers.insert(descriptor.kind, provider);
                }
                Err(e) => {
                    let err = RouterError::ProviderInit {
                        provider: descriptor.kind,
                        message: e.to_string(),
                    };
                    tracing::warn!(error = %err, "excluding provider");
                }
            }
        }

        if providers.is_empty() {
            return Err(RouterError::NoProviders);
        }

        Ok(Self { providers })
    }

    /// Factory dispatch from the closed kind enumeration to the concrete
    /// adapter constructor.
    fn construct(descriptor: &ProviderDescriptor) -> Result<Arc<dyn Provider>, ProviderError> {
        Ok(match descriptor.kind {
            ProviderKind::Ollama => Arc::new(OllamaProvider::from_descriptor(descriptor)?),
            ProviderKind::LmStudio => Arc::new(LmStudioProvider::from_descriptor(descriptor)?),
            ProviderKind::Hosted => Arc::new(HostedProvider::from_descriptor(descriptor)?),
        })
    }

    /// Build a registry directly from adapter instances. Used by tests and
    /// embedders that bring their own [`Provider`] implementations.
    pub fn from_providers(providers: Vec<Arc<dyn Provider>>) -> Result<Self, RouterError> {
        if providers.is_empty() {
            return Err(RouterError::NoProviders);
        }
        let providers = providers.into_iter().map(|p| (p.kind(), p)).collect();
        Ok(Self { providers })
    }

    /// Look up a provider by kind.
    #[must_use]
    pub fn get(&self, kind: ProviderKind) -> Option<&Arc<dyn Provider>> {
        self.providers.get(&kind)
    }

    /// Kinds present in the registry.
    #[must_use]
    pub fn kinds(&self) -> Vec<ProviderKind> {
        self.providers.keys().copied().collect()
    }

    /// Number of initialized providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the registry holds no providers. Unreachable after a
    /// successful `initialize`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Probe every provider independently. Probe errors are swallowed into
    /// `false`; this never fails.
    pub async fn health_check(&self) -> HashMap<ProviderKind, bool> {
        let mut results = HashMap::new();
        for (kind, provider) in &self.providers {
            let healthy = match provider.health_check().await {
                Ok(()) => true,
                Err(e) => {
                    tracing::debug!(provider = %kind, error = %e, "health probe failed");
                    false
                }
            };
            results.insert(*kind, healthy);
        }
        results
    }

    /// Close every provider best-effort. Individual failures are logged,
    /// never propagated.
    pub async fn shutdown(&self) {
        for (kind, provider) in &self.providers {
            provider.shutdown().await;
            tracing::debug!(provider = %kind, "provider closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::test_utils::MockProvider;

    #[test]
    fn test_initialize_excludes_failed_provider() {
        // Hosted with an unset key env fails construction; the locals survive
        let descriptors = vec![
            ProviderDescriptor::new(ProviderKind::Ollama, "http://localhost:11434", "llama3.2"),
            ProviderDescriptor::new(ProviderKind::Hosted, "https://api.example.com", "sonnet")
                .with_api_key_env("QUILL_TEST_KEY_REGISTRY_UNSET"),
        ];

        let registry = ProviderRegistry::initialize(&descriptors).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.get(ProviderKind::Ollama).is_some());
        assert!(registry.get(ProviderKind::Hosted).is_none());
    }

    #[test]
    fn test_initialize_fatal_only_when_empty() {
        let descriptors = vec![ProviderDescriptor::new(
            ProviderKind::Hosted,
            "https://api.example.com",
            "sonnet",
        )
        .with_api_key_env("QUILL_TEST_KEY_REGISTRY_UNSET")];

        let err = ProviderRegistry::initialize(&descriptors).unwrap_err();
        assert!(matches!(err, RouterError::NoProviders));
    }

    #[test]
    fn test_duplicate_descriptor_keeps_first() {
        let descriptors = vec![
            ProviderDescriptor::new(ProviderKind::Ollama, "http://localhost:11434", "first"),
            ProviderDescriptor::new(ProviderKind::Ollama, "http://localhost:11434", "second"),
        ];

        let registry = ProviderRegistry::initialize(&descriptors).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get(ProviderKind::Ollama).unwrap().model_name(),
            "first"
        );
    }

    #[tokio::test]
    async fn test_health_check_maps_probe_failure_to_false() {
        let healthy = MockProvider::new(ProviderKind::Ollama).succeeding("ok");
        let unhealthy = MockProvider::new(ProviderKind::LmStudio)
            .succeeding("ok")
            .unhealthy();

        let registry =
            ProviderRegistry::from_providers(vec![Arc::new(healthy), Arc::new(unhealthy)]).unwrap();

        let results = registry.health_check().await;
        assert!(results[&ProviderKind::Ollama]);
        assert!(!results[&ProviderKind::LmStudio]);
    }

    #[test]
    fn test_from_providers_rejects_empty() {
        let err = ProviderRegistry::from_providers(Vec::new()).unwrap_err();
        assert!(matches!(err, RouterError::NoProviders));
    }
}
