//! Replaceable, process-wide partition proxy.
//!
//! A [`PartitionRegistry`] always yields a proxy: when none has been set it
//! lazily builds one that sends every caller to the configured default
//! connection. Setting `None` goes back to that lazy default.
//!
//! Applications construct a registry at their composition root and either pass
//! it around or install it once with [`install_global`].

use crate::config::RegistryConfig;
use crate::connection::{ConnectionDescriptor, ProviderRegistry};
use crate::proxy::{FixedKeyProvider, PartitionProxy};
use crate::router::SinglePartitionRouter;
use crate::Result;
use parking_lot::RwLock;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

pub struct PartitionRegistry {
    current: RwLock<Option<Arc<PartitionProxy>>>,
    default_descriptor: ConnectionDescriptor,
    providers: Arc<ProviderRegistry>,
}

impl PartitionRegistry {
    pub fn new(default_descriptor: ConnectionDescriptor, providers: Arc<ProviderRegistry>) -> Self {
        Self {
            current: RwLock::new(None),
            default_descriptor,
            providers,
        }
    }

    pub fn from_config(config: &RegistryConfig, providers: Arc<ProviderRegistry>) -> Result<Self> {
        Ok(Self::new(config.descriptor()?, providers))
    }

    /// Returns the current proxy, building the default one on first use.
    pub fn proxy(&self) -> Arc<PartitionProxy> {
        if let Some(proxy) = self.current.read().as_ref() {
            return Arc::clone(proxy);
        }

        let mut current = self.current.write();
        let proxy = current.get_or_insert_with(|| {
            debug!(default = %self.default_descriptor, "building default partition proxy");
            Arc::new(self.default_proxy())
        });
        Arc::clone(proxy)
    }

    /// Replaces the current proxy. `None` restores the lazy default.
    pub fn set_proxy(&self, proxy: Option<Arc<PartitionProxy>>) {
        info!(explicit = proxy.is_some(), "replacing partition proxy");
        *self.current.write() = proxy;
    }

    /// Drops the current proxy so the next read rebuilds the default.
    pub fn reset(&self) {
        self.set_proxy(None);
    }

    pub fn providers(&self) -> &Arc<ProviderRegistry> {
        &self.providers
    }

    fn default_proxy(&self) -> PartitionProxy {
        PartitionProxy::new(
            Arc::new(FixedKeyProvider::unpartitioned()),
            Arc::new(SinglePartitionRouter::new(self.default_descriptor.clone())),
            Arc::clone(&self.providers),
        )
    }
}

static GLOBAL: OnceLock<PartitionRegistry> = OnceLock::new();

/// Installs the process-wide registry. Fails, handing `registry` back, if one
/// is already installed.
pub fn install_global(registry: PartitionRegistry) -> std::result::Result<(), PartitionRegistry> {
    GLOBAL.set(registry)?;
    info!("installed global partition registry");
    Ok(())
}

/// The process-wide registry, if one has been installed.
pub fn global() -> Option<&'static PartitionRegistry> {
    GLOBAL.get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::MemoryProvider;
    use crate::key::PartitionKey;
    use crate::proxy::ScopedKeyProvider;
    use crate::router::HashPartitionRouter;

    fn descriptor(name: &str) -> ConnectionDescriptor {
        ConnectionDescriptor::new("memory", format!("db={}", name)).unwrap()
    }

    fn registry() -> PartitionRegistry {
        let providers = ProviderRegistry::new();
        providers.register("memory", Arc::new(MemoryProvider::new()));
        PartitionRegistry::new(descriptor("default"), Arc::new(providers))
    }

    #[test]
    fn test_default_proxy_is_built_lazily_and_reused() {
        let registry = registry();
        let first = registry.proxy();
        let second = registry.proxy();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.descriptor().unwrap(), descriptor("default"));
        assert_eq!(first.connection().unwrap().descriptor(), &descriptor("default"));
    }

    #[test]
    fn test_set_and_reset() {
        let registry = registry();
        let router = HashPartitionRouter::from_descriptors(["a", "b"].map(descriptor)).unwrap();
        let custom = Arc::new(PartitionProxy::new(
            Arc::new(ScopedKeyProvider),
            Arc::new(router),
            Arc::clone(registry.providers()),
        ));

        registry.set_proxy(Some(Arc::clone(&custom)));
        assert!(Arc::ptr_eq(&registry.proxy(), &custom));

        registry.set_proxy(None);
        let restored = registry.proxy();
        assert!(!Arc::ptr_eq(&restored, &custom));
        assert_eq!(restored.descriptor().unwrap(), descriptor("default"));

        registry.reset();
        assert!(!Arc::ptr_eq(&registry.proxy(), &restored));
    }

    #[test]
    fn test_from_config() {
        let config = RegistryConfig::new("memory", "db=configured");
        let registry =
            PartitionRegistry::from_config(&config, Arc::new(ProviderRegistry::new())).unwrap();
        assert_eq!(
            registry.proxy().descriptor().unwrap(),
            descriptor("configured")
        );

        let bad = RegistryConfig::new("memory", "");
        assert!(PartitionRegistry::from_config(&bad, Arc::new(ProviderRegistry::new())).is_err());
    }

    #[test]
    fn test_global_install_once() {
        assert!(install_global(registry()).is_ok());
        assert!(global().is_some());
        assert!(install_global(registry()).is_err());

        let _scope = ScopedKeyProvider::enter(PartitionKey::Int(1));
        assert_eq!(
            global().unwrap().proxy().descriptor().unwrap(),
            descriptor("default")
        );
    }
}
