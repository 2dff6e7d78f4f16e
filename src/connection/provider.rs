//! Provider-name to connection-factory lookup.

use super::{Connection, ConnectionDescriptor, ConnectionError};
use crate::{Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Creates unopened physical connections for one provider.
pub trait ConnectionFactory: Send + Sync {
    fn create(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> std::result::Result<Box<dyn Connection>, ConnectionError>;
}

/// Registry of connection factories keyed by provider name.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: RwLock<HashMap<String, Arc<dyn ConnectionFactory>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under `provider`, returning the factory it replaced.
    pub fn register(
        &self,
        provider: impl Into<String>,
        factory: Arc<dyn ConnectionFactory>,
    ) -> Option<Arc<dyn ConnectionFactory>> {
        let provider = provider.into();
        debug!(provider = %provider, "registering connection provider");
        self.factories.write().insert(provider, factory)
    }

    pub fn contains(&self, provider: &str) -> bool {
        self.factories.read().contains_key(provider)
    }

    /// Creates an unopened connection for `descriptor`.
    pub fn create(&self, descriptor: &ConnectionDescriptor) -> Result<Box<dyn Connection>> {
        let factory = self
            .factories
            .read()
            .get(descriptor.provider())
            .cloned()
            .ok_or_else(|| Error::UnknownProvider(descriptor.provider().to_string()))?;

        Ok(factory.create(descriptor)?)
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut providers: Vec<String> = self.factories.read().keys().cloned().collect();
        providers.sort();
        f.debug_struct("ProviderRegistry")
            .field("providers", &providers)
            .finish()
    }
}
