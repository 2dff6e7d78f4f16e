//! Composition of "who is calling" with "where does that map to".
//!
//! A [`PartitionKeyProvider`] supplies the key for the current call context;
//! a [`PartitionProxy`] feeds it to a router and opens the resulting
//! connection through a [`ProviderRegistry`].

use crate::connection::{Connection, ConnectionDescriptor, ProviderRegistry};
use crate::key::PartitionKey;
use crate::router::PartitionRouter;
use crate::{Error, Result};
use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::trace;

/// Supplies the partition key of the current call context.
///
/// What "current" means (thread, request, session) is up to the implementor.
pub trait PartitionKeyProvider: Send + Sync {
    fn partition_key(&self) -> Result<PartitionKey>;
}

/// Always returns the same key.
#[derive(Debug, Clone)]
pub struct FixedKeyProvider {
    key: PartitionKey,
}

impl FixedKeyProvider {
    pub fn new(key: PartitionKey) -> Self {
        Self { key }
    }

    /// Provider for applications that do not partition.
    pub fn unpartitioned() -> Self {
        Self::new(PartitionKey::unpartitioned())
    }
}

impl PartitionKeyProvider for FixedKeyProvider {
    fn partition_key(&self) -> Result<PartitionKey> {
        Ok(self.key.clone())
    }
}

thread_local! {
    static SCOPED_KEY: RefCell<Option<PartitionKey>> = RefCell::new(None);
}

/// Reads the key set for the current thread with [`ScopedKeyProvider::enter`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopedKeyProvider;

impl ScopedKeyProvider {
    /// Makes `key` current on this thread until the returned guard drops,
    /// after which the previously current key (if any) is restored.
    pub fn enter(key: PartitionKey) -> KeyScope {
        let previous = SCOPED_KEY.with(|slot| slot.borrow_mut().replace(key));
        KeyScope {
            previous,
            _thread_bound: PhantomData,
        }
    }

    pub fn current() -> Option<PartitionKey> {
        SCOPED_KEY.with(|slot| slot.borrow().clone())
    }
}

impl PartitionKeyProvider for ScopedKeyProvider {
    fn partition_key(&self) -> Result<PartitionKey> {
        Self::current().ok_or(Error::NoPartitionKey)
    }
}

/// Guard returned by [`ScopedKeyProvider::enter`].
#[must_use = "the key is only current while the guard is alive"]
pub struct KeyScope {
    previous: Option<PartitionKey>,
    _thread_bound: PhantomData<*const ()>,
}

impl Drop for KeyScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        SCOPED_KEY.with(|slot| *slot.borrow_mut() = previous);
    }
}

/// Resolves connections for whoever is calling now.
pub struct PartitionProxy {
    key_provider: Arc<dyn PartitionKeyProvider>,
    router: Arc<dyn PartitionRouter>,
    providers: Arc<ProviderRegistry>,
}

impl PartitionProxy {
    pub fn new(
        key_provider: Arc<dyn PartitionKeyProvider>,
        router: Arc<dyn PartitionRouter>,
        providers: Arc<ProviderRegistry>,
    ) -> Self {
        Self {
            key_provider,
            router,
            providers,
        }
    }

    /// Creates an unopened connection to the current caller's partition.
    pub fn connection(&self) -> Result<Box<dyn Connection>> {
        let key = self.key_provider.partition_key()?;
        trace!(%key, "routing connection for current partition key");
        self.router.connect(&key, &self.providers)
    }

    /// Resolves the current caller's partition descriptor.
    pub fn descriptor(&self) -> Result<ConnectionDescriptor> {
        let key = self.key_provider.partition_key()?;
        self.router.resolve(&key)
    }

    pub fn key_provider(&self) -> &Arc<dyn PartitionKeyProvider> {
        &self.key_provider
    }

    pub fn router(&self) -> &Arc<dyn PartitionRouter> {
        &self.router
    }

    pub fn providers(&self) -> &Arc<ProviderRegistry> {
        &self.providers
    }
}

impl fmt::Debug for PartitionProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionProxy")
            .field("providers", &self.providers)
            .finish_non_exhaustive()
    }
}
