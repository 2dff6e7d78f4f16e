//! Partition routing strategies.
//!
//! Every strategy maps a [`PartitionKey`] to the [`ConnectionDescriptor`] of
//! the partition holding it:
//!
//! - [`SinglePartitionRouter`]: one fixed target, the key is ignored
//! - [`HashPartitionRouter`]: `hash(key) mod N` over a table loaded once
//! - [`DynamicPartitionRouter`]: explicit key-to-partition assignments kept
//!   in a partition map store and cached locally
//! - [`FederationPartitionRouter`]: connects to a federation root and routes
//!   when the connection opens

pub mod dynamic;
pub mod federation;
pub mod hash;
pub mod single;

use crate::connection::{Connection, ConnectionDescriptor, ProviderRegistry};
use crate::key::PartitionKey;
use crate::Result;

pub use dynamic::DynamicPartitionRouter;
pub use federation::{FederatedConnection, FederationPartitionRouter};
pub use hash::HashPartitionRouter;
pub use single::SinglePartitionRouter;

/// Maps partition keys to storage connections.
///
/// Implementations are safe to call from many threads at once.
pub trait PartitionRouter: Send + Sync {
    /// Resolves the descriptor of the partition holding `key`.
    fn resolve(&self, key: &PartitionKey) -> Result<ConnectionDescriptor>;

    /// Creates an unopened connection for `key` through `providers`.
    fn connect(
        &self,
        key: &PartitionKey,
        providers: &ProviderRegistry,
    ) -> Result<Box<dyn Connection>> {
        let descriptor = self.resolve(key)?;
        providers.create(&descriptor)
    }
}
