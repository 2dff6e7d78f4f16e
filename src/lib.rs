//! Partition-key routing for multi-database applications.
//!
//! A [`PartitionRouter`] maps a [`PartitionKey`] to the connection of the
//! partition holding it. Four strategies are provided:
//!
//! - [`SinglePartitionRouter`]: everything lives in one database.
//! - [`HashPartitionRouter`]: `hash(key) mod N` over a table loaded once.
//! - [`DynamicPartitionRouter`]: key assignments persisted in a
//!   [`PartitionMapStore`] and cached after the first lookup.
//! - [`FederationPartitionRouter`]: one root connection that is bound to the
//!   right member each time it opens.
//!
//! [`PartitionProxy`] pairs a router with a [`PartitionKeyProvider`], and
//! [`PartitionRegistry`] holds the proxy an application is currently using.

pub mod cache;
pub mod config;
pub mod connection;
pub mod encoding;
pub mod error;
pub mod key;
pub mod proxy;
pub mod registry;
pub mod router;
pub mod store;

// Re-export common types for convenience
pub use config::RegistryConfig;
pub use connection::{Connection, ConnectionDescriptor, ConnectionError, ProviderRegistry};
pub use error::{Error, Result};
pub use key::{PartitionKey, PartitionNumber};
pub use proxy::{FixedKeyProvider, PartitionKeyProvider, PartitionProxy, ScopedKeyProvider};
pub use registry::PartitionRegistry;
pub use router::{
    DynamicPartitionRouter, FederationPartitionRouter, HashPartitionRouter, PartitionRouter,
    SinglePartitionRouter,
};
pub use store::{
    PartitionKind, PartitionMapStore, RedbPartitionMapStore, StoreError, UnitOfWork,
};
