//! Dynamic key-map partitioning.
//!
//! Keys are assigned to partitions explicitly and the assignment is kept in a
//! [`PartitionMapStore`]. Two local caches sit in front of the store: key to
//! partition number, and partition number to descriptor. Both are populated on
//! first use and never invalidated, because an assignment is permanent once
//! made. The store stays authoritative.
//!
//! Every store call runs in [`UnitOfWork::RequiresNew`], so an assignment
//! commits even if the caller later rolls back its own unrelated work.

use super::PartitionRouter;
use crate::cache::OnceMap;
use crate::connection::ConnectionDescriptor;
use crate::key::{PartitionKey, PartitionNumber};
use crate::store::{PartitionKind, PartitionMapStore, UnitOfWork};
use crate::{Error, Result};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Routes through explicit, persisted key-to-partition assignments.
pub struct DynamicPartitionRouter {
    store: Arc<dyn PartitionMapStore>,
    keys: OnceMap<PartitionKey, PartitionNumber>,
    descriptors: OnceMap<PartitionNumber, ConnectionDescriptor>,
}

impl DynamicPartitionRouter {
    pub fn new(store: Arc<dyn PartitionMapStore>) -> Self {
        Self {
            store,
            keys: OnceMap::new(),
            descriptors: OnceMap::new(),
        }
    }

    /// Returns the partition `key` belongs to, auto-assigning it on first
    /// sight. Concurrent first lookups of the same key reach the store once.
    pub fn partition_for(&self, key: &PartitionKey) -> Result<PartitionNumber> {
        self.keys.get_or_try_insert_with(key, || {
            debug!(%key, "partition key cache miss");
            self.store
                .get_or_auto_assign_partition(key, UnitOfWork::RequiresNew)
                .map_err(|source| Error::partition("get_or_auto_assign_partition", source))
        })
    }

    /// Returns the descriptor of partition `number`, reading it from the
    /// store on first use.
    pub fn descriptor_for(&self, number: PartitionNumber) -> Result<ConnectionDescriptor> {
        self.descriptors.get_or_try_insert_with(&number, || {
            debug!(partition = number, "partition descriptor cache miss");
            self.store
                .connection_descriptor(number, UnitOfWork::RequiresNew)
                .map_err(|source| Error::partition("connection_descriptor", source))
        })
    }

    /// Registers a partition that only receives keys through
    /// [`add_key_to_manual_partition`](Self::add_key_to_manual_partition).
    pub fn add_new_manual_partition(
        &self,
        number: i64,
        descriptor: Option<&ConnectionDescriptor>,
    ) -> Result<()> {
        self.add_partition(number, descriptor, PartitionKind::Manual)
    }

    /// Registers a partition eligible for automatic key assignment.
    pub fn add_new_auto_assign_partition(
        &self,
        number: i64,
        descriptor: Option<&ConnectionDescriptor>,
    ) -> Result<()> {
        self.add_partition(number, descriptor, PartitionKind::AutoAssign)
    }

    /// Assigns `key` to the manual partition `number`, bypassing
    /// auto-assignment.
    pub fn add_key_to_manual_partition(&self, number: i64, key: &PartitionKey) -> Result<()> {
        let number = validate_partition_number(number)?;

        self.store
            .add_key_to_manual_partition(number, key, UnitOfWork::RequiresNew)
            .map_err(|source| Error::partition("add_key_to_manual_partition", source))?;
        info!(%key, partition = number, "key added to manual partition");
        Ok(())
    }

    /// Number of keys resolved through this router so far.
    pub fn cached_keys(&self) -> usize {
        self.keys.len()
    }

    /// Number of partition descriptors resolved through this router so far.
    pub fn cached_partitions(&self) -> usize {
        self.descriptors.len()
    }

    fn add_partition(
        &self,
        number: i64,
        descriptor: Option<&ConnectionDescriptor>,
        kind: PartitionKind,
    ) -> Result<()> {
        let number = validate_partition_number(number)?;
        let descriptor =
            descriptor.ok_or_else(|| Error::validation("descriptor", "must be provided"))?;

        self.store
            .add_partition(number, descriptor, kind, UnitOfWork::RequiresNew)
            .map_err(|source| Error::partition("add_partition", source))?;
        info!(partition = number, ?kind, "partition added");
        Ok(())
    }
}

fn validate_partition_number(number: i64) -> Result<PartitionNumber> {
    if number < 0 {
        return Err(Error::validation(
            "number",
            format!("partition number {} is negative", number),
        ));
    }
    PartitionNumber::try_from(number).map_err(|_| {
        Error::validation(
            "number",
            format!("partition number {} exceeds {}", number, PartitionNumber::MAX),
        )
    })
}

impl PartitionRouter for DynamicPartitionRouter {
    fn resolve(&self, key: &PartitionKey) -> Result<ConnectionDescriptor> {
        let number = self.partition_for(key)?;
        self.descriptor_for(number)
    }
}

impl fmt::Debug for DynamicPartitionRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicPartitionRouter")
            .field("keys", &self.keys)
            .field("descriptors", &self.descriptors)
            .finish()
    }
}
