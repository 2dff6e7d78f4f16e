//! Hash partitioning over a fixed partition table.
//!
//! The table is loaded once at construction and never changes. The partition
//! count must stay fixed for as long as data routed by it exists: changing it
//! moves keys to different partitions. Nothing here guards against building a
//! second router over a different table; keeping the count stable is the
//! deployer's responsibility.

use super::PartitionRouter;
use crate::connection::ConnectionDescriptor;
use crate::key::{PartitionKey, PartitionNumber};
use crate::store::{PartitionMapStore, StoreError, UnitOfWork};
use crate::{Error, Result};
use std::collections::HashMap;
use tracing::info;

/// Routes by `xxh3(key) mod partition_count`.
#[derive(Debug, Clone)]
pub struct HashPartitionRouter {
    partitions: HashMap<PartitionNumber, ConnectionDescriptor>,
    partition_count: u32,
}

impl HashPartitionRouter {
    /// Loads the full partition table from `store`, outside any caller
    /// transaction.
    pub fn load(store: &dyn PartitionMapStore) -> Result<Self> {
        let entries = store
            .load_all_partitions(UnitOfWork::Suppress)
            .map_err(|source| Error::Load { source })?;

        let router = Self::from_entries(
            entries
                .into_iter()
                .map(|entry| (entry.number, entry.descriptor)),
        )?;
        info!(
            partitions = router.partition_count,
            "loaded hash partition map"
        );
        Ok(router)
    }

    /// Builds a router whose partition `i` is the `i`-th descriptor.
    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = ConnectionDescriptor>,
    ) -> Result<Self> {
        Self::from_entries(
            descriptors
                .into_iter()
                .enumerate()
                .map(|(index, descriptor)| (index as PartitionNumber, descriptor)),
        )
    }

    fn from_entries(
        entries: impl IntoIterator<Item = (PartitionNumber, ConnectionDescriptor)>,
    ) -> Result<Self> {
        let mut partitions = HashMap::new();
        for (number, descriptor) in entries {
            if partitions.insert(number, descriptor).is_some() {
                return Err(Error::Load {
                    source: StoreError::DuplicatePartition(number),
                });
            }
        }

        let partition_count = u32::try_from(partitions.len())
            .map_err(|_| Error::validation("partitions", "more than u32::MAX partitions"))?;
        if partition_count == 0 {
            return Err(Error::Load {
                source: StoreError::EmptyPartitionMap,
            });
        }
        // Every hash remainder must land on a loaded partition.
        let missing = (0..partition_count).find(|number| !partitions.contains_key(number));
        if let Some(missing) = missing {
            return Err(Error::Load {
                source: StoreError::MissingPartition(missing),
            });
        }

        Ok(Self {
            partitions,
            partition_count,
        })
    }

    /// Number of partitions loaded at construction.
    pub fn partition_count(&self) -> u32 {
        self.partition_count
    }

    /// Partition number `key` hashes to.
    pub fn partition_for(&self, key: &PartitionKey) -> PartitionNumber {
        // Construction guarantees partitions 0..partition_count, with a non-zero count.
        (key.stable_hash() % u64::from(self.partition_count)) as PartitionNumber
    }

    /// Descriptor of partition `number`.
    pub fn descriptor(&self, number: PartitionNumber) -> Result<&ConnectionDescriptor> {
        self.partitions
            .get(&number)
            .ok_or(Error::PartitionNotFound(number))
    }
}

impl PartitionRouter for HashPartitionRouter {
    fn resolve(&self, key: &PartitionKey) -> Result<ConnectionDescriptor> {
        let number = self.partition_for(key);
        self.descriptor(number).cloned()
    }
}
