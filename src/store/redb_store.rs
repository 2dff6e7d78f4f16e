//! redb-backed partition map store.
//!
//! Three tables hold the map:
//! - partitions: partition number -> encoded [`PartitionRecord`]
//! - keys: encoded partition key -> partition number
//! - key counts: partition number -> number of keys assigned
//!
//! redb transactions are always owned by the call that opens them, so both
//! [`UnitOfWork`] modes run in a transaction private to the call. Mutations
//! commit before returning.

use super::{
    PartitionEntry, PartitionKind, PartitionMapStore, StoreError, StoreResult, UnitOfWork,
};
use crate::connection::ConnectionDescriptor;
use crate::encoding::key::decode_partition_key;
use crate::encoding::record::PartitionRecord;
use crate::key::{PartitionKey, PartitionNumber};
use redb::{Database, ReadableDatabase, ReadableTable, Table, TableDefinition};
use std::path::Path;
use tracing::{debug, info, trace};

const PARTITIONS: TableDefinition<u32, &[u8]> = TableDefinition::new("partition_map_partitions");
const KEYS: TableDefinition<&[u8], u32> = TableDefinition::new("partition_map_keys");
const KEY_COUNTS: TableDefinition<u32, u64> = TableDefinition::new("partition_map_key_counts");

/// Durable [`PartitionMapStore`] over a redb database.
///
/// The store owns its database exclusively and never hands it out. redb
/// serializes write transactions per database, so an application write
/// transaction on the map database would stall every assignment behind it.
/// Keep application data in a separate database.
pub struct RedbPartitionMapStore {
    db: Database,
}

impl RedbPartitionMapStore {
    /// Opens or creates the database at `path`.
    pub fn create(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db = Database::create(path)?;
        Self::from_database(db)
    }

    /// Wraps an existing database, creating the partition map tables if missing.
    pub fn from_database(db: Database) -> StoreResult<Self> {
        let txn = db.begin_write()?;
        {
            txn.open_table(PARTITIONS)?;
            txn.open_table(KEYS)?;
            txn.open_table(KEY_COUNTS)?;
        }
        txn.commit()?;
        Ok(Self { db })
    }

    /// Every partition in number order.
    pub fn partitions(&self) -> StoreResult<Vec<PartitionEntry>> {
        self.load_all_partitions(UnitOfWork::Suppress)
    }

    /// Returns the partition `key` is assigned to without assigning it.
    pub fn assigned_partition(&self, key: &PartitionKey) -> StoreResult<Option<PartitionNumber>> {
        let encoded = key.to_bytes();
        let txn = self.db.begin_read()?;
        let keys = txn.open_table(KEYS)?;
        let partition = keys.get(encoded.as_slice())?.map(|guard| guard.value());
        Ok(partition)
    }

    /// Keys assigned to partition `number`, in encoded-key order.
    pub fn keys_in_partition(&self, number: PartitionNumber) -> StoreResult<Vec<PartitionKey>> {
        let txn = self.db.begin_read()?;
        let keys = txn.open_table(KEYS)?;

        let mut assigned = Vec::new();
        for entry in keys.iter()? {
            let (key, partition) = entry?;
            if partition.value() == number {
                assigned.push(decode_partition_key(key.value())?);
            }
        }
        Ok(assigned)
    }

    /// Number of keys assigned to partition `number`.
    pub fn key_count(&self, number: PartitionNumber) -> StoreResult<u64> {
        let txn = self.db.begin_read()?;
        let partitions = txn.open_table(PARTITIONS)?;
        if partitions.get(number)?.is_none() {
            return Err(StoreError::UnknownPartition(number));
        }
        let counts = txn.open_table(KEY_COUNTS)?;
        let count = counts.get(number)?.map(|guard| guard.value()).unwrap_or(0);
        Ok(count)
    }
}

/// Picks the auto-assign partition with the fewest keys; lowest number wins ties.
fn select_auto_assign_partition(
    partitions: &Table<'_, u32, &'static [u8]>,
    counts: &Table<'_, u32, u64>,
) -> StoreResult<PartitionNumber> {
    let mut best: Option<(u64, PartitionNumber)> = None;

    for entry in partitions.iter()? {
        let (number, record) = entry?;
        let number = number.value();
        let record = PartitionRecord::decode(record.value())?;
        if record.kind != PartitionKind::AutoAssign {
            continue;
        }

        let count = counts.get(number)?.map(|guard| guard.value()).unwrap_or(0);
        match best {
            Some((best_count, _)) if best_count <= count => {}
            _ => best = Some((count, number)),
        }
    }

    best.map(|(_, number)| number)
        .ok_or(StoreError::NoAutoAssignPartition)
}

fn increment_count(counts: &mut Table<'_, u32, u64>, number: PartitionNumber) -> StoreResult<()> {
    let current = counts.get(number)?.map(|guard| guard.value()).unwrap_or(0);
    counts.insert(number, current + 1)?;
    Ok(())
}

impl PartitionMapStore for RedbPartitionMapStore {
    fn load_all_partitions(&self, uow: UnitOfWork) -> StoreResult<Vec<PartitionEntry>> {
        trace!(?uow, "loading partition table");
        let txn = self.db.begin_read()?;
        let partitions = txn.open_table(PARTITIONS)?;

        let mut entries = Vec::new();
        for entry in partitions.iter()? {
            let (number, record) = entry?;
            let record = PartitionRecord::decode(record.value())?;
            entries.push(PartitionEntry {
                number: number.value(),
                kind: record.kind,
                descriptor: record.descriptor,
            });
        }
        Ok(entries)
    }

    fn get_or_auto_assign_partition(
        &self,
        key: &PartitionKey,
        uow: UnitOfWork,
    ) -> StoreResult<PartitionNumber> {
        if let Some(partition) = self.assigned_partition(key)? {
            return Ok(partition);
        }

        // Writers are serialized by redb, so re-checking inside the write
        // transaction makes the assignment atomic.
        let encoded = key.to_bytes();
        let txn = self.db.begin_write()?;
        let (partition, assigned) = {
            let mut keys = txn.open_table(KEYS)?;
            let existing = keys.get(encoded.as_slice())?.map(|guard| guard.value());
            match existing {
                Some(partition) => (partition, false),
                None => {
                    let partitions = txn.open_table(PARTITIONS)?;
                    let mut counts = txn.open_table(KEY_COUNTS)?;
                    let partition = select_auto_assign_partition(&partitions, &counts)?;
                    keys.insert(encoded.as_slice(), partition)?;
                    increment_count(&mut counts, partition)?;
                    (partition, true)
                }
            }
        };
        txn.commit()?;

        if assigned {
            debug!(%key, partition, ?uow, "auto-assigned partition key");
        }
        Ok(partition)
    }

    fn connection_descriptor(
        &self,
        partition: PartitionNumber,
        uow: UnitOfWork,
    ) -> StoreResult<ConnectionDescriptor> {
        trace!(partition, ?uow, "reading partition descriptor");
        let txn = self.db.begin_read()?;
        let partitions = txn.open_table(PARTITIONS)?;
        let record = match partitions.get(partition)? {
            Some(guard) => PartitionRecord::decode(guard.value())?,
            None => return Err(StoreError::UnknownPartition(partition)),
        };
        Ok(record.descriptor)
    }

    fn add_partition(
        &self,
        number: PartitionNumber,
        descriptor: &ConnectionDescriptor,
        kind: PartitionKind,
        uow: UnitOfWork,
    ) -> StoreResult<()> {
        let encoded = PartitionRecord::new(kind, descriptor.clone()).encode()?;

        let txn = self.db.begin_write()?;
        {
            let mut partitions = txn.open_table(PARTITIONS)?;
            if partitions.get(number)?.is_some() {
                return Err(StoreError::DuplicatePartition(number));
            }
            partitions.insert(number, encoded.as_slice())?;

            let mut counts = txn.open_table(KEY_COUNTS)?;
            counts.insert(number, 0u64)?;
        }
        txn.commit()?;

        info!(number, ?kind, provider = descriptor.provider(), ?uow, "added partition");
        Ok(())
    }

    fn add_key_to_manual_partition(
        &self,
        number: PartitionNumber,
        key: &PartitionKey,
        uow: UnitOfWork,
    ) -> StoreResult<()> {
        let encoded = key.to_bytes();

        let txn = self.db.begin_write()?;
        let assigned = {
            let partitions = txn.open_table(PARTITIONS)?;
            let record = match partitions.get(number)? {
                Some(guard) => PartitionRecord::decode(guard.value())?,
                None => return Err(StoreError::UnknownPartition(number)),
            };
            if record.kind != PartitionKind::Manual {
                return Err(StoreError::NotManualPartition(number));
            }

            let mut keys = txn.open_table(KEYS)?;
            let existing = keys.get(encoded.as_slice())?.map(|guard| guard.value());
            match existing {
                Some(partition) if partition == number => false,
                Some(partition) => {
                    return Err(StoreError::KeyAlreadyAssigned {
                        key: key.clone(),
                        partition,
                    })
                }
                None => {
                    keys.insert(encoded.as_slice(), number)?;
                    let mut counts = txn.open_table(KEY_COUNTS)?;
                    increment_count(&mut counts, number)?;
                    true
                }
            }
        };
        txn.commit()?;

        if assigned {
            info!(%key, number, ?uow, "assigned key to manual partition");
        }
        Ok(())
    }
}
