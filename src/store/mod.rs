//! Partition map store abstraction.
//!
//! The partition map store is the persisted source of truth for
//! partition-number to descriptor and partition-key to partition-number
//! assignments. Routers only ever read through it or ask it to mutate; local
//! caches are derived from it.

mod redb_store;

use crate::connection::ConnectionDescriptor;
use crate::error::EncodingError;
use crate::key::{PartitionKey, PartitionNumber};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use redb_store::RedbPartitionMapStore;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Whether new keys may be assigned to a partition automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartitionKind {
    /// Receives keys only through an explicit administrative call.
    Manual,
    /// Eligible for automatic assignment of newly seen keys.
    AutoAssign,
}

/// Transaction scope a store call runs in, relative to any transaction the
/// caller may already hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOfWork {
    /// Run outside any caller transaction, with no transaction of its own
    /// beyond what the engine needs for a consistent read.
    Suppress,
    /// Run in a new transaction that commits on its own, independent of any
    /// caller transaction.
    RequiresNew,
}

/// One row of the partition table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionEntry {
    pub number: PartitionNumber,
    pub kind: PartitionKind,
    pub descriptor: ConnectionDescriptor,
}

/// Errors reported by partition map stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] redb::DatabaseError),

    #[error(transparent)]
    Transaction(#[from] redb::TransactionError),

    #[error(transparent)]
    Table(#[from] redb::TableError),

    #[error(transparent)]
    Storage(#[from] redb::StorageError),

    #[error(transparent)]
    Commit(#[from] redb::CommitError),

    #[error("malformed partition map data: {0}")]
    Encoding(#[from] EncodingError),

    #[error("partition {0} already exists")]
    DuplicatePartition(PartitionNumber),

    #[error("partition {0} does not exist")]
    UnknownPartition(PartitionNumber),

    #[error("partition {0} is not a manual partition")]
    NotManualPartition(PartitionNumber),

    #[error("key {key} is already assigned to partition {partition}")]
    KeyAlreadyAssigned {
        key: PartitionKey,
        partition: PartitionNumber,
    },

    #[error("partition map has no partition {0}; numbers must run contiguously from 0")]
    MissingPartition(PartitionNumber),

    #[error("partition map contains no partitions")]
    EmptyPartitionMap,

    #[error("no auto-assign partition is available")]
    NoAutoAssignPartition,

    #[error("partition map store unavailable: {0}")]
    Unavailable(String),
}

/// Persisted partition map consumed by the hash and dynamic routers.
///
/// Every call names the [`UnitOfWork`] it must run in. Implementations must
/// make `get_or_auto_assign_partition` atomic: a key gets at most one
/// assignment no matter how many processes ask concurrently.
pub trait PartitionMapStore: Send + Sync {
    /// Loads every partition with its descriptor.
    fn load_all_partitions(&self, uow: UnitOfWork) -> StoreResult<Vec<PartitionEntry>>;

    /// Returns the partition `key` is assigned to, assigning it to an
    /// auto-assign partition first if it has never been seen.
    ///
    /// The store picks the target so that auto-assign partitions hold roughly
    /// equal numbers of keys over time.
    fn get_or_auto_assign_partition(
        &self,
        key: &PartitionKey,
        uow: UnitOfWork,
    ) -> StoreResult<PartitionNumber>;

    fn connection_descriptor(
        &self,
        partition: PartitionNumber,
        uow: UnitOfWork,
    ) -> StoreResult<ConnectionDescriptor>;

    fn add_partition(
        &self,
        number: PartitionNumber,
        descriptor: &ConnectionDescriptor,
        kind: PartitionKind,
        uow: UnitOfWork,
    ) -> StoreResult<()>;

    /// Assigns `key` to the manual partition `number`.
    fn add_key_to_manual_partition(
        &self,
        number: PartitionNumber,
        key: &PartitionKey,
        uow: UnitOfWork,
    ) -> StoreResult<()>;
}
