//! Partition keys and partition numbers.
//!
//! A [`PartitionKey`] is the caller-chosen value that decides which partition
//! an entity lives in. Keys hash over their stable byte encoding so routing
//! never depends on the in-process `Hash` implementation.

use crate::encoding::key::encode_partition_key;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use xxhash_rust::xxh3::xxh3_64;

/// Identifies one partition.
pub type PartitionNumber = u32;

/// Caller-defined value identifying which partition an entity belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PartitionKey {
    Uuid(Uuid),
    Int(i64),
    Text(String),
}

impl PartitionKey {
    /// The fixed key used when an application does not partition at all.
    pub fn unpartitioned() -> Self {
        PartitionKey::Uuid(Uuid::nil())
    }

    /// Stable byte encoding used for hashing and persistence.
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_partition_key(self)
    }

    /// 64-bit xxh3 hash of the key's byte encoding.
    pub fn stable_hash(&self) -> u64 {
        xxh3_64(&self.to_bytes())
    }

    /// Renders the key as a SQL literal.
    pub fn to_sql_literal(&self) -> String {
        match self {
            PartitionKey::Uuid(id) => format!("'{}'", id.hyphenated()),
            PartitionKey::Int(value) => value.to_string(),
            PartitionKey::Text(text) => format!("'{}'", text.replace('\'', "''")),
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionKey::Uuid(id) => write!(f, "{}", id),
            PartitionKey::Int(value) => write!(f, "{}", value),
            PartitionKey::Text(text) => write!(f, "{}", text),
        }
    }
}

impl From<Uuid> for PartitionKey {
    fn from(value: Uuid) -> Self {
        PartitionKey::Uuid(value)
    }
}

impl From<i64> for PartitionKey {
    fn from(value: i64) -> Self {
        PartitionKey::Int(value)
    }
}

impl From<&str> for PartitionKey {
    fn from(value: &str) -> Self {
        PartitionKey::Text(value.to_string())
    }
}

impl From<String> for PartitionKey {
    fn from(value: String) -> Self {
        PartitionKey::Text(value)
    }
}
