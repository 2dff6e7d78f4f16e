//! Key and record encoding utilities for the partition map.
//!
//! This module owns the binary formats persisted by the redb-backed store and
//! hashed by the hash router. Both formats are stable across releases.

pub mod key;
pub mod record;
