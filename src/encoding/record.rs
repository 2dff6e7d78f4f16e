//! Partition record encoding.
//!
//! Record value: [version][kind][provider_len][provider][conn_len][connection_string]
//!
//! Lengths are 4-byte big-endian.

use crate::connection::ConnectionDescriptor;
use crate::error::EncodingError;
use crate::store::PartitionKind;
use std::convert::TryInto;

pub type Result<T> = std::result::Result<T, EncodingError>;

/// Current encoding version for partition records
pub const RECORD_VERSION: u8 = 1;

const KIND_MANUAL: u8 = 0;
const KIND_AUTO_ASSIGN: u8 = 1;

/// Persisted description of one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionRecord {
    pub kind: PartitionKind,
    pub descriptor: ConnectionDescriptor,
}

impl PartitionRecord {
    pub fn new(kind: PartitionKind, descriptor: ConnectionDescriptor) -> Self {
        Self { kind, descriptor }
    }

    /// Encodes the record into its versioned byte form.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let provider = self.descriptor.provider().as_bytes();
        let connection = self.descriptor.connection_string().as_bytes();

        let mut buf = Vec::with_capacity(2 + 8 + provider.len() + connection.len());
        buf.push(RECORD_VERSION);
        buf.push(match self.kind {
            PartitionKind::Manual => KIND_MANUAL,
            PartitionKind::AutoAssign => KIND_AUTO_ASSIGN,
        });
        write_field(&mut buf, provider)?;
        write_field(&mut buf, connection)?;
        Ok(buf)
    }

    /// Decodes a record produced by [`PartitionRecord::encode`].
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < 2 {
            return Err(EncodingError::InvalidRecordEncoding(
                "Record too short".to_string(),
            ));
        }

        let version = data[0];
        if version != RECORD_VERSION {
            return Err(EncodingError::UnsupportedVersion(version));
        }

        let kind = match data[1] {
            KIND_MANUAL => PartitionKind::Manual,
            KIND_AUTO_ASSIGN => PartitionKind::AutoAssign,
            other => {
                return Err(EncodingError::InvalidRecordEncoding(format!(
                    "Unknown partition kind {}",
                    other
                )))
            }
        };

        let (provider, rest) = read_field(&data[2..])?;
        let (connection, rest) = read_field(rest)?;
        if !rest.is_empty() {
            return Err(EncodingError::InvalidRecordEncoding(format!(
                "{} trailing bytes",
                rest.len()
            )));
        }

        let descriptor = ConnectionDescriptor::new(provider, connection).map_err(|e| {
            EncodingError::InvalidRecordEncoding(format!("Invalid descriptor: {}", e))
        })?;

        Ok(Self { kind, descriptor })
    }
}

fn write_field(buf: &mut Vec<u8>, field: &[u8]) -> Result<()> {
    let len: u32 = field
        .len()
        .try_into()
        .map_err(|_| EncodingError::InvalidRecordEncoding("Field too long".to_string()))?;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(field);
    Ok(())
}

fn read_field(data: &[u8]) -> Result<(String, &[u8])> {
    if data.len() < 4 {
        return Err(EncodingError::InvalidRecordEncoding(
            "Missing field length".to_string(),
        ));
    }
    let len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    let body = &data[4..];
    if body.len() < len {
        return Err(EncodingError::InvalidRecordEncoding(format!(
            "Field claims {} bytes, {} available",
            len,
            body.len()
        )));
    }
    let text = std::str::from_utf8(&body[..len])
        .map_err(|e| EncodingError::InvalidRecordEncoding(e.to_string()))?;
    Ok((text.to_string(), &body[len..]))
}
