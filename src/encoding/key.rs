//! Partition key encoding.
//!
//! Keys are encoded with a one-byte shape tag followed by the payload:
//!
//! Uuid: [0x01][16 bytes]
//! Int:  [0x02][i64 big-endian]
//! Text: [0x03][utf-8 bytes]

use crate::error::EncodingError;
use crate::key::PartitionKey;
use std::convert::TryInto;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, EncodingError>;

const TAG_UUID: u8 = 0x01;
const TAG_INT: u8 = 0x02;
const TAG_TEXT: u8 = 0x03;

/// Encodes a partition key into its tagged byte form.
pub fn encode_partition_key(key: &PartitionKey) -> Vec<u8> {
    match key {
        PartitionKey::Uuid(id) => {
            let mut buf = Vec::with_capacity(17);
            buf.push(TAG_UUID);
            buf.extend_from_slice(id.as_bytes());
            buf
        }
        PartitionKey::Int(value) => {
            let mut buf = Vec::with_capacity(9);
            buf.push(TAG_INT);
            buf.extend_from_slice(&value.to_be_bytes());
            buf
        }
        PartitionKey::Text(text) => {
            let mut buf = Vec::with_capacity(1 + text.len());
            buf.push(TAG_TEXT);
            buf.extend_from_slice(text.as_bytes());
            buf
        }
    }
}

/// Decodes a tagged key produced by [`encode_partition_key`].
pub fn decode_partition_key(encoded: &[u8]) -> Result<PartitionKey> {
    let (tag, payload) = encoded
        .split_first()
        .ok_or_else(|| EncodingError::InvalidKeyEncoding("Empty key".to_string()))?;

    match *tag {
        TAG_UUID => {
            let bytes: [u8; 16] = payload.try_into().map_err(|_| {
                EncodingError::InvalidKeyEncoding(format!(
                    "Uuid key needs 16 bytes, got {}",
                    payload.len()
                ))
            })?;
            Ok(PartitionKey::Uuid(Uuid::from_bytes(bytes)))
        }
        TAG_INT => {
            let bytes: [u8; 8] = payload.try_into().map_err(|_| {
                EncodingError::InvalidKeyEncoding(format!(
                    "Int key needs 8 bytes, got {}",
                    payload.len()
                ))
            })?;
            Ok(PartitionKey::Int(i64::from_be_bytes(bytes)))
        }
        TAG_TEXT => {
            let text = std::str::from_utf8(payload)
                .map_err(|e| EncodingError::InvalidKeyEncoding(e.to_string()))?;
            Ok(PartitionKey::Text(text.to_string()))
        }
        other => Err(EncodingError::InvalidKeyEncoding(format!(
            "Unknown key tag {:#04x}",
            other
        ))),
    }
}
