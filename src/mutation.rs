// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Mutations carried inside a batchlog entry.
//!
//! A [`Mutation`] is a set of column-family changes against one partition of
//! one keyspace. The replay engine only looks at three things: the partition
//! key (routing), the keyspace (routing and hint TTL), and the column families
//! touched (hint TTL). Everything else is carried through opaquely.
//!
//! # Serialized Form
//!
//! Each mutation is self-describing and tagged with the messaging version it
//! was written with:
//!
//! ```text
//! u32  version
//! u16  keyspace length, keyspace (utf-8)
//! u32  key length, key
//! u32  update count
//!   u16  column family length, column family (utf-8)
//!   u32  cell count
//!     u32  name length, name
//!     u8   0 = tombstone, 1 = live
//!     [u32 value length, value]    (live only)
//!     i64  timestamp (micros)
//! ```
//!
//! All integers are big-endian. The layout is persisted inside batchlog
//! payloads and must stay stable across restarts.

use crate::error::{ReplayError, Result};
use bytes::{Buf, BufMut};

/// Messaging version this node writes and the only one it accepts.
pub const MESSAGING_VERSION: u32 = 12;

const CELL_TOMBSTONE: u8 = 0;
const CELL_LIVE: u8 = 1;

/// A single cell change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub name: Vec<u8>,
    /// `None` is a tombstone.
    pub value: Option<Vec<u8>>,
    /// Write timestamp in microseconds.
    pub timestamp: i64,
}

impl Cell {
    pub fn live(name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>, timestamp: i64) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            timestamp,
        }
    }

    pub fn tombstone(name: impl Into<Vec<u8>>, timestamp: i64) -> Self {
        Self {
            name: name.into(),
            value: None,
            timestamp,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }
}

/// Changes to one column family of the mutation's partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnFamilyUpdate {
    pub column_family: String,
    pub cells: Vec<Cell>,
}

impl ColumnFamilyUpdate {
    pub fn new(column_family: impl Into<String>, cells: Vec<Cell>) -> Self {
        Self {
            column_family: column_family.into(),
            cells,
        }
    }
}

/// A write against one partition of one keyspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    pub keyspace: String,
    /// Partition key.
    pub key: Vec<u8>,
    pub updates: Vec<ColumnFamilyUpdate>,
}

impl Mutation {
    pub fn new(keyspace: impl Into<String>, key: impl Into<Vec<u8>>) -> Self {
        Self {
            keyspace: keyspace.into(),
            key: key.into(),
            updates: Vec::new(),
        }
    }

    /// Builder-style helper to add a column family update.
    pub fn with_update(mut self, update: ColumnFamilyUpdate) -> Self {
        self.updates.push(update);
        self
    }

    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Names of the column families this mutation touches.
    pub fn column_families(&self) -> impl Iterator<Item = &str> {
        self.updates.iter().map(|u| u.column_family.as_str())
    }

    /// Append this mutation's serialized form, tagged with `version`.
    pub fn serialize_into<B: BufMut>(&self, buf: &mut B, version: u32) -> Result<()> {
        buf.put_u32(version);
        put_short_str(buf, &self.keyspace)?;
        put_bytes(buf, &self.key)?;
        buf.put_u32(len_u32(self.updates.len())?);
        for update in &self.updates {
            put_short_str(buf, &update.column_family)?;
            buf.put_u32(len_u32(update.cells.len())?);
            for cell in &update.cells {
                put_bytes(buf, &cell.name)?;
                match &cell.value {
                    Some(value) => {
                        buf.put_u8(CELL_LIVE);
                        put_bytes(buf, value)?;
                    }
                    None => buf.put_u8(CELL_TOMBSTONE),
                }
                buf.put_i64(cell.timestamp);
            }
        }
        Ok(())
    }

    /// Read one mutation, rejecting anything not written with `version`.
    pub fn deserialize_from<B: Buf>(buf: &mut B, version: u32) -> Result<Self> {
        let embedded = get_u32(buf, "version")?;
        if embedded != version {
            return Err(ReplayError::decode(format!(
                "unsupported mutation version {} (expected {})",
                embedded, version
            )));
        }

        let keyspace = get_short_str(buf, "keyspace")?;
        let key = get_bytes(buf, "key")?;
        let update_count = get_u32(buf, "update count")?;

        // Each update needs at least 6 bytes; reject counts the buffer cannot hold
        // before allocating.
        check_count(buf, update_count, 6, "update count")?;
        let mut updates = Vec::with_capacity(update_count as usize);
        for _ in 0..update_count {
            let column_family = get_short_str(buf, "column family")?;
            let cell_count = get_u32(buf, "cell count")?;
            check_count(buf, cell_count, 13, "cell count")?;
            let mut cells = Vec::with_capacity(cell_count as usize);
            for _ in 0..cell_count {
                let name = get_bytes(buf, "cell name")?;
                let value = match get_u8(buf, "cell flag")? {
                    CELL_LIVE => Some(get_bytes(buf, "cell value")?),
                    CELL_TOMBSTONE => None,
                    other => {
                        return Err(ReplayError::decode(format!("invalid cell flag {}", other)));
                    }
                };
                let timestamp = get_i64(buf, "cell timestamp")?;
                cells.push(Cell {
                    name,
                    value,
                    timestamp,
                });
            }
            updates.push(ColumnFamilyUpdate {
                column_family,
                cells,
            });
        }

        Ok(Self {
            keyspace,
            key,
            updates,
        })
    }
}

fn len_u32(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| ReplayError::Internal(format!("length {} exceeds u32", len)))
}

fn put_short_str<B: BufMut>(buf: &mut B, s: &str) -> Result<()> {
    let len = u16::try_from(s.len())
        .map_err(|_| ReplayError::Internal(format!("string of {} bytes exceeds u16", s.len())))?;
    buf.put_u16(len);
    buf.put_slice(s.as_bytes());
    Ok(())
}

fn put_bytes<B: BufMut>(buf: &mut B, bytes: &[u8]) -> Result<()> {
    buf.put_u32(len_u32(bytes.len())?);
    buf.put_slice(bytes);
    Ok(())
}

fn ensure<B: Buf>(buf: &B, needed: usize, field: &str) -> Result<()> {
    if buf.remaining() < needed {
        return Err(ReplayError::decode(format!(
            "truncated {}: need {} bytes, have {}",
            field,
            needed,
            buf.remaining()
        )));
    }
    Ok(())
}

fn check_count<B: Buf>(buf: &B, count: u32, min_item_size: usize, field: &str) -> Result<()> {
    let needed = (count as usize).saturating_mul(min_item_size);
    if needed > buf.remaining() {
        return Err(ReplayError::decode(format!(
            "{} {} cannot fit in {} remaining bytes",
            field,
            count,
            buf.remaining()
        )));
    }
    Ok(())
}

fn get_u8<B: Buf>(buf: &mut B, field: &str) -> Result<u8> {
    ensure(buf, 1, field)?;
    Ok(buf.get_u8())
}

fn get_u32<B: Buf>(buf: &mut B, field: &str) -> Result<u32> {
    ensure(buf, 4, field)?;
    Ok(buf.get_u32())
}

fn get_i64<B: Buf>(buf: &mut B, field: &str) -> Result<i64> {
    ensure(buf, 8, field)?;
    Ok(buf.get_i64())
}

fn get_bytes<B: Buf>(buf: &mut B, field: &str) -> Result<Vec<u8>> {
    let len = get_u32(buf, field)? as usize;
    ensure(buf, len, field)?;
    let mut out = vec![0u8; len];
    buf.copy_to_slice(&mut out);
    Ok(out)
}

fn get_short_str<B: Buf>(buf: &mut B, field: &str) -> Result<String> {
    ensure(buf, 2, field)?;
    let len = buf.get_u16() as usize;
    ensure(buf, len, field)?;
    let mut out = vec![0u8; len];
    buf.copy_to_slice(&mut out);
    String::from_utf8(out).map_err(|e| ReplayError::decode(format!("invalid utf-8 in {}: {}", field, e)))
}
