// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Batch payload codec.
//!
//! A batchlog payload is the ordered list of mutations of one logged batch:
//!
//! ```text
//! i32  count (big-endian)
//! count × mutation serialized form (see [`crate::mutation`])
//! ```
//!
//! Every mutation is written with [`MESSAGING_VERSION`]; decoding rejects
//! any other version, a negative count, truncated input, and bytes left over
//! after the last declared mutation.

use crate::error::{ReplayError, Result};
use crate::mutation::{Mutation, MESSAGING_VERSION};
use bytes::{Buf, BufMut};

/// Encode an ordered sequence of mutations into one payload.
pub fn encode(mutations: &[Mutation]) -> Result<Vec<u8>> {
    let count = i32::try_from(mutations.len()).map_err(|_| {
        ReplayError::Internal(format!("batch of {} mutations exceeds i32", mutations.len()))
    })?;

    let mut buf = Vec::with_capacity(64 * mutations.len() + 4);
    buf.put_i32(count);
    for mutation in mutations {
        mutation.serialize_into(&mut buf, MESSAGING_VERSION)?;
    }
    Ok(buf)
}

/// Decode a payload back into its mutations, preserving order.
pub fn decode(payload: &[u8]) -> Result<Vec<Mutation>> {
    let mut buf = payload;
    if buf.remaining() < 4 {
        return Err(ReplayError::decode(format!(
            "payload too short for count header ({} bytes)",
            buf.remaining()
        )));
    }

    let count = buf.get_i32();
    if count < 0 {
        return Err(ReplayError::decode(format!("negative mutation count {}", count)));
    }

    // A mutation is at least 14 bytes (version, keyspace len, key len, update count).
    if (count as usize).saturating_mul(14) > buf.remaining() {
        return Err(ReplayError::decode(format!(
            "mutation count {} cannot fit in {} remaining bytes",
            count,
            buf.remaining()
        )));
    }

    let mut mutations = Vec::with_capacity(count as usize);
    for index in 0..count {
        let mutation =
            Mutation::deserialize_from(&mut buf, MESSAGING_VERSION).map_err(|e| match e {
                ReplayError::Decode(message) => {
                    ReplayError::decode(format!("mutation {} of {}: {}", index + 1, count, message))
                }
                other => other,
            })?;
        mutations.push(mutation);
    }

    if buf.has_remaining() {
        return Err(ReplayError::decode(format!(
            "{} trailing bytes after {} mutations",
            buf.remaining(),
            count
        )));
    }

    Ok(mutations)
}
