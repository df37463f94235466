//! Chunk planning
//!
//! A [`ChunkPlan`] deterministically partitions a byte buffer into an
//! ordered sequence of fixed-size chunks; the last chunk may be short.
//! Planning is pure arithmetic over the buffer length, so the same plan
//! can be recomputed on resume without rereading the buffer.

use crate::error::{CoreError, Result};
use crate::MAX_CHUNK_SIZE;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A single chunk's position within the buffer
///
/// Chunk `i` covers bytes `[i*chunk_size, min((i+1)*chunk_size, len))`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSpec {
    /// Position in the upload order
    pub index: u32,

    /// Byte offset of the chunk within the buffer
    pub offset: u64,

    /// Length of the chunk in bytes
    pub length: u32,
}

impl ChunkSpec {
    /// Slice the chunk's payload out of the full buffer (zero-copy)
    pub fn slice(&self, buffer: &Bytes) -> Bytes {
        let start = self.offset as usize;
        let end = start + self.length as usize;
        buffer.slice(start..end)
    }
}

/// Ordered partition of a buffer into chunks
///
/// Invariants: chunks are contiguous and non-overlapping, lengths sum to
/// the buffer length, and indices run 0..n in upload order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPlan {
    chunks: Vec<ChunkSpec>,
    buffer_len: u64,
    chunk_size: u32,
}

impl ChunkPlan {
    /// Plan chunks over a buffer of the given length
    ///
    /// Number of chunks is `ceil(buffer_len / chunk_size)`. A zero-length
    /// buffer yields exactly one zero-length chunk, so an empty file still
    /// produces one addressable unit.
    pub fn plan(buffer_len: u64, chunk_size: u32) -> Result<Self> {
        if chunk_size == 0 {
            return Err(CoreError::ZeroChunkSize);
        }
        if chunk_size > MAX_CHUNK_SIZE {
            return Err(CoreError::ChunkSizeTooLarge {
                size: chunk_size,
                max: MAX_CHUNK_SIZE,
            });
        }

        if buffer_len == 0 {
            return Ok(Self {
                chunks: vec![ChunkSpec {
                    index: 0,
                    offset: 0,
                    length: 0,
                }],
                buffer_len,
                chunk_size,
            });
        }

        let size = chunk_size as u64;
        let count = (buffer_len + size - 1) / size;

        let chunks = (0..count)
            .map(|i| {
                let offset = i * size;
                let length = size.min(buffer_len - offset);
                ChunkSpec {
                    index: i as u32,
                    offset,
                    length: length as u32,
                }
            })
            .collect();

        Ok(Self {
            chunks,
            buffer_len,
            chunk_size,
        })
    }

    /// Number of chunks in the plan
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// A plan always contains at least one chunk
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Total buffer length the plan covers
    pub fn buffer_len(&self) -> u64 {
        self.buffer_len
    }

    /// Chunk size the plan was built with
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Get a chunk by index
    pub fn get(&self, index: u32) -> Result<&ChunkSpec> {
        self.chunks
            .get(index as usize)
            .ok_or(CoreError::ChunkIndexOutOfRange {
                index,
                max: self.chunks.len() as u32 - 1,
            })
    }

    /// Iterate chunks in upload order
    pub fn iter(&self) -> impl Iterator<Item = &ChunkSpec> {
        self.chunks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_exact_partition() {
        let plan = ChunkPlan::plan(1024 * 1024, 256 * 1024).unwrap();
        assert_eq!(plan.len(), 4);

        let total: u64 = plan.iter().map(|c| c.length as u64).sum();
        assert_eq!(total, 1024 * 1024);
    }

    #[test]
    fn test_short_last_chunk() {
        let plan = ChunkPlan::plan(1000, 256).unwrap();
        assert_eq!(plan.len(), 4); // ceil(1000/256)

        let last = plan.get(3).unwrap();
        assert_eq!(last.offset, 768);
        assert_eq!(last.length, 232);
    }

    #[test]
    fn test_empty_buffer_single_chunk() {
        let plan = ChunkPlan::plan(0, 256 * 1024).unwrap();
        assert_eq!(plan.len(), 1);

        let only = plan.get(0).unwrap();
        assert_eq!(only.offset, 0);
        assert_eq!(only.length, 0);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        assert!(matches!(
            ChunkPlan::plan(100, 0),
            Err(CoreError::ZeroChunkSize)
        ));
    }

    #[test]
    fn test_oversized_chunk_rejected() {
        assert!(matches!(
            ChunkPlan::plan(100, MAX_CHUNK_SIZE + 1),
            Err(CoreError::ChunkSizeTooLarge { .. })
        ));
    }

    #[test]
    fn test_index_out_of_range() {
        let plan = ChunkPlan::plan(100, 256).unwrap();
        assert!(matches!(
            plan.get(1),
            Err(CoreError::ChunkIndexOutOfRange { index: 1, max: 0 })
        ));
    }

    #[test]
    fn test_slice() {
        let buffer = Bytes::from((0u8..=255).collect::<Vec<u8>>());
        let plan = ChunkPlan::plan(256, 100).unwrap();
        assert_eq!(plan.len(), 3);

        let middle = plan.get(1).unwrap().slice(&buffer);
        assert_eq!(middle.as_ref(), &(100u8..200).collect::<Vec<u8>>()[..]);
    }

    proptest! {
        #[test]
        fn prop_partition_is_exact(
            buffer_len in 0u64..100_000,
            chunk_size in 1u32..=65_536,
        ) {
            let plan = ChunkPlan::plan(buffer_len, chunk_size).unwrap();

            // Chunk count
            let expected = if buffer_len == 0 {
                1
            } else {
                ((buffer_len + chunk_size as u64 - 1) / chunk_size as u64) as usize
            };
            prop_assert_eq!(plan.len(), expected);

            // Contiguous, non-overlapping, sums to buffer length
            let mut next_offset = 0u64;
            for (i, chunk) in plan.iter().enumerate() {
                prop_assert_eq!(chunk.index as usize, i);
                prop_assert_eq!(chunk.offset, next_offset);
                prop_assert!(chunk.length <= chunk_size);
                next_offset += chunk.length as u64;
            }
            prop_assert_eq!(next_offset, buffer_len);
        }
    }
}
