//! Frontier buffers for push-style execution
//!
//! Wire format (little-endian):
//!
//! ```text
//! FrontierHeader { num_nodes: u32, kind: u32 }
//! DENSE_BITMAP → ceil(num_nodes / 8) bytes, bit i (LSB-first) ↔ vertex row_left + i
//! SPARSE_QUEUE → num_nodes × u32 global vertex ids, in queue order
//! ```
//!
//! Producer and consumer agree on the representation through the header tag.
//! Which representation to produce is decided per iteration by a
//! [`FrontierPolicy`] supplied with the vertex program.

use super::VertexId;
use crate::error::FormatError;
use std::ops::Range;

/// Representation tag carried in the frontier header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum FrontierKind {
    /// One bit per vertex of the partition
    DenseBitmap = 0x1234_5678,
    /// Explicit list of active vertex ids
    SparseQueue = 0x8765_4321,
}

impl TryFrom<u32> for FrontierKind {
    type Error = FormatError;

    fn try_from(tag: u32) -> Result<Self, Self::Error> {
        match tag {
            0x1234_5678 => Ok(Self::DenseBitmap),
            0x8765_4321 => Ok(Self::SparseQueue),
            other => Err(FormatError::BadFrontierTag(other)),
        }
    }
}

/// Fixed header preceding frontier payload bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontierHeader {
    /// Bitmap length in bits, or queue length in ids
    pub num_nodes: u32,
    /// Payload representation
    pub kind: FrontierKind,
}

impl FrontierHeader {
    /// Encoded header size in bytes
    pub const SIZE: usize = 8;

    fn encode_into(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.num_nodes.to_le_bytes());
        out.extend_from_slice(&(self.kind as u32).to_le_bytes());
    }

    fn decode(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() < Self::SIZE {
            return Err(FormatError::Truncated {
                what: "frontier header",
                needed: Self::SIZE as u64,
                have: bytes.len() as u64,
            });
        }
        let word = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        Ok(Self {
            num_nodes: word(0),
            kind: FrontierKind::try_from(word(4))?,
        })
    }
}

/// Bytes needed for a dense frontier over `num_nodes` vertices
#[must_use]
pub fn dense_capacity(num_nodes: u64) -> u64 {
    FrontierHeader::SIZE as u64 + num_nodes.div_ceil(8)
}

/// Density-driven choice between bitmap and queue
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrontierPolicy {
    /// Active fraction above which the bitmap is used
    pub dense_threshold: f64,
}

impl Default for FrontierPolicy {
    fn default() -> Self {
        Self {
            dense_threshold: 1.0 / 32.0,
        }
    }
}

impl FrontierPolicy {
    /// Always produce a sparse queue when it fits
    #[must_use]
    pub const fn always_sparse() -> Self {
        Self {
            dense_threshold: f64::INFINITY,
        }
    }

    /// Always produce a dense bitmap
    #[must_use]
    pub const fn always_dense() -> Self {
        Self {
            dense_threshold: f64::NEG_INFINITY,
        }
    }
}

/// Set of active vertices of one partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frontier {
    /// Bitmap relative to the partition's first vertex
    Dense {
        /// Number of vertices covered
        num_nodes: u32,
        /// LSB-first bitmap bytes
        bits: Vec<u8>,
    },
    /// Active vertex ids (global)
    Sparse(Vec<VertexId>),
}

impl Frontier {
    /// Empty dense frontier over `num_nodes` vertices
    #[must_use]
    pub fn empty_dense(num_nodes: u32) -> Self {
        Self::Dense {
            num_nodes,
            #[allow(clippy::cast_possible_truncation)]
            bits: vec![0; u64::from(num_nodes).div_ceil(8) as usize],
        }
    }

    /// Choose a representation for `active` (global ids inside `rows`)
    ///
    /// Falls back to the bitmap when the queue would exceed `capacity`.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::FrontierOverflow`] if even the bitmap does not fit
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn build(
        active: Vec<VertexId>,
        rows: &Range<VertexId>,
        policy: FrontierPolicy,
        capacity: u64,
        part: usize,
    ) -> Result<Self, FormatError> {
        let num_nodes = rows.end - rows.start;
        let density = if num_nodes == 0 {
            0.0
        } else {
            active.len() as f64 / f64::from(num_nodes)
        };
        let sparse_len = (FrontierHeader::SIZE + active.len() * 4) as u64;

        if density <= policy.dense_threshold && sparse_len <= capacity {
            return Ok(Self::Sparse(active));
        }

        let needed = dense_capacity(u64::from(num_nodes));
        if needed > capacity {
            return Err(FormatError::FrontierOverflow { part, needed, capacity });
        }
        let mut dense = Self::empty_dense(num_nodes);
        for v in active {
            dense.insert(v, rows.start);
        }
        Ok(dense)
    }

    /// Representation tag
    #[must_use]
    pub const fn kind(&self) -> FrontierKind {
        match self {
            Self::Dense { .. } => FrontierKind::DenseBitmap,
            Self::Sparse(_) => FrontierKind::SparseQueue,
        }
    }

    /// Header `num_nodes` field
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn num_nodes(&self) -> u32 {
        match self {
            Self::Dense { num_nodes, .. } => *num_nodes,
            Self::Sparse(ids) => ids.len() as u32,
        }
    }

    /// Number of active vertices
    #[must_use]
    pub fn active_count(&self) -> usize {
        match self {
            Self::Dense { bits, .. } => bits.iter().map(|b| b.count_ones() as usize).sum(),
            Self::Sparse(ids) => ids.len(),
        }
    }

    /// Whether no vertex is active
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active_count() == 0
    }

    /// Mark `v` active; `base` is the partition's first vertex
    ///
    /// Dense frontiers ignore vertices outside their range.
    pub fn insert(&mut self, v: VertexId, base: VertexId) {
        match self {
            Self::Dense { num_nodes, bits } => {
                let n = *num_nodes;
                if let Some(i) = v.checked_sub(base).filter(|&i| i < n) {
                    bits[(i / 8) as usize] |= 1 << (i % 8);
                }
            }
            Self::Sparse(ids) => ids.push(v),
        }
    }

    /// Whether `v` is active; `base` is the partition's first vertex
    #[must_use]
    pub fn contains(&self, v: VertexId, base: VertexId) -> bool {
        match self {
            Self::Dense { num_nodes, bits } => v
                .checked_sub(base)
                .filter(|i| i < num_nodes)
                .is_some_and(|i| bits[(i / 8) as usize] & (1 << (i % 8)) != 0),
            Self::Sparse(ids) => ids.contains(&v),
        }
    }

    /// Active vertex ids in ascending order (dense) or queue order (sparse)
    #[must_use]
    pub fn active_vertices(&self, base: VertexId) -> Vec<VertexId> {
        match self {
            Self::Dense { num_nodes, bits } => (0..*num_nodes)
                .filter(|i| bits[(i / 8) as usize] & (1 << (i % 8)) != 0)
                .map(|i| base + i)
                .collect(),
            Self::Sparse(ids) => ids.clone(),
        }
    }

    /// Encoded size in bytes
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        FrontierHeader::SIZE
            + match self {
                Self::Dense { bits, .. } => bits.len(),
                Self::Sparse(ids) => ids.len() * 4,
            }
    }

    /// Serialise header and payload
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        FrontierHeader {
            num_nodes: self.num_nodes(),
            kind: self.kind(),
        }
        .encode_into(&mut out);
        match self {
            Self::Dense { bits, .. } => out.extend_from_slice(bits),
            Self::Sparse(ids) => {
                for id in ids {
                    out.extend_from_slice(&id.to_le_bytes());
                }
            }
        }
        out
    }

    /// Parse header and payload; trailing bytes are ignored
    ///
    /// # Errors
    ///
    /// Returns error on an unknown tag or a short payload
    pub fn decode(bytes: &[u8]) -> Result<Self, FormatError> {
        let header = FrontierHeader::decode(bytes)?;
        let payload = &bytes[FrontierHeader::SIZE..];
        #[allow(clippy::cast_possible_truncation)]
        let needed = match header.kind {
            FrontierKind::DenseBitmap => u64::from(header.num_nodes).div_ceil(8) as usize,
            FrontierKind::SparseQueue => header.num_nodes as usize * 4,
        };
        if payload.len() < needed {
            return Err(FormatError::Truncated {
                what: "frontier payload",
                needed: needed as u64,
                have: payload.len() as u64,
            });
        }

        Ok(match header.kind {
            FrontierKind::DenseBitmap => Self::Dense {
                num_nodes: header.num_nodes,
                bits: payload[..needed].to_vec(),
            },
            FrontierKind::SparseQueue => Self::Sparse(super::format::decode_u32s(&payload[..needed], "frontier queue")?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_roundtrip_preserves_order() {
        let frontier = Frontier::Sparse(vec![5, 9, 12]);
        let bytes = frontier.encode();
        assert_eq!(bytes.len(), 8 + 12);
        assert_eq!(&bytes[4..8], &0x8765_4321_u32.to_le_bytes());

        let decoded = Frontier::decode(&bytes).unwrap();
        assert_eq!(decoded.kind(), FrontierKind::SparseQueue);
        assert_eq!(decoded.num_nodes(), 3);
        assert_eq!(decoded.active_vertices(0), vec![5, 9, 12]);
    }

    #[test]
    fn test_dense_bits() {
        let mut frontier = Frontier::empty_dense(10);
        frontier.insert(100, 100);
        frontier.insert(109, 100);
        frontier.insert(110, 100); // outside, ignored
        assert_eq!(frontier.active_count(), 2);
        assert!(frontier.contains(109, 100));
        assert!(!frontier.contains(105, 100));
        assert_eq!(frontier.active_vertices(100), vec![100, 109]);

        let decoded = Frontier::decode(&frontier.encode()).unwrap();
        assert_eq!(decoded, frontier);
    }

    #[test]
    fn test_bad_tag() {
        let mut bytes = Frontier::Sparse(vec![1]).encode();
        bytes[4..8].copy_from_slice(&0xdead_beef_u32.to_le_bytes());
        assert!(matches!(
            Frontier::decode(&bytes),
            Err(FormatError::BadFrontierTag(0xdead_beef))
        ));
    }

    #[test]
    fn test_truncated_payload() {
        let bytes = Frontier::Sparse(vec![1, 2, 3]).encode();
        assert!(matches!(
            Frontier::decode(&bytes[..12]),
            Err(FormatError::Truncated { .. })
        ));
    }

    #[test]
    fn test_policy_switches_on_density() {
        let rows = 0..100;
        let sparse = Frontier::build(vec![3], &rows, FrontierPolicy::default(), 1024, 0).unwrap();
        assert_eq!(sparse.kind(), FrontierKind::SparseQueue);

        let many: Vec<u32> = (0..50).collect();
        let dense = Frontier::build(many, &rows, FrontierPolicy::default(), 1024, 0).unwrap();
        assert_eq!(dense.kind(), FrontierKind::DenseBitmap);
        assert_eq!(dense.active_count(), 50);
    }

    #[test]
    fn test_queue_over_capacity_falls_back_to_bitmap() {
        let rows = 0..64;
        let active: Vec<u32> = (0..10).collect();
        let capacity = dense_capacity(64);
        let frontier = Frontier::build(active, &rows, FrontierPolicy::always_sparse(), capacity, 0).unwrap();
        assert_eq!(frontier.kind(), FrontierKind::DenseBitmap);
        assert!(frontier.encoded_len() as u64 <= capacity);
    }

    #[test]
    fn test_bitmap_overflow() {
        let err = Frontier::build(vec![0], &(0..64), FrontierPolicy::always_dense(), 9, 3).unwrap_err();
        assert!(matches!(err, FormatError::FrontierOverflow { part: 3, needed: 16, capacity: 9 }));
    }
}
