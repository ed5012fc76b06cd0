//! Binary graph file format
//!
//! ```text
//! offset 0            : ne  (u64, little-endian)
//! offset 8            : nv  (u32, little-endian)
//! offset 12           : nv × u64  row-end offsets (row v spans [end(v-1), end(v)))
//! offset 12 + 8·nv    : ne × u32  column ids
//! offset 12 + 8·nv + 4·ne : ne × f32  edge weights
//! ```
//!
//! Pull files store in-edges grouped by destination, push files store
//! out-edges grouped by source. Each Load task reads the header plus the
//! byte ranges of its own partition.

use super::csr::CsrGraph;
use super::{EdgeId, Layout, VertexId};
use crate::error::FormatError;
use anyhow::{Context, Result};
use std::ops::Range;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Size of the fixed file header: `sizeof(E_ID) + sizeof(V_ID)`
pub const FILE_HEADER_SIZE: u64 = (std::mem::size_of::<EdgeId>() + std::mem::size_of::<VertexId>()) as u64;

const ROW_ENTRY: u64 = std::mem::size_of::<EdgeId>() as u64;
const COL_ENTRY: u64 = std::mem::size_of::<VertexId>() as u64;
const WEIGHT_ENTRY: u64 = std::mem::size_of::<f32>() as u64;

/// Fixed file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Total edge count
    pub ne: EdgeId,
    /// Total vertex count
    pub nv: VertexId,
}

impl FileHeader {
    /// Encode as little-endian bytes
    #[must_use]
    pub fn to_bytes(self) -> [u8; FILE_HEADER_SIZE as usize] {
        let mut out = [0_u8; FILE_HEADER_SIZE as usize];
        out[..8].copy_from_slice(&self.ne.to_le_bytes());
        out[8..].copy_from_slice(&self.nv.to_le_bytes());
        out
    }

    /// Decode from the first [`FILE_HEADER_SIZE`] bytes
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::Truncated`] on short input
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        if (bytes.len() as u64) < FILE_HEADER_SIZE {
            return Err(FormatError::Truncated {
                what: "file header",
                needed: FILE_HEADER_SIZE,
                have: bytes.len() as u64,
            });
        }
        let mut ne = [0_u8; 8];
        ne.copy_from_slice(&bytes[..8]);
        let mut nv = [0_u8; 4];
        nv.copy_from_slice(&bytes[8..12]);
        Ok(Self {
            ne: u64::from_le_bytes(ne),
            nv: u32::from_le_bytes(nv),
        })
    }

    /// Byte offset of the row-end section
    #[must_use]
    pub const fn rows_offset(&self) -> u64 {
        FILE_HEADER_SIZE
    }

    /// Byte offset of the column section
    #[must_use]
    pub const fn cols_offset(&self) -> u64 {
        FILE_HEADER_SIZE + self.nv as u64 * ROW_ENTRY
    }

    /// Byte offset of the weight section
    ///
    /// Saturates for an edge count no file can hold; see [`Self::checked_file_len`].
    #[must_use]
    pub const fn weights_offset(&self) -> u64 {
        self.cols_offset().saturating_add(self.ne.saturating_mul(COL_ENTRY))
    }

    /// Total file length, saturating
    #[must_use]
    pub const fn file_len(&self) -> u64 {
        self.weights_offset().saturating_add(self.ne.saturating_mul(WEIGHT_ENTRY))
    }

    /// Total file length, `None` if it does not fit in a `u64`
    #[must_use]
    pub fn checked_file_len(&self) -> Option<u64> {
        self.ne
            .checked_mul(COL_ENTRY + WEIGHT_ENTRY)?
            .checked_add(self.cols_offset())
    }

    /// Check the header against the length of the file it came from
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::HeaderOverflow`] if the sections it describes
    /// overflow a `u64`, [`FormatError::Truncated`] if the file is shorter
    pub fn check_len(&self, actual: u64) -> Result<(), FormatError> {
        let needed = self
            .checked_file_len()
            .ok_or(FormatError::HeaderOverflow { ne: self.ne, nv: self.nv })?;
        if needed > actual {
            return Err(FormatError::Truncated {
                what: "graph file",
                needed,
                have: actual,
            });
        }
        Ok(())
    }

    /// Byte ranges a Load task reads for one partition
    #[must_use]
    pub fn partition_ranges(&self, rows: &Range<VertexId>, edges: &Range<EdgeId>) -> PartitionByteRanges {
        PartitionByteRanges {
            header: 0..FILE_HEADER_SIZE,
            rows: self.rows_offset() + u64::from(rows.start) * ROW_ENTRY
                ..self.rows_offset() + u64::from(rows.end) * ROW_ENTRY,
            cols: offset(self.cols_offset(), edges.start, COL_ENTRY)..offset(self.cols_offset(), edges.end, COL_ENTRY),
            weights: offset(self.weights_offset(), edges.start, WEIGHT_ENTRY)
                ..offset(self.weights_offset(), edges.end, WEIGHT_ENTRY),
        }
    }
}

/// File byte ranges owned by one partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionByteRanges {
    /// Header bytes (shared by every partition)
    pub header: Range<u64>,
    /// Row-end entries of the partition's vertices
    pub rows: Range<u64>,
    /// Column ids of the partition's edges
    pub cols: Range<u64>,
    /// Weights of the partition's edges
    pub weights: Range<u64>,
}

impl PartitionByteRanges {
    /// Total bytes to load
    #[must_use]
    pub fn total_len(&self) -> u64 {
        [&self.header, &self.rows, &self.cols, &self.weights]
            .iter()
            .map(|r| r.end.saturating_sub(r.start))
            .fold(0, u64::saturating_add)
    }
}

// Edge offsets come from an unvalidated row index; corrupt ones land past
// the end of the file instead of wrapping.
const fn offset(base: u64, index: u64, width: u64) -> u64 {
    base.saturating_add(index.saturating_mul(width))
}

/// Serialise a CSR graph to the binary format
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn encode_graph(graph: &CsrGraph, layout: Layout) -> Vec<u8> {
    let view = graph.csr_for(layout);
    let header = FileHeader {
        ne: graph.num_edges() as EdgeId,
        nv: graph.num_vertices() as VertexId,
    };

    let mut bytes = Vec::with_capacity(header.file_len() as usize);
    bytes.extend_from_slice(&header.to_bytes());
    for end in &view.row_offsets[1..] {
        bytes.extend_from_slice(&end.to_le_bytes());
    }
    for col in view.col_indices {
        bytes.extend_from_slice(&col.to_le_bytes());
    }
    for w in view.weights {
        bytes.extend_from_slice(&w.to_le_bytes());
    }
    bytes
}

/// Write a CSR graph file for the given layout
///
/// # Errors
///
/// Returns error if file I/O fails
pub async fn write_graph_file<P: AsRef<Path>>(path: P, graph: &CsrGraph, layout: Layout) -> Result<()> {
    let path = path.as_ref();
    tokio::fs::write(path, encode_graph(graph, layout))
        .await
        .with_context(|| format!("Failed to write graph file {}", path.display()))
}

/// Read the fixed header of a graph file
///
/// # Errors
///
/// Returns error if the file cannot be read, is shorter than the header, or
/// is shorter than the sections the header describes
pub async fn read_header<P: AsRef<Path>>(path: P) -> Result<FileHeader> {
    let path = path.as_ref();
    let bytes = read_range(path, 0..FILE_HEADER_SIZE).await?;
    let header = FileHeader::from_bytes(&bytes)?;
    let len = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("Failed to stat {}", path.display()))?
        .len();
    header.check_len(len)?;
    Ok(header)
}

/// Read the full row-end index (`nv` entries)
///
/// # Errors
///
/// Returns error if the file cannot be read or is truncated
pub async fn read_row_index<P: AsRef<Path>>(path: P, header: &FileHeader) -> Result<Vec<EdgeId>> {
    let range = header.rows_offset()..header.cols_offset();
    let bytes = read_range(path.as_ref(), range).await?;
    Ok(decode_u64s(&bytes, "row index")?)
}

/// Read `range` from a file at its byte offset
///
/// # Errors
///
/// Returns error on I/O failure or short read
pub async fn read_range(path: &Path, range: Range<u64>) -> Result<Vec<u8>> {
    let mut file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open graph file {}", path.display()))?;
    let len = file
        .metadata()
        .await
        .with_context(|| format!("Failed to stat {}", path.display()))?
        .len();
    if range.end > len {
        return Err(FormatError::Truncated {
            what: "graph file",
            needed: range.end,
            have: len,
        }
        .into());
    }

    #[allow(clippy::cast_possible_truncation)]
    let mut buf = vec![0_u8; (range.end - range.start) as usize];
    file.seek(std::io::SeekFrom::Start(range.start)).await?;
    file.read_exact(&mut buf)
        .await
        .with_context(|| format!("Failed to read bytes {range:?} of {}", path.display()))?;
    Ok(buf)
}

pub(crate) fn decode_u64s(bytes: &[u8], what: &'static str) -> Result<Vec<u64>, FormatError> {
    check_multiple(bytes, 8, what)?;
    Ok(bytes
        .chunks_exact(8)
        .map(|c| bytemuck::pod_read_unaligned::<[u8; 8]>(c))
        .map(u64::from_le_bytes)
        .collect())
}

pub(crate) fn decode_u32s(bytes: &[u8], what: &'static str) -> Result<Vec<u32>, FormatError> {
    check_multiple(bytes, 4, what)?;
    Ok(bytes
        .chunks_exact(4)
        .map(|c| bytemuck::pod_read_unaligned::<[u8; 4]>(c))
        .map(u32::from_le_bytes)
        .collect())
}

pub(crate) fn decode_f32s(bytes: &[u8], what: &'static str) -> Result<Vec<f32>, FormatError> {
    check_multiple(bytes, 4, what)?;
    Ok(bytes
        .chunks_exact(4)
        .map(|c| bytemuck::pod_read_unaligned::<[u8; 4]>(c))
        .map(f32::from_le_bytes)
        .collect())
}

fn check_multiple(bytes: &[u8], width: usize, what: &'static str) -> Result<(), FormatError> {
    if bytes.len() % width == 0 {
        Ok(())
    } else {
        Err(FormatError::Truncated {
            what,
            needed: bytes.len().next_multiple_of(width) as u64,
            have: bytes.len() as u64,
        })
    }
}
