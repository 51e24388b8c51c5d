//! Persistence for the vector index as a pair of files.
//!
//! Vector file format (`vectors.bin`):
//!
//! Header (51 bytes):
//! - version: u8 (2)
//! - model_id: [u8; 32] (SHA256 hash of model name)
//! - dimensions: u16 (little-endian)
//! - entry_count: u64 (little-endian)
//! - metadata_checksum: u32 (CRC32 of the metadata file bytes)
//! - checksum: u32 (CRC32 of header fields before checksum)
//!
//! Entries (repeated `entry_count` times, in index position order):
//! - embedding: [f32; dimensions] (little-endian)
//!
//! Metadata file (`metadata.json`): JSON array of `{filename, page}` objects,
//! one per entry, same order as the vector file. Its checksum in the vector
//! header ties the two files together: a vector file only loads next to the
//! metadata file written with it.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::documents::PageRef;
use crate::semantic::index::{IndexError, VectorIndex};
use crate::storage::write_atomic;

/// Current file format version
const FORMAT_VERSION: u8 = 2;

/// Header size in bytes: version(1) + model_id(32) + dimensions(2) + entry_count(8)
/// + metadata_checksum(4) + checksum(4)
const HEADER_SIZE: usize = 51;

/// Offset of the header checksum
const CHECKSUM_OFFSET: usize = HEADER_SIZE - 4;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{} not found", .0.display())]
    MissingArtifact(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metadata error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Version mismatch: file version {0}, supported version {1}")]
    VersionMismatch(u8, u8),

    #[error("Model mismatch: index was built with a different model")]
    ModelMismatch,

    #[error("Checksum mismatch: file may be corrupted")]
    ChecksumMismatch,

    #[error("Dimension mismatch: expected {expected}, file has {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Metadata has {metadata} entries but vector file has {vectors}")]
    MetadataMismatch { vectors: usize, metadata: usize },

    #[error("Metadata file was not written with this vector file. Rebuild the index")]
    MetadataChecksumMismatch,

    #[error("Index error: {0}")]
    Index(#[from] IndexError),
}

/// Location of the two index artifacts.
#[derive(Clone, Debug)]
pub struct IndexStorage {
    index_path: PathBuf,
    metadata_path: PathBuf,
}

impl IndexStorage {
    pub fn new(index_path: PathBuf, metadata_path: PathBuf) -> Self {
        Self {
            index_path,
            metadata_path,
        }
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn metadata_path(&self) -> &Path {
        &self.metadata_path
    }

    /// First artifact of the pair that does not exist, if any.
    pub fn missing_artifact(&self) -> Option<&Path> {
        [self.index_path.as_path(), self.metadata_path.as_path()]
            .into_iter()
            .find(|path| !path.is_file())
    }

    /// Load the index from both artifacts.
    ///
    /// Fails if either file is missing or unreadable, or if the two files were
    /// not saved together.
    pub fn load(
        &self,
        expected_model_id: &[u8; 32],
        expected_dimensions: usize,
    ) -> Result<VectorIndex, StorageError> {
        if let Some(missing) = self.missing_artifact() {
            return Err(StorageError::MissingArtifact(missing.to_path_buf()));
        }

        let file = File::open(&self.index_path)?;
        let mut reader = BufReader::new(file);

        let header = Self::read_header(&mut reader)?;
        Self::validate_header(&header, expected_model_id, expected_dimensions)?;

        let dimensions = header.dimensions as usize;
        let count = usize::try_from(header.entry_count)
            .map_err(|_| StorageError::InvalidFormat("entry count too large".to_string()))?;

        let metadata_bytes = std::fs::read(&self.metadata_path)?;
        let metadata: Vec<PageRef> = serde_json::from_slice(&metadata_bytes)?;
        if metadata.len() != count {
            return Err(StorageError::MetadataMismatch {
                vectors: count,
                metadata: metadata.len(),
            });
        }
        if header.metadata_checksum != Self::compute_checksum(&metadata_bytes) {
            return Err(StorageError::MetadataChecksumMismatch);
        }

        let mut vectors = Vec::with_capacity(count);
        for _ in 0..count {
            vectors.push(Self::read_entry(&mut reader, dimensions)?);
        }

        let mut trailing = [0u8; 1];
        if reader.read(&mut trailing)? != 0 {
            return Err(StorageError::InvalidFormat(
                "unexpected data after last entry".to_string(),
            ));
        }

        let mut index = VectorIndex::with_capacity(dimensions, count);
        index.add(&vectors, metadata)?;

        log::info!(
            "Loaded {} vectors from {}",
            index.len(),
            self.index_path.display()
        );

        Ok(index)
    }

    /// Save the index to both artifacts.
    ///
    /// Each file is written atomically: temp file -> fsync -> rename
    pub fn save(&self, index: &VectorIndex, model_id: &[u8; 32]) -> Result<(), StorageError> {
        let dimensions = u16::try_from(index.dimensions()).map_err(|_| {
            StorageError::InvalidFormat(format!("{} dimensions do not fit the header", index.dimensions()))
        })?;

        let metadata_bytes = serde_json::to_vec_pretty(index.metadata())?;

        let header = Header {
            version: FORMAT_VERSION,
            model_id: *model_id,
            dimensions,
            entry_count: index.len() as u64,
            metadata_checksum: Self::compute_checksum(&metadata_bytes),
        };

        let mut bytes = Vec::with_capacity(HEADER_SIZE + index.len() * index.dimensions() * 4);
        bytes.extend_from_slice(&Self::encode_header(&header));
        for (vector, _) in index.iter() {
            for &value in vector {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }

        write_atomic(&self.index_path, &bytes)?;
        write_atomic(&self.metadata_path, &metadata_bytes)?;

        log::info!("Index saved to {}", self.index_path.display());
        log::info!("Metadata saved to {}", self.metadata_path.display());

        Ok(())
    }

    /// Read header from file.
    fn read_header(reader: &mut impl Read) -> Result<Header, StorageError> {
        let mut header_bytes = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header_bytes).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                StorageError::InvalidFormat("file is shorter than the header".to_string())
            } else {
                StorageError::Io(e)
            }
        })?;

        // Verify checksum (computed over header without checksum field)
        let stored_checksum = Self::read_u32(&header_bytes, CHECKSUM_OFFSET);
        if stored_checksum != Self::compute_checksum(&header_bytes[..CHECKSUM_OFFSET]) {
            return Err(StorageError::ChecksumMismatch);
        }

        let version = header_bytes[0];
        if version != FORMAT_VERSION {
            return Err(StorageError::VersionMismatch(version, FORMAT_VERSION));
        }

        let mut model_id = [0u8; 32];
        model_id.copy_from_slice(&header_bytes[1..33]);

        let dimensions = u16::from_le_bytes([header_bytes[33], header_bytes[34]]);

        let mut count_bytes = [0u8; 8];
        count_bytes.copy_from_slice(&header_bytes[35..43]);
        let entry_count = u64::from_le_bytes(count_bytes);

        let metadata_checksum = Self::read_u32(&header_bytes, 43);

        Ok(Header {
            version,
            model_id,
            dimensions,
            entry_count,
            metadata_checksum,
        })
    }

    fn read_u32(bytes: &[u8], offset: usize) -> u32 {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&bytes[offset..offset + 4]);
        u32::from_le_bytes(buf)
    }

    /// Validate header against expected values.
    fn validate_header(
        header: &Header,
        expected_model_id: &[u8; 32],
        expected_dimensions: usize,
    ) -> Result<(), StorageError> {
        if header.model_id != *expected_model_id {
            return Err(StorageError::ModelMismatch);
        }

        if header.dimensions as usize != expected_dimensions {
            return Err(StorageError::DimensionMismatch {
                expected: expected_dimensions,
                got: header.dimensions as usize,
            });
        }

        Ok(())
    }

    fn encode_header(header: &Header) -> [u8; HEADER_SIZE] {
        let mut header_bytes = [0u8; HEADER_SIZE];

        header_bytes[0] = header.version;
        header_bytes[1..33].copy_from_slice(&header.model_id);
        header_bytes[33..35].copy_from_slice(&header.dimensions.to_le_bytes());
        header_bytes[35..43].copy_from_slice(&header.entry_count.to_le_bytes());

        header_bytes[43..47].copy_from_slice(&header.metadata_checksum.to_le_bytes());

        let checksum = Self::compute_checksum(&header_bytes[..CHECKSUM_OFFSET]);
        header_bytes[CHECKSUM_OFFSET..].copy_from_slice(&checksum.to_le_bytes());

        header_bytes
    }

    /// Read a single embedding.
    fn read_entry(reader: &mut impl Read, dimensions: usize) -> Result<Vec<f32>, StorageError> {
        let mut embedding = Vec::with_capacity(dimensions);
        let mut float_bytes = [0u8; 4];
        for _ in 0..dimensions {
            reader.read_exact(&mut float_bytes).map_err(|e| {
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    StorageError::InvalidFormat("vector file is truncated".to_string())
                } else {
                    StorageError::Io(e)
                }
            })?;
            embedding.push(f32::from_le_bytes(float_bytes));
        }
        Ok(embedding)
    }

    /// Compute CRC32 checksum of data.
    fn compute_checksum(data: &[u8]) -> u32 {
        crc32fast::hash(data)
    }
}

/// File header structure.
#[derive(Debug)]
struct Header {
    version: u8,
    model_id: [u8; 32],
    dimensions: u16,
    entry_count: u64,
    metadata_checksum: u32,
}
