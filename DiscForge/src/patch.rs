//! Patches and known positions
//!
//! A [`Patch`] is the only unit through which the image is mutated. Offsets
//! are logical (file-content) byte offsets: `sector * 2048 + offset`. The
//! [`DiscImage`](crate::iso::DiscImage) accessor maps them onto the physical
//! stream for the image's platform.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{Error, Result};
use crate::iso::PAYLOAD_SIZE;

/// An (absolute logical offset, bytes) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    /// Logical byte offset (`sector * 2048 + offset`).
    pub offset: u64,
    /// Bytes to write.
    pub bytes: Vec<u8>,
}

impl Patch {
    #[must_use]
    pub fn new(offset: u64, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            offset,
            bytes: bytes.into(),
        }
    }

    /// Patch starting at the first payload byte of `sector`.
    #[must_use]
    pub fn at_sector(sector: u32, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(u64::from(sector) * PAYLOAD_SIZE, bytes)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Logical offset one past the last patched byte.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.offset + self.bytes.len() as u64
    }
}

/// A fixed region inside a file on disc, addressed by the file's first sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilePosition {
    /// First sector of the containing file.
    pub sector: u32,
    /// Byte offset inside the file.
    pub offset: u32,
    /// Length of the region in bytes.
    pub length: usize,
}

impl FilePosition {
    #[must_use]
    pub const fn new(sector: u32, offset: u32, length: usize) -> Self {
        Self {
            sector,
            offset,
            length,
        }
    }

    /// Logical byte offset of the region's first byte.
    #[must_use]
    pub fn logical_offset(&self) -> u64 {
        u64::from(self.sector) * PAYLOAD_SIZE + u64::from(self.offset)
    }

    /// Build a patch that overwrites exactly this region.
    pub fn patch(&self, bytes: impl Into<Vec<u8>>) -> Result<Patch> {
        let bytes = bytes.into();
        if bytes.len() != self.length {
            return Err(Error::PatchLengthMismatch {
                sector: self.sector,
                offset: self.offset,
                expected: self.length,
                actual: bytes.len(),
            });
        }
        Ok(Patch::new(self.logical_offset(), bytes))
    }
}

/// A u32 stored twice: once little-endian, once byte-reversed.
///
/// Both copies are always produced from one value so they cannot diverge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BothEndianField {
    /// Human-readable field name, used in logs.
    pub name: &'static str,
    /// Little-endian copy.
    pub little: FilePosition,
    /// Big-endian copy.
    pub big: FilePosition,
}

impl BothEndianField {
    /// The pair of patches that store `value` in both encodings.
    #[must_use]
    pub fn patches(&self, value: u32) -> [Patch; 2] {
        let mut le = [0u8; 4];
        let mut be = [0u8; 4];
        LittleEndian::write_u32(&mut le, value);
        BigEndian::write_u32(&mut be, value);
        tracing::debug!("{} = {value} ({value:#X})", self.name);
        [
            Patch::new(self.little.logical_offset(), le),
            Patch::new(self.big.logical_offset(), be),
        ]
    }
}
