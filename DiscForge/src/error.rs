//! Error types for `DiscForge`

use std::path::PathBuf;

use thiserror::Error;

/// Broad classification of an [`Error`].
///
/// Format and validation failures raised before the first write leave the
/// image untouched. Anything raised after that point may leave partial writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The image is not one of the known variants, or is in the wrong state.
    Format,
    /// A structural rule of the directory, table or pack was violated.
    Validation,
    /// Reading or writing the underlying stream failed.
    Io,
    /// A pack member expected by the index is missing.
    MissingMember,
}

/// The error type for `DiscForge` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from stream or file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended before the requested range could be read.
    #[error("short read: {len} bytes at offset {offset:#X}")]
    ShortRead {
        /// Physical stream offset of the read.
        offset: u64,
        /// Number of bytes requested.
        len: usize,
    },

    /// A write would run past the end of the stream outside the grow step.
    #[error("write of {len} bytes at offset {offset:#X} exceeds stream length {stream_len:#X}")]
    WriteOutOfBounds {
        /// Physical stream offset of the write.
        offset: u64,
        /// Number of bytes to write.
        len: usize,
        /// Current stream length.
        stream_len: u64,
    },

    /// Directory traversal error.
    #[error("directory walk error: {0}")]
    WalkDirError(String),

    // ==================== Format Errors ====================
    /// The stream is neither a raw PSX image nor a cooked PSP image.
    #[error("unrecognized disc image ({len} bytes): no ISO-9660 volume descriptor at sector 16")]
    UnrecognizedImage {
        /// Stream length in bytes.
        len: u64,
    },

    /// The image has already been expanded.
    #[error("image is already expanded")]
    AlreadyExpanded,

    /// A path could not be resolved through the ISO-9660 directory tree.
    #[error("file not found on disc: {path}")]
    FileNotFound {
        /// The path that was looked up.
        path: String,
    },

    /// A sprite slot points at a sector that no pack member starts at.
    #[error("sprite slot {slot} points at sector {sector}, which starts no pack member")]
    UnmappedSector {
        /// Sprite slot index.
        slot: usize,
        /// The unmapped sector.
        sector: u32,
    },

    /// Invalid format error (use specific variants when possible).
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    // ==================== Validation Errors ====================
    /// A directory record could not be decoded.
    #[error("invalid directory record at offset {offset:#X}: {reason}")]
    InvalidDirectoryRecord {
        /// Offset of the record inside the directory buffer.
        offset: usize,
        /// What is wrong with it.
        reason: String,
    },

    /// Two directory entries share a filename.
    #[error("duplicate directory entry: {name:?}")]
    DuplicateEntry {
        /// The duplicated filename.
        name: String,
    },

    /// A sibling entry carries a different attribute block than its siblings.
    #[error("directory entry {name:?} has a {block} block that differs from its siblings")]
    AttributeMismatch {
        /// Filename of the offending entry.
        name: String,
        /// Which block differs (`middle` or `extended`).
        block: &'static str,
    },

    /// A directory entry required by the expansion plan is missing.
    #[error("directory entry {name:?} not found")]
    EntryNotFound {
        /// The missing filename.
        name: String,
    },

    /// The serialized directory does not fit its fixed sector budget.
    #[error("directory needs {needed} sectors but only {capacity} are available")]
    DirectoryCapacityExceeded {
        /// Sectors required by the entries.
        needed: usize,
        /// Fixed sector budget.
        capacity: usize,
    },

    /// A sprite slot index is outside the table.
    #[error("sprite slot {index} out of range (table has {slots} slots)")]
    SlotOutOfRange {
        /// Requested slot.
        index: usize,
        /// Number of slots in the table.
        slots: usize,
    },

    /// A patch payload does not match the length of its target position.
    #[error("patch length mismatch at sector {sector} offset {offset:#X}: expected {expected} bytes, got {actual}")]
    PatchLengthMismatch {
        /// Target sector.
        sector: u32,
        /// Offset inside the target file.
        offset: u32,
        /// Length of the known position.
        expected: usize,
        /// Length of the supplied bytes.
        actual: usize,
    },

    /// A relocated asset does not fit its fixed slot.
    #[error("asset {index} is {size} bytes, larger than its {capacity}-byte slot")]
    AssetTooLarge {
        /// Asset index.
        index: usize,
        /// Asset size in bytes.
        size: usize,
        /// Slot capacity in bytes.
        capacity: usize,
    },

    /// The rebuilt pack is larger than the container it must replace.
    #[error("rebuilt pack is {size} bytes but the container holds only {capacity}")]
    PackCapacityExceeded {
        /// Size of the merged pack.
        size: u64,
        /// Footprint of the original container.
        capacity: u64,
    },

    // ==================== Pack Archive Errors ====================
    /// A pack member listed in the index has no dumped file.
    #[error("pack member {index} missing: {path}")]
    MissingMember {
        /// Member index.
        index: usize,
        /// The expected member file.
        path: PathBuf,
    },

    /// The pack ended inside a member while dumping it.
    #[error("pack member {index} truncated: expected {expected} bytes, got {actual}")]
    TruncatedMember {
        /// Member index.
        index: usize,
        /// Length recorded in the index.
        expected: u64,
        /// Bytes actually available.
        actual: u64,
    },

    /// Pack manifest (de)serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) | Error::ShortRead { .. } | Error::WriteOutOfBounds { .. } | Error::WalkDirError(_) => {
                ErrorKind::Io
            }
            Error::UnrecognizedImage { .. }
            | Error::AlreadyExpanded
            | Error::FileNotFound { .. }
            | Error::UnmappedSector { .. }
            | Error::InvalidFormat(_)
            | Error::JsonError(_) => ErrorKind::Format,
            Error::InvalidDirectoryRecord { .. }
            | Error::DuplicateEntry { .. }
            | Error::AttributeMismatch { .. }
            | Error::EntryNotFound { .. }
            | Error::DirectoryCapacityExceeded { .. }
            | Error::SlotOutOfRange { .. }
            | Error::PatchLengthMismatch { .. }
            | Error::AssetTooLarge { .. }
            | Error::PackCapacityExceeded { .. } => ErrorKind::Validation,
            Error::MissingMember { .. } | Error::TruncatedMember { .. } => ErrorKind::MissingMember,
        }
    }
}

// Add conversion from walkdir::Error
impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Error::WalkDirError(err.to_string())
    }
}

/// A specialized Result type for `DiscForge` operations.
pub type Result<T> = std::result::Result<T, Error>;
