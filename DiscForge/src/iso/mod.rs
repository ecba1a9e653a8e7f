//! Disc image access
//!
//! [`DiscImage`] wraps a caller-owned stream and translates logical sector
//! addresses into physical stream offsets for either platform variant.

mod image;
pub mod layout;
pub mod sector;

use std::fmt;

use serde::Serialize;

pub use image::DiscImage;
pub use sector::{Msf, filler_sector};

/// Usable payload bytes per sector on both platforms.
pub const PAYLOAD_SIZE: u64 = 2048;

/// The two known platform variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Raw `MODE2/2352` image.
    Psx,
    /// Cooked 2048-byte ISO-9660 image.
    Psp,
}

impl Platform {
    /// Size of one physical sector in the stream.
    #[must_use]
    pub fn raw_sector_size(self) -> u64 {
        match self {
            Platform::Psx => layout::RAW_SECTOR_SIZE,
            Platform::Psp => PAYLOAD_SIZE,
        }
    }

    /// Offset of the payload inside a physical sector.
    #[must_use]
    pub fn payload_offset(self) -> u64 {
        match self {
            Platform::Psx => layout::MODE2_FORM1_DATA_OFFSET,
            Platform::Psp => 0,
        }
    }

    /// Physical stream offset of a logical byte offset.
    #[must_use]
    pub fn physical_offset(self, logical: u64) -> u64 {
        let sector = logical / PAYLOAD_SIZE;
        let inner = logical % PAYLOAD_SIZE;
        sector * self.raw_sector_size() + self.payload_offset() + inner
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Psx => "PSX (raw 2352)",
            Platform::Psp => "PSP (ISO 2048)",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
