//! Sprite location table
//!
//! A flat array of `(sector, size)` slots, two little-endian `u32` each,
//! embedded in a game executable. The PSP table has a 32-byte zero gap
//! between the primary slots and eleven extra slots.

use std::io::{Cursor, Read, Seek};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};

use crate::directory::find_path;
use crate::error::{Error, Result};
use crate::iso::layout::{psp, psx};
use crate::iso::{DiscImage, PAYLOAD_SIZE, Platform};
use crate::patch::Patch;

/// Bytes per slot.
pub const SLOT_LEN: usize = 8;

/// Where one asset lives on disc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpriteLocation {
    pub sector: u32,
    pub size: u32,
}

/// Shape of a location table in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpriteTableLayout {
    pub primary_slots: usize,
    pub gap_bytes: usize,
    pub extra_slots: usize,
}

impl SpriteTableLayout {
    pub const PSX: SpriteTableLayout = SpriteTableLayout {
        primary_slots: 154,
        gap_bytes: 0,
        extra_slots: 0,
    };

    pub const PSP: SpriteTableLayout = SpriteTableLayout {
        primary_slots: 154,
        gap_bytes: 32,
        extra_slots: 11,
    };

    #[must_use]
    pub const fn slots(&self) -> usize {
        self.primary_slots + self.extra_slots
    }

    /// Encoded size including the gap.
    #[must_use]
    pub const fn byte_len(&self) -> usize {
        self.slots() * SLOT_LEN + self.gap_bytes
    }
}

/// In-memory copy of a location table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpriteLocationTable {
    layout: SpriteTableLayout,
    slots: Vec<SpriteLocation>,
}

impl SpriteLocationTable {
    /// Decode a table from its encoded bytes.
    pub fn decode(layout: SpriteTableLayout, bytes: &[u8]) -> Result<Self> {
        if bytes.len() < layout.byte_len() {
            return Err(Error::InvalidFormat(format!(
                "sprite table needs {} bytes, got {}",
                layout.byte_len(),
                bytes.len()
            )));
        }

        let mut cursor = Cursor::new(bytes);
        let mut slots = Vec::with_capacity(layout.slots());
        for i in 0..layout.slots() {
            if i == layout.primary_slots {
                cursor.set_position(cursor.position() + layout.gap_bytes as u64);
            }
            let sector = cursor.read_u32::<LittleEndian>()?;
            let size = cursor.read_u32::<LittleEndian>()?;
            slots.push(SpriteLocation { sector, size });
        }
        Ok(Self { layout, slots })
    }

    /// Read the table stored at a logical offset of the image.
    pub fn from_image<S: Read + Seek>(image: &mut DiscImage<S>, layout: SpriteTableLayout, logical_offset: u64) -> Result<Self> {
        let sector = (logical_offset / PAYLOAD_SIZE) as u32;
        let inner = logical_offset % PAYLOAD_SIZE;
        let bytes = image.read_file(sector, inner, layout.byte_len())?;
        Self::decode(layout, &bytes)
    }

    #[must_use]
    pub fn layout(&self) -> SpriteTableLayout {
        self.layout
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<SpriteLocation> {
        self.slots.get(index).copied()
    }

    pub fn set(&mut self, index: usize, sector: u32, size: u32) -> Result<()> {
        let slots = self.slots.len();
        let slot = self.slots.get_mut(index).ok_or(Error::SlotOutOfRange { index, slots })?;
        *slot = SpriteLocation { sector, size };
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpriteLocation> {
        self.slots.iter()
    }

    /// Encode slots, gap and extra slots.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.layout.byte_len());
        for (i, slot) in self.slots.iter().enumerate() {
            if i == self.layout.primary_slots {
                out.resize(out.len() + self.layout.gap_bytes, 0);
            }
            let mut raw = [0u8; SLOT_LEN];
            LittleEndian::write_u32(&mut raw[..4], slot.sector);
            LittleEndian::write_u32(&mut raw[4..], slot.size);
            out.extend_from_slice(&raw);
        }
        out
    }

    /// One identical patch per copy of the table.
    #[must_use]
    pub fn to_patches(&self, logical_offsets: &[u64]) -> Vec<Patch> {
        let bytes = self.encode();
        logical_offsets.iter().map(|&offset| Patch::new(offset, bytes.clone())).collect()
    }

    /// True when every slot points at the sector `expected(i)` gives.
    pub fn is_relocated(&self, expected: impl Fn(usize) -> u32) -> bool {
        self.slots.iter().enumerate().all(|(i, slot)| slot.sector == expected(i))
    }
}

impl<'a> IntoIterator for &'a SpriteLocationTable {
    type Item = &'a SpriteLocation;
    type IntoIter = std::slice::Iter<'a, SpriteLocation>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.iter()
    }
}

/// Read the location table from wherever the image's platform keeps it:
/// `BATTLE.BIN` on PSX, `BOOT.BIN` on PSP.
pub fn read_location_table<S: Read + Seek>(image: &mut DiscImage<S>) -> Result<SpriteLocationTable> {
    match image.platform() {
        Platform::Psx => SpriteLocationTable::from_image(image, SpriteTableLayout::PSX, psx::SPRITE_TABLE.logical_offset()),
        Platform::Psp => {
            let boot = find_path(image, psp::BOOT_BIN_PATH)?;
            let offset = u64::from(boot.sector) * PAYLOAD_SIZE + u64::from(psp::SPRITE_TABLE_OFFSET);
            SpriteLocationTable::from_image(image, SpriteTableLayout::PSP, offset)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;
    use pretty_assertions::assert_eq;

    fn encoded(layout: SpriteTableLayout) -> Vec<u8> {
        let mut bytes = Vec::new();
        for i in 0..layout.slots() as u32 {
            if i as usize == layout.primary_slots {
                bytes.extend(std::iter::repeat_n(0u8, layout.gap_bytes));
            }
            bytes.write_u32::<LittleEndian>(1000 + i).unwrap();
            bytes.write_u32::<LittleEndian>(4096 * (i + 1)).unwrap();
        }
        bytes
    }

    #[test]
    fn test_psp_layout_keeps_gap() {
        let bytes = encoded(SpriteTableLayout::PSP);
        assert_eq!(bytes.len(), 165 * 8 + 32);

        let table = SpriteLocationTable::decode(SpriteTableLayout::PSP, &bytes).unwrap();
        assert_eq!(table.len(), 165);
        assert_eq!(table.get(154), Some(SpriteLocation { sector: 1154, size: 4096 * 155 }));
        assert_eq!(table.encode(), bytes);
    }

    #[test]
    fn test_set_and_relocation_marker() {
        let mut table = SpriteLocationTable::decode(SpriteTableLayout::PSX, &encoded(SpriteTableLayout::PSX)).unwrap();
        assert!(!table.is_relocated(|i| 230_064 + i as u32 * 32));
        for i in 0..table.len() {
            let size = table.get(i).unwrap().size;
            table.set(i, 230_064 + i as u32 * 32, size).unwrap();
        }
        assert!(table.is_relocated(|i| 230_064 + i as u32 * 32));
        assert_eq!(table.get(3).unwrap().size, 4096 * 4);
    }

    #[test]
    fn test_set_out_of_range() {
        let mut table = SpriteLocationTable::decode(SpriteTableLayout::PSX, &encoded(SpriteTableLayout::PSX)).unwrap();
        let err = table.set(154, 0, 0).unwrap_err();
        assert!(matches!(err, Error::SlotOutOfRange { index: 154, slots: 154 }));
    }

    #[test]
    fn test_patches_are_identical() {
        let table = SpriteLocationTable::decode(SpriteTableLayout::PSP, &encoded(SpriteTableLayout::PSP)).unwrap();
        let patches = table.to_patches(&[0x1000, 0x9000]);
        assert_eq!(patches.len(), 2);
        assert_eq!(patches[0].bytes, patches[1].bytes);
        assert_eq!(patches[1].offset, 0x9000);
    }

    #[test]
    fn test_short_input() {
        assert!(SpriteLocationTable::decode(SpriteTableLayout::PSX, &[0u8; 100]).is_err());
    }
}
