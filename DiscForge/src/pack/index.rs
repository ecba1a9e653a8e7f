//! Member index of a pack archive
//!
//! The pack carries no header. Member positions come from a sector map in
//! the boot executable: entry `k` (a little-endian `u32`) is the absolute
//! disc sector where member `k + 3` starts.

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::iso::PAYLOAD_SIZE;
use crate::iso::layout::psp::{FIRST_MAPPED_MEMBER, NUM_PACK_FILES};

/// Number of entries in the sector map.
pub const SECTOR_MAP_ENTRIES: usize = NUM_PACK_FILES - 1 - FIRST_MAPPED_MEMBER;

/// One member of the pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackMember {
    pub index: usize,
    /// Byte offset from the start of the pack.
    pub offset: u64,
    pub len: u64,
}

impl PackMember {
    #[must_use]
    pub fn end(&self) -> u64 {
        self.offset + self.len
    }
}

/// Members of a pack, ordered by index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackIndex {
    members: Vec<PackMember>,
}

impl PackIndex {
    /// Build an index from members in any order.
    #[must_use]
    pub fn new(mut members: Vec<PackMember>) -> Self {
        members.sort_by_key(|m| m.index);
        Self { members }
    }

    /// Derive member ranges from the executable's sector map.
    ///
    /// Each member runs up to the next member by offset; the last one runs
    /// to `pack_len`. Bytes before the first mapped member become member 0.
    pub fn from_sector_map(map: &[u8], pack_sector: u32, pack_len: u64) -> Result<Self> {
        let needed = SECTOR_MAP_ENTRIES * 4;
        if map.len() < needed {
            return Err(Error::InvalidFormat(format!(
                "sector map is {} bytes, need {needed}",
                map.len()
            )));
        }

        let mut starts: Vec<(u64, usize)> = Vec::with_capacity(SECTOR_MAP_ENTRIES + 1);
        for k in 0..SECTOR_MAP_ENTRIES {
            let index = k + FIRST_MAPPED_MEMBER;
            let sector = LittleEndian::read_u32(&map[k * 4..k * 4 + 4]);
            let relative = sector.checked_sub(pack_sector).ok_or_else(|| {
                Error::InvalidFormat(format!(
                    "pack member {index} at sector {sector} lies before the pack (sector {pack_sector})"
                ))
            })?;
            let offset = u64::from(relative) * PAYLOAD_SIZE;
            if offset > pack_len {
                return Err(Error::InvalidFormat(format!(
                    "pack member {index} at offset {offset:#X} lies past the pack end {pack_len:#X}"
                )));
            }
            starts.push((offset, index));
        }

        starts.sort_unstable();
        if starts.first().is_some_and(|&(first, _)| first > 0) {
            starts.insert(0, (0, 0));
        }

        let members = starts
            .iter()
            .enumerate()
            .map(|(i, &(offset, index))| {
                let end = starts.get(i + 1).map_or(pack_len, |&(next, _)| next);
                PackMember {
                    index,
                    offset,
                    len: end - offset,
                }
            })
            .collect();

        let index = Self::new(members);
        tracing::debug!("Derived {} pack members from sector map", index.len());
        Ok(index)
    }

    /// Encode the sector map for the current member offsets.
    ///
    /// # Errors
    ///
    /// Every mapped member must exist and start on a sector boundary.
    pub fn to_sector_map(&self, pack_sector: u32) -> Result<Vec<u8>> {
        let mut map = vec![0u8; SECTOR_MAP_ENTRIES * 4];
        for k in 0..SECTOR_MAP_ENTRIES {
            let index = k + FIRST_MAPPED_MEMBER;
            let member = self
                .get(index)
                .ok_or_else(|| Error::InvalidFormat(format!("pack member {index} is not in the index")))?;
            if member.offset % PAYLOAD_SIZE != 0 {
                return Err(Error::InvalidFormat(format!(
                    "pack member {index} starts at {:#X}, not on a sector boundary",
                    member.offset
                )));
            }
            let sector = u64::from(pack_sector) + member.offset / PAYLOAD_SIZE;
            let sector = u32::try_from(sector)
                .map_err(|_| Error::InvalidFormat(format!("pack member {index} sector {sector} overflows")))?;
            LittleEndian::write_u32(&mut map[k * 4..k * 4 + 4], sector);
        }
        Ok(map)
    }

    #[must_use]
    pub fn members(&self) -> &[PackMember] {
        &self.members
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PackMember> {
        self.members.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&PackMember> {
        self.members
            .binary_search_by_key(&index, |m| m.index)
            .ok()
            .map(|i| &self.members[i])
    }

    /// The non-empty member starting at an absolute disc sector.
    #[must_use]
    pub fn member_at_sector(&self, sector: u32, pack_sector: u32) -> Option<&PackMember> {
        let offset = u64::from(sector.checked_sub(pack_sector)?) * PAYLOAD_SIZE;
        self.members.iter().find(|m| m.offset == offset && m.len > 0)
    }

    /// Sum of member lengths.
    #[must_use]
    pub fn total_len(&self) -> u64 {
        self.members.iter().map(|m| m.len).sum()
    }
}

impl<'a> IntoIterator for &'a PackIndex {
    type Item = &'a PackMember;
    type IntoIter = std::slice::Iter<'a, PackMember>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PACK_SECTOR: u32 = 1000;

    /// Member `k + 3` starts `k + 1` sectors into the pack, so 2048 bytes of
    /// leading data belong to member 0.
    fn sequential_map() -> Vec<u8> {
        let mut map = vec![0u8; SECTOR_MAP_ENTRIES * 4];
        for k in 0..SECTOR_MAP_ENTRIES {
            LittleEndian::write_u32(&mut map[k * 4..], PACK_SECTOR + 1 + k as u32);
        }
        map
    }

    #[test]
    fn test_from_sector_map() {
        let pack_len = (SECTOR_MAP_ENTRIES as u64 + 1) * 2048 + 100;
        let index = PackIndex::from_sector_map(&sequential_map(), PACK_SECTOR, pack_len).unwrap();

        assert_eq!(index.len(), SECTOR_MAP_ENTRIES + 1);
        assert_eq!(index.get(0), Some(&PackMember { index: 0, offset: 0, len: 2048 }));
        assert_eq!(index.get(3).unwrap().offset, 2048);
        let last = index.get(NUM_PACK_FILES - 2).unwrap();
        assert_eq!(last.len, 2148);
        assert_eq!(index.total_len(), pack_len);
        assert_eq!(index.member_at_sector(PACK_SECTOR + 2, PACK_SECTOR).unwrap().index, 4);
    }

    #[test]
    fn test_sector_map_round_trip() {
        let map = sequential_map();
        let index = PackIndex::from_sector_map(&map, PACK_SECTOR, 8 * 1024 * 1024).unwrap();
        assert_eq!(index.to_sector_map(PACK_SECTOR).unwrap(), map);
    }

    #[test]
    fn test_member_before_pack_is_rejected() {
        let mut map = sequential_map();
        LittleEndian::write_u32(&mut map[8..], PACK_SECTOR - 1);
        assert!(PackIndex::from_sector_map(&map, PACK_SECTOR, 8 * 1024 * 1024).is_err());
    }

    #[test]
    fn test_unaligned_member_cannot_be_mapped() {
        let members = (0..NUM_PACK_FILES - 1)
            .map(|i| PackMember {
                index: i,
                offset: i as u64 * 10,
                len: 10,
            })
            .collect();
        let err = PackIndex::new(members).to_sector_map(PACK_SECTOR).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)));
    }
}
