//! Fixed offsets and sizes of the two supported disc layouts

use crate::patch::{BothEndianField, FilePosition};

/// Raw CD sector size (sync + header + subheader + data + EDC + ECC).
pub const RAW_SECTOR_SIZE: u64 = 2352;

/// Offset to user data within a Mode 2 Form 1 raw sector.
/// 12 (sync) + 4 (header) + 8 (subheader) = 24.
pub const MODE2_FORM1_DATA_OFFSET: u64 = 24;

/// CD sync pattern at the start of every raw (2352-byte) sector.
pub const CD_SYNC_PATTERN: [u8; 12] = [
    0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00,
];

/// ISO 9660 Primary Volume Descriptor is always at sector 16.
pub const PVD_SECTOR: u32 = 16;

/// Descriptor type 1 followed by the standard identifier.
pub const PVD_MAGIC: [u8; 6] = [0x01, b'C', b'D', b'0', b'0', b'1'];

/// Root directory record inside the PVD (34 bytes).
pub const PVD_ROOT_RECORD: FilePosition = FilePosition::new(PVD_SECTOR, 156, 34);

/// Volume space size, stored both-endian at PVD offsets 80 and 84.
pub const VOLUME_SPACE_SIZE: BothEndianField = BothEndianField {
    name: "volume space size",
    little: FilePosition::new(PVD_SECTOR, 80, 4),
    big: FilePosition::new(PVD_SECTOR, 84, 4),
};

/// Raw `MODE2/2352` layout of the PSX release.
pub mod psx {
    use super::RAW_SECTOR_SIZE;
    use crate::patch::FilePosition;

    /// Length of an unmodified image.
    pub const DEFAULT_IMAGE_LEN: u64 = 541_315_152;
    /// Length of an expanded image.
    pub const EXPANDED_IMAGE_LEN: u64 = 0x20F1_8D00;
    /// Volume space size of an unmodified image.
    pub const DEFAULT_SECTOR_COUNT: u32 = 230_151;
    /// Volume space size of an expanded image.
    pub const EXPANDED_SECTOR_COUNT: u32 = (EXPANDED_IMAGE_LEN / RAW_SECTOR_SIZE) as u32;

    /// Physical offset where filler sectors start.
    pub const FILLER_START: u64 = 0x2040_B100;
    /// First sector of the relocated sprite area.
    pub const RELOCATION_BASE_SECTOR: u32 = (FILLER_START / RAW_SECTOR_SIZE) as u32;
    /// Filler sectors are grouped into files of this many physical bytes.
    pub const FILLER_FILE_SPAN: u64 = 0x12600;

    /// Number of sprite slots in the location table.
    pub const NUM_SPRITES: usize = 154;
    /// Every relocated sprite owns a slot of this many bytes.
    pub const RELOCATED_ASSET_SIZE: usize = 65536;
    /// Directory size recorded for the shared SP2 resources.
    pub const AUX_ASSET_SIZE: u32 = 32768;

    /// First sector of the `BATTLE` directory.
    pub const BATTLE_DIR_SECTOR: u32 = 56436;
    /// Fixed size of the `BATTLE` directory in sectors.
    pub const BATTLE_DIR_SECTORS: usize = 6;

    /// First sector of `BATTLE.BIN`.
    pub const BATTLE_BIN_SECTOR: u32 = 1000;
    /// Sprite location table inside `BATTLE.BIN`.
    pub const SPRITE_TABLE: FilePosition = FilePosition::new(BATTLE_BIN_SECTOR, 0x2DCDC, NUM_SPRITES * 8);
}

/// Cooked ISO-9660 layout of the PSP release.
pub mod psp {
    use std::ops::RangeInclusive;

    /// The concatenated asset pack.
    pub const FFTPACK_PATH: &str = "PSP_GAME/USRDIR/fftpack.bin";
    /// Decrypted boot executable.
    pub const BOOT_BIN_PATH: &str = "PSP_GAME/SYSDIR/BOOT.BIN";
    /// Executable the firmware actually loads; must be stored decrypted.
    pub const EBOOT_BIN_PATH: &str = "PSP_GAME/SYSDIR/EBOOT.BIN";

    /// Sector -> pack member map inside the executables.
    pub const SECTOR_MAP_OFFSET: u32 = 0x252F34;
    /// Length of the sector map in bytes.
    pub const SECTOR_MAP_LEN: usize = 0x3E00;
    /// Sprite location table inside the executables.
    pub const SPRITE_TABLE_OFFSET: u32 = 0x324824;

    /// Members in `fftpack.bin`.
    pub const NUM_PACK_FILES: usize = 3970;
    /// Lowest member index listed in the sector map.
    pub const FIRST_MAPPED_MEMBER: usize = 3;

    /// Members holding the original sprites; emptied by expansion.
    pub const RETIRED_SPRITE_MEMBERS: RangeInclusive<usize> = 78..=213;
    /// Members that receive the relocated sprites.
    pub const RELOCATION_MEMBERS: RangeInclusive<usize> = 234..=745;
    /// Every relocated sprite owns a member of this many bytes.
    pub const RELOCATED_ASSET_SIZE: usize = 65536;
}
