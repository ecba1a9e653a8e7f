//! Expansion of cooked PSP images
//!
//! The PSP release stores sprites as members of `fftpack.bin`. Expansion
//! rebuilds the pack with every sprite in its own 64 KiB member, writes it
//! back over the original, and repoints the sector map and the location
//! table in both executables.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Write};

use byteorder::{ByteOrder, LittleEndian};

use super::ExpansionReport;
use super::options::{ExpansionOptions, ExpansionPhase};
use crate::directory::{DirectoryEntry, find_path};
use crate::error::{Error, Result};
use crate::iso::layout::psp::{
    BOOT_BIN_PATH, EBOOT_BIN_PATH, FFTPACK_PATH, FIRST_MAPPED_MEMBER, RELOCATED_ASSET_SIZE, RELOCATION_MEMBERS,
    RETIRED_SPRITE_MEMBERS, SECTOR_MAP_LEN, SECTOR_MAP_OFFSET, SPRITE_TABLE_OFFSET,
};
use crate::iso::{DiscImage, PAYLOAD_SIZE, Platform};
use crate::pack::{PackIndex, dump_to_directory, member_path, merge_dumped_files};
use crate::patch::Patch;
use crate::sprites::{SpriteLocationTable, SpriteTableLayout};

/// Header of an encrypted PSP executable.
const ENCRYPTED_MAGIC: &[u8; 4] = b"~PSP";

/// The three files expansion touches.
struct PspFiles {
    pack: DirectoryEntry,
    boot: DirectoryEntry,
    eboot: DirectoryEntry,
}

impl PspFiles {
    fn locate<S: Read + Seek>(image: &mut DiscImage<S>) -> Result<Self> {
        Ok(Self {
            pack: find_path(image, FFTPACK_PATH)?,
            boot: find_path(image, BOOT_BIN_PATH)?,
            eboot: find_path(image, EBOOT_BIN_PATH)?,
        })
    }

    fn pack_offset(&self) -> u64 {
        u64::from(self.pack.sector) * PAYLOAD_SIZE
    }

    fn executables(&self) -> [&DirectoryEntry; 2] {
        [&self.boot, &self.eboot]
    }
}

fn exe_offset(exe: &DirectoryEntry, offset: u32) -> u64 {
    u64::from(exe.sector) * PAYLOAD_SIZE + u64::from(offset)
}

fn read_sector_map<S: Read + Seek>(image: &mut DiscImage<S>, files: &PspFiles) -> Result<Vec<u8>> {
    image.read_file(files.boot.sector, u64::from(SECTOR_MAP_OFFSET), SECTOR_MAP_LEN)
}

fn read_table<S: Read + Seek>(image: &mut DiscImage<S>, files: &PspFiles) -> Result<SpriteLocationTable> {
    SpriteLocationTable::from_image(image, SpriteTableLayout::PSP, exe_offset(&files.boot, SPRITE_TABLE_OFFSET))
}

/// Sector recorded in the map for `member`.
fn mapped_sector(map: &[u8], member: usize) -> Option<u32> {
    let at = member.checked_sub(FIRST_MAPPED_MEMBER)? * 4;
    map.get(at..at + 4).map(LittleEndian::read_u32)
}

fn relocation_member(slot: usize) -> usize {
    *RELOCATION_MEMBERS.start() + slot
}

pub(super) fn detect<S: Read + Seek>(image: &mut DiscImage<S>) -> Result<bool> {
    let files = PspFiles::locate(image)?;
    let map = read_sector_map(image, &files)?;
    let table = read_table(image, &files)?;
    Ok(table
        .iter()
        .enumerate()
        .all(|(i, slot)| slot.size as usize == RELOCATED_ASSET_SIZE && mapped_sector(&map, relocation_member(i)) == Some(slot.sector)))
}

fn check_decrypted<S: Read + Seek>(image: &mut DiscImage<S>, exe: &DirectoryEntry) -> Result<()> {
    let head = image.read_file(exe.sector, 0, ENCRYPTED_MAGIC.len())?;
    if head == ENCRYPTED_MAGIC {
        return Err(Error::InvalidFormat(format!(
            "{} at sector {} is encrypted; decrypt it before expanding",
            exe.filename, exe.sector
        )));
    }
    Ok(())
}

/// Read sprite `i` through the member it points at, padded to its new size.
fn read_assets<S: Read + Seek>(
    image: &mut DiscImage<S>,
    files: &PspFiles,
    index: &PackIndex,
    table: &SpriteLocationTable,
    options: &ExpansionOptions,
) -> Result<Vec<Vec<u8>>> {
    let total = table.len();
    let mut assets = Vec::with_capacity(total);
    for (i, slot) in table.iter().enumerate() {
        let member = index
            .member_at_sector(slot.sector, files.pack.sector)
            .ok_or(Error::UnmappedSector {
                slot: i,
                sector: slot.sector,
            })?;
        let len = member.len as usize;
        if len > RELOCATED_ASSET_SIZE {
            return Err(Error::AssetTooLarge {
                index: i,
                size: len,
                capacity: RELOCATED_ASSET_SIZE,
            });
        }
        let mut bytes = image.read_file(files.pack.sector, member.offset, len)?;
        bytes.resize(RELOCATED_ASSET_SIZE, 0);
        assets.push(bytes);
        options.report(ExpansionPhase::ReadingAssets, i + 1, total);
    }
    Ok(assets)
}

pub(super) fn expand<S: Read + Write + Seek>(
    image: &mut DiscImage<S>,
    options: &ExpansionOptions,
) -> Result<ExpansionReport> {
    let files = PspFiles::locate(image)?;
    tracing::info!(
        "Expanding PSP image: pack at sector {} ({} bytes)",
        files.pack.sector,
        files.pack.size
    );
    for exe in files.executables() {
        check_decrypted(image, exe)?;
    }

    let map = read_sector_map(image, &files)?;
    let index = PackIndex::from_sector_map(&map, files.pack.sector, u64::from(files.pack.size))?;
    let mut table = read_table(image, &files)?;
    let assets = read_assets(image, &files, &index, &table, options)?;
    if assets.len() > RELOCATION_MEMBERS.clone().count() {
        return Err(Error::InvalidFormat(format!(
            "{} sprites do not fit {} relocation members",
            assets.len(),
            RELOCATION_MEMBERS.clone().count()
        )));
    }

    // removed on every exit path when dropped
    let work = options.scratch_dir()?;
    let dump_dir = work.path().join("fftpack");
    let merged_path = work.path().join("fftpack.bin");

    options.report(ExpansionPhase::DumpingPack, 0, 1);
    image.get_mut().seek(SeekFrom::Start(files.pack_offset()))?;
    dump_to_directory(image.get_mut(), &index, &dump_dir)?;
    options.report(ExpansionPhase::DumpingPack, 1, 1);

    for member in RETIRED_SPRITE_MEMBERS.chain(RELOCATION_MEMBERS) {
        std::fs::write(member_path(&dump_dir, member), b"")?;
    }
    for (i, asset) in assets.iter().enumerate() {
        std::fs::write(member_path(&dump_dir, relocation_member(i)), asset)?;
    }

    options.report(ExpansionPhase::MergingPack, 0, 1);
    let merged = merge_dumped_files(&dump_dir, &merged_path)?;
    options.report(ExpansionPhase::MergingPack, 1, 1);

    let capacity = u64::from(files.pack.size);
    let merged_len = merged.total_len();
    if merged_len > capacity {
        return Err(Error::PackCapacityExceeded {
            size: merged_len,
            capacity,
        });
    }

    let new_map = merged.to_sector_map(files.pack.sector)?;
    for i in 0..table.len() {
        let member = relocation_member(i);
        let sector = mapped_sector(&new_map, member)
            .ok_or_else(|| Error::InvalidFormat(format!("pack member {member} has no sector map entry")))?;
        table.set(i, sector, RELOCATED_ASSET_SIZE as u32)?;
    }

    // everything below writes to the image
    options.report(ExpansionPhase::WritingPack, 0, 1);
    let mut reader = BufReader::new(File::open(&merged_path)?);
    image.copy_into(files.pack_offset(), &mut reader, merged_len)?;
    let padding = capacity - merged_len;
    if padding > 0 {
        image.copy_into(files.pack_offset() + merged_len, &mut std::io::repeat(0), padding)?;
    }
    options.report(ExpansionPhase::WritingPack, 1, 1);

    let mut patches: Vec<Patch> = files
        .executables()
        .iter()
        .map(|exe| Patch::new(exe_offset(exe, SECTOR_MAP_OFFSET), new_map.clone()))
        .collect();
    let table_offsets: Vec<u64> = files
        .executables()
        .iter()
        .map(|exe| exe_offset(exe, SPRITE_TABLE_OFFSET))
        .collect();
    patches.extend(table.to_patches(&table_offsets));
    let patches_applied = image.apply_patches(&patches)?;
    image.flush()?;
    options.report(ExpansionPhase::PatchingTables, 1, 1);

    tracing::info!(
        "Rebuilt pack: {merged_len} of {capacity} bytes used, {} sprites relocated",
        assets.len()
    );
    Ok(ExpansionReport {
        platform: Platform::Psp,
        relocated_assets: assets.len(),
        directory_entries: 0,
        filler_sectors: 0,
        patches_applied,
        image_len: image.len(),
    })
}
