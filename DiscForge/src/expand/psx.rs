//! Expansion of raw PSX images
//!
//! Sprites move from their packed positions into fixed 64 KiB slots in new
//! sectors appended after the original data. The `BATTLE` directory is
//! rewritten to name the slots, and the location table in `BATTLE.BIN` is
//! pointed at them.

use std::io::{Read, Seek, Write};

use super::options::{ExpansionOptions, ExpansionPhase};
use super::ExpansionReport;
use crate::directory::{DirectoryEntry, DirectoryTable, RecordTimestamp};
use crate::error::{Error, Result};
use crate::iso::layout::psx::{
    AUX_ASSET_SIZE, BATTLE_DIR_SECTOR, BATTLE_DIR_SECTORS, EXPANDED_IMAGE_LEN, EXPANDED_SECTOR_COUNT, FILLER_FILE_SPAN,
    FILLER_START, RELOCATED_ASSET_SIZE, RELOCATION_BASE_SECTOR, SPRITE_TABLE,
};
use crate::iso::layout::{RAW_SECTOR_SIZE, VOLUME_SPACE_SIZE};
use crate::iso::{DiscImage, Msf, PAYLOAD_SIZE, Platform, filler_sector};
use crate::patch::Patch;
use crate::sprites::{SpriteLocationTable, read_location_table};

/// Sectors owned by one relocated sprite.
const SECTORS_PER_ASSET: u32 = (RELOCATED_ASSET_SIZE as u64 / PAYLOAD_SIZE) as u32;

/// First sector of the slot for sprite `index`.
#[must_use]
pub fn relocated_sector(index: usize) -> u32 {
    RELOCATION_BASE_SECTOR + index as u32 * SECTORS_PER_ASSET
}

pub(super) fn detect<S: Read + Seek>(image: &mut DiscImage<S>) -> Result<bool> {
    if image.len() < EXPANDED_IMAGE_LEN || image.sector_count() < u64::from(EXPANDED_SECTOR_COUNT) {
        return Ok(false);
    }
    if image.volume_sector_count()? < EXPANDED_SECTOR_COUNT {
        return Ok(false);
    }
    Ok(read_location_table(image)?.is_relocated(relocated_sector))
}

/// Everything the write phase needs, computed without touching the image.
struct Prepared {
    assets: Vec<Vec<u8>>,
    table: SpriteLocationTable,
    directory: Vec<u8>,
    directory_entries: usize,
}

fn prepare<S: Read + Seek>(image: &mut DiscImage<S>, options: &ExpansionOptions) -> Result<Prepared> {
    if image.len() < FILLER_START {
        return Err(Error::UnrecognizedImage { len: image.len() });
    }

    let mut table = read_location_table(image)?;
    let total = table.len();
    let mut assets = Vec::with_capacity(total);
    for (i, slot) in table.iter().enumerate() {
        let size = slot.size as usize;
        if size > RELOCATED_ASSET_SIZE {
            return Err(Error::AssetTooLarge {
                index: i,
                size,
                capacity: RELOCATED_ASSET_SIZE,
            });
        }
        let mut bytes = image.read_file(slot.sector, 0, size)?;
        bytes.resize(RELOCATED_ASSET_SIZE, 0);
        assets.push(bytes);
        options.report(ExpansionPhase::ReadingAssets, i + 1, total);
    }

    let raw = image.read_sectors(BATTLE_DIR_SECTOR, BATTLE_DIR_SECTORS)?;
    let mut dir = DirectoryTable::parse(&raw)?;
    dir.validate_sibling_attributes()?;
    let template = dir
        .attribute_template()
        .cloned()
        .ok_or_else(|| Error::InvalidFormat("BATTLE directory has no file entries".to_string()))?;

    let plan = options.plan;
    let mut auxiliary = Vec::with_capacity(plan.auxiliary.len());
    for aux in plan.auxiliary {
        let source = dir.get(aux.source).ok_or_else(|| Error::EntryNotFound {
            name: aux.source.to_string(),
        })?;
        auxiliary.push((aux.name, source.sector));
    }

    let before = dir.len();
    dir.retain(|e| plan.retains(&e.filename));
    tracing::debug!("Kept {} of {before} BATTLE entries", dir.len());

    let stamp = RecordTimestamp::from_datetime(&options.resolved_timestamp());
    for i in 0..total {
        let sector = relocated_sector(i);
        let size = table.get(i).map_or(0, |slot| slot.size);
        dir.append(DirectoryEntry::like(
            &template,
            format!("{i:02X}.SPR;1"),
            sector,
            RELOCATED_ASSET_SIZE as u32,
            stamp,
        ))?;
        table.set(i, sector, size)?;
    }
    for (name, sector) in auxiliary {
        dir.append(DirectoryEntry::like(&template, name, sector, AUX_ASSET_SIZE, stamp))?;
    }

    let directory = dir.serialize(BATTLE_DIR_SECTORS)?;
    options.report(ExpansionPhase::RewritingDirectory, 1, 1);

    Ok(Prepared {
        assets,
        table,
        directory,
        directory_entries: dir.len(),
    })
}

fn write_filler<S: Read + Write + Seek>(image: &mut DiscImage<S>, options: &ExpansionOptions) -> Result<usize> {
    let total = ((EXPANDED_IMAGE_LEN - FILLER_START) / RAW_SECTOR_SIZE) as usize;
    let mut address = Msf::from_lba(FILLER_START / RAW_SECTOR_SIZE);
    tracing::info!("Writing {total} filler sectors from {address}");

    for n in 0..total {
        let physical = FILLER_START + n as u64 * RAW_SECTOR_SIZE;
        let last_of_file = (physical - FILLER_START + RAW_SECTOR_SIZE) % FILLER_FILE_SPAN == 0;
        image.write_raw_sector(physical / RAW_SECTOR_SIZE, &filler_sector(address, last_of_file))?;
        address = address.add_frame();
        if last_of_file {
            options.report(ExpansionPhase::WritingFiller, n + 1, total);
        }
    }
    Ok(total)
}

pub(super) fn expand<S: Read + Write + Seek>(
    image: &mut DiscImage<S>,
    options: &ExpansionOptions,
) -> Result<ExpansionReport> {
    tracing::info!("Expanding PSX image ({} bytes)", image.len());
    let prepared = prepare(image, options)?;

    // everything below writes to the image
    let mut patches_applied = image.apply_patches(&VOLUME_SPACE_SIZE.patches(EXPANDED_SECTOR_COUNT))?;
    let filler_sectors = write_filler(image, options)?;

    let total = prepared.assets.len();
    for (i, asset) in prepared.assets.into_iter().enumerate() {
        image.apply_patch(&Patch::at_sector(relocated_sector(i), asset))?;
        patches_applied += 1;
        options.report(ExpansionPhase::RelocatingAssets, i + 1, total);
    }

    image.apply_patch(&Patch::at_sector(BATTLE_DIR_SECTOR, prepared.directory))?;
    image.apply_patch(&SPRITE_TABLE.patch(prepared.table.encode())?)?;
    patches_applied += 2;
    image.flush()?;
    options.report(ExpansionPhase::PatchingTables, 1, 1);

    tracing::info!("Relocated {total} sprites; image is now {} bytes", image.len());
    Ok(ExpansionReport {
        platform: Platform::Psx,
        relocated_assets: total,
        directory_entries: prepared.directory_entries,
        filler_sectors,
        patches_applied,
        image_len: image.len(),
    })
}
