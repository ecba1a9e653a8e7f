//! Path resolution through the ISO-9660 directory tree

use std::io::{Read, Seek};

use super::entry::DirectoryEntry;
use super::table::DirectoryTable;
use crate::error::{Error, Result};
use crate::iso::DiscImage;
use crate::iso::PAYLOAD_SIZE;
use crate::iso::layout::PVD_ROOT_RECORD;

/// The root directory record from the primary volume descriptor.
pub fn root_entry<S: Read + Seek>(image: &mut DiscImage<S>) -> Result<DirectoryEntry> {
    let record = image.read_position(&PVD_ROOT_RECORD)?;
    DirectoryEntry::decode(&record, PVD_ROOT_RECORD.offset as usize)
}

/// Read and parse the extent of a directory entry.
///
/// # Errors
///
/// Returns [`Error::InvalidDirectoryRecord`] if the extent runs past the end
/// of the image; nothing is read in that case.
pub fn read_directory<S: Read + Seek>(image: &mut DiscImage<S>, dir: &DirectoryEntry) -> Result<DirectoryTable> {
    let sectors = u64::from(dir.size).div_ceil(PAYLOAD_SIZE).max(1);
    let end = u64::from(dir.sector) + sectors;
    if end > image.sector_count() {
        return Err(Error::InvalidDirectoryRecord {
            offset: 0,
            reason: format!(
                "directory {:?} spans sectors {}..{end}, past the image end at {}",
                dir.filename,
                dir.sector,
                image.sector_count()
            ),
        });
    }
    let raw = image.read_sectors(dir.sector, sectors as usize)?;
    DirectoryTable::parse(&raw)
}

/// Resolve a `/`-separated path such as `PSP_GAME/SYSDIR/BOOT.BIN`.
///
/// Matching is case-insensitive and ignores the `;1` version suffix.
/// Every component but the last must be a directory.
pub fn find_path<S: Read + Seek>(image: &mut DiscImage<S>, path: &str) -> Result<DirectoryEntry> {
    let not_found = || Error::FileNotFound { path: path.to_string() };

    let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
    let Some((last, parents)) = components.split_last() else {
        return Err(not_found());
    };

    let mut current = root_entry(image)?;
    for component in parents {
        let table = read_directory(image, &current)?;
        let next = find_in(&table, component).ok_or_else(not_found)?;
        if !next.flags().directory() {
            return Err(not_found());
        }
        current = next.clone();
    }

    let table = read_directory(image, &current)?;
    let found = find_in(&table, last).ok_or_else(not_found)?.clone();
    tracing::debug!("Resolved {path} to sector {} ({} bytes)", found.sector, found.size);
    Ok(found)
}

fn find_in<'a>(table: &'a DirectoryTable, name: &str) -> Option<&'a DirectoryEntry> {
    table
        .iter()
        .filter(|e| !e.is_self_or_parent())
        .find(|e| e.name_without_version().eq_ignore_ascii_case(name))
}
