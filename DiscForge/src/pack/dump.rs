//! Split a pack into one file per member

use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::index::PackIndex;
use crate::directory::find_path;
use crate::error::{Error, Result};
use crate::iso::layout::psp::{BOOT_BIN_PATH, FFTPACK_PATH, SECTOR_MAP_LEN, SECTOR_MAP_OFFSET};
use crate::iso::{DiscImage, PAYLOAD_SIZE, Platform};

/// Name of the manifest written next to the member files.
pub const INDEX_FILE_NAME: &str = "pack_index.json";

/// Path of the dumped file for member `index`.
#[must_use]
pub fn member_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("fftpack.{index}"))
}

/// Write the manifest for a dump directory.
pub fn write_index(dir: &Path, index: &PackIndex) -> Result<()> {
    let file = File::create(dir.join(INDEX_FILE_NAME))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, index)?;
    writer.flush()?;
    Ok(())
}

/// Read the manifest of a dump directory.
pub fn read_index(dir: &Path) -> Result<PackIndex> {
    let file = File::open(dir.join(INDEX_FILE_NAME))?;
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}

/// Split the pack read from `reader` into `output_dir`.
///
/// Member offsets are relative to the reader's position on entry, so a disc
/// image positioned at the start of the embedded pack can be passed directly.
pub fn dump_to_directory<R: Read + Seek>(reader: &mut R, index: &PackIndex, output_dir: &Path) -> Result<()> {
    let base = reader.stream_position()?;
    std::fs::create_dir_all(output_dir)?;
    tracing::info!("Dumping {} pack members to {:?}", index.len(), output_dir);

    for member in index {
        reader.seek(SeekFrom::Start(base + member.offset))?;
        let path = member_path(output_dir, member.index);
        let mut writer = BufWriter::new(File::create(&path)?);
        let copied = std::io::copy(&mut reader.by_ref().take(member.len), &mut writer)?;
        if copied != member.len {
            return Err(Error::TruncatedMember {
                index: member.index,
                expected: member.len,
                actual: copied,
            });
        }
        writer.flush()?;
        tracing::debug!("Dumped member {} ({} bytes)", member.index, member.len);
    }

    write_index(output_dir, index)?;
    Ok(())
}

/// Dump the pack embedded in a PSP image, deriving member ranges from the
/// sector map in `BOOT.BIN`.
pub fn dump_from_image<S: Read + Seek>(image: &mut DiscImage<S>, output_dir: &Path) -> Result<PackIndex> {
    if image.platform() != Platform::Psp {
        return Err(Error::InvalidFormat(format!(
            "{} images carry no pack archive",
            image.platform()
        )));
    }
    let pack = find_path(image, FFTPACK_PATH)?;
    let boot = find_path(image, BOOT_BIN_PATH)?;
    let map = image.read_file(boot.sector, u64::from(SECTOR_MAP_OFFSET), SECTOR_MAP_LEN)?;
    let index = PackIndex::from_sector_map(&map, pack.sector, u64::from(pack.size))?;

    let stream = image.get_mut();
    stream.seek(SeekFrom::Start(u64::from(pack.sector) * PAYLOAD_SIZE))?;
    dump_to_directory(stream, &index, output_dir)?;
    Ok(index)
}
