//! Rebuild a pack from a dump directory

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use walkdir::WalkDir;

use super::dump::{INDEX_FILE_NAME, member_path, read_index};
use super::index::{PackIndex, PackMember};
use crate::error::{Error, Result};

/// Concatenate the member files of `input_dir` in index order.
///
/// Member files may have changed size since the dump; the returned index
/// describes the new layout. Files not named by the manifest are ignored.
pub fn merge_dumped_files(input_dir: &Path, output_path: &Path) -> Result<PackIndex> {
    let index = read_index(input_dir)?;
    tracing::info!("Merging {} pack members from {:?}", index.len(), input_dir);

    // check every member before creating the output
    let mut sizes = Vec::with_capacity(index.len());
    for member in &index {
        let path = member_path(input_dir, member.index);
        if !path.is_file() {
            return Err(Error::MissingMember {
                index: member.index,
                path,
            });
        }
        sizes.push(std::fs::metadata(&path)?.len());
    }
    log_unexpected_files(input_dir, &index)?;

    let mut writer = BufWriter::new(File::create(output_path)?);
    let mut members = Vec::with_capacity(index.len());
    let mut offset = 0u64;
    for (member, &len) in index.iter().zip(&sizes) {
        let mut reader = BufReader::new(File::open(member_path(input_dir, member.index))?);
        let copied = std::io::copy(&mut reader, &mut writer)?;
        if copied != len {
            return Err(Error::InvalidFormat(format!(
                "pack member {} changed size while merging",
                member.index
            )));
        }
        members.push(PackMember {
            index: member.index,
            offset,
            len,
        });
        offset += len;
    }
    writer.flush()?;

    tracing::info!("Merged pack is {offset} bytes");
    Ok(PackIndex::new(members))
}

fn log_unexpected_files(input_dir: &Path, index: &PackIndex) -> Result<()> {
    let expected: HashSet<String> = index
        .iter()
        .map(|m| format!("fftpack.{}", m.index))
        .chain(std::iter::once(INDEX_FILE_NAME.to_string()))
        .collect();

    for entry in WalkDir::new(input_dir).min_depth(1) {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy();
        if entry.depth() > 1 || !expected.contains(name.as_ref()) {
            tracing::debug!("Ignoring unexpected file in pack dump: {:?}", entry.path());
        }
    }
    Ok(())
}
