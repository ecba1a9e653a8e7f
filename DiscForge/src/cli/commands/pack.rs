//! CLI commands for pack archive dump and merge

use std::fs::File;
use std::path::Path;
use std::time::Instant;

use anyhow::Context;

use crate::cli::progress::{PACKAGE, print_done, print_step};
use crate::iso::DiscImage;
use crate::pack::{dump_from_image, merge_dumped_files};

pub fn execute_dump(image_path: &Path, destination: &Path) -> anyhow::Result<()> {
    let started = Instant::now();
    let file = File::open(image_path).with_context(|| format!("Failed to open {}", image_path.display()))?;
    let mut image = DiscImage::open(file)?;

    print_step(1, 1, PACKAGE, &format!("Dumping pack to {}...", destination.display()));
    let index = dump_from_image(&mut image, destination)?;
    println!("{} members, {} bytes", index.len(), index.total_len());
    print_done(started.elapsed());
    Ok(())
}

pub fn execute_merge(source: &Path, destination: &Path) -> anyhow::Result<()> {
    let started = Instant::now();
    print_step(1, 1, PACKAGE, &format!("Merging {}...", source.display()));
    let index = merge_dumped_files(source, destination)
        .with_context(|| format!("Failed to merge {}", source.display()))?;
    println!("{} members, {} bytes", index.len(), index.total_len());
    print_done(started.elapsed());
    Ok(())
}
