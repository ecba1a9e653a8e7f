//! CLI command for listing the sprite location table

use std::fs::File;
use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use crate::iso::DiscImage;
use crate::sprites::read_location_table;

#[derive(Serialize)]
struct SlotRow {
    slot: usize,
    sector: u32,
    size: u32,
}

pub fn execute(image_path: &Path, json: bool) -> anyhow::Result<()> {
    let file = File::open(image_path).with_context(|| format!("Failed to open {}", image_path.display()))?;
    let mut image = DiscImage::open(file)?;
    let table = read_location_table(&mut image)?;

    let rows: Vec<SlotRow> = table
        .iter()
        .enumerate()
        .map(|(slot, loc)| SlotRow {
            slot,
            sector: loc.sector,
            size: loc.size,
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{:>4}  {:>8}  {:>8}", "slot", "sector", "size");
    for row in &rows {
        println!("{:>4X}  {:>8}  {:>8}", row.slot, row.sector, row.size);
    }
    println!("{} slots", rows.len());
    Ok(())
}
