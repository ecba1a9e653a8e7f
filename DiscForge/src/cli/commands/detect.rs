//! CLI command for expansion detection

use std::fs::File;
use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use crate::expand::detect_expansion;
use crate::iso::{DiscImage, Platform};

#[derive(Serialize)]
struct DetectResult {
    platform: Platform,
    len: u64,
    sector_count: u32,
    expanded: bool,
}

pub fn execute(image_path: &Path, json: bool) -> anyhow::Result<()> {
    let file = File::open(image_path).with_context(|| format!("Failed to open {}", image_path.display()))?;
    let mut image = DiscImage::open(file)?;

    let result = DetectResult {
        platform: image.platform(),
        len: image.len(),
        sector_count: image.volume_sector_count()?,
        expanded: detect_expansion(&mut image)?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Platform:      {}", result.platform);
        println!("Length:        {} bytes", result.len);
        println!("Volume size:   {} sectors", result.sector_count);
        println!("Expanded:      {}", if result.expanded { "yes" } else { "no" });
    }
    Ok(())
}
