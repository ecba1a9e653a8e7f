//! Image expansion
//!
//! Grows an image past its default footprint and gives every sprite a fixed
//! 64 KiB slot, rewriting the directory, location table and pack index to
//! match. Expansion is one-way and has no rollback: work on a copy.
//!
//! # Example
//!
//! ```no_run
//! use discforge::expand::{ExpansionOptions, expand_file};
//!
//! let report = expand_file("game.bin", &ExpansionOptions::new())?;
//! println!("relocated {} sprites", report.relocated_assets);
//! # Ok::<(), discforge::Error>(())
//! ```

mod options;
mod psp;
mod psx;

use std::fs::OpenOptions;
use std::io::{Read, Seek, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::iso::{DiscImage, Platform};

pub use options::{
    AuxiliaryEntry, DirectoryPlan, ExpansionOptions, ExpansionPhase, ExpansionProgress, ProgressCallback,
};
pub use psx::relocated_sector;

/// Summary of a finished expansion.
#[derive(Debug, Clone, Serialize)]
pub struct ExpansionReport {
    pub platform: Platform,
    /// Sprites moved into their own slot.
    pub relocated_assets: usize,
    /// Entries in the rewritten directory (PSX only).
    pub directory_entries: usize,
    /// Raw sectors appended or rewritten (PSX only).
    pub filler_sectors: usize,
    pub patches_applied: usize,
    /// Image length after expansion.
    pub image_len: u64,
}

/// Whether the image has already been expanded.
pub fn detect_expansion<S: Read + Seek>(image: &mut DiscImage<S>) -> Result<bool> {
    let expanded = match image.platform() {
        Platform::Psx => psx::detect(image)?,
        Platform::Psp => psp::detect(image)?,
    };
    tracing::debug!("{} image expanded: {expanded}", image.platform());
    Ok(expanded)
}

/// Expand an image in place.
///
/// # Errors
///
/// Returns [`Error::AlreadyExpanded`] if the image is already expanded.
/// Format and validation errors are raised before the first write; IO errors
/// after that point may leave the image partially written.
pub fn expand_image<S: Read + Write + Seek>(
    image: &mut DiscImage<S>,
    options: &ExpansionOptions,
) -> Result<ExpansionReport> {
    if detect_expansion(image)? {
        return Err(Error::AlreadyExpanded);
    }
    run(image, options)
}

fn run<S: Read + Write + Seek>(image: &mut DiscImage<S>, options: &ExpansionOptions) -> Result<ExpansionReport> {
    let report = match image.platform() {
        Platform::Psx => psx::expand(image, options)?,
        Platform::Psp => psp::expand(image, options)?,
    };
    options.report(ExpansionPhase::Complete, 1, 1);
    Ok(report)
}

/// Expand the image unless it already is; `None` when nothing was done.
pub fn ensure_expanded<S: Read + Write + Seek>(
    image: &mut DiscImage<S>,
    options: &ExpansionOptions,
) -> Result<Option<ExpansionReport>> {
    if detect_expansion(image)? {
        tracing::info!("Image is already expanded");
        return Ok(None);
    }
    run(image, options).map(Some)
}

/// Open an image file read/write and expand it.
pub fn expand_file<P: AsRef<Path>>(path: P, options: &ExpansionOptions) -> Result<ExpansionReport> {
    let path = path.as_ref();
    tracing::info!("Opening {:?}", path);
    let file = OpenOptions::new().read(true).write(true).open(path)?;
    let mut image = DiscImage::open(file)?;
    expand_image(&mut image, options)
}
