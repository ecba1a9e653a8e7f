//! CLI command for image expansion

use std::fs::OpenOptions;
use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use chrono::NaiveDateTime;

use crate::cli::progress::{DISK, LOOKING_GLASS, expansion_bar, print_done, print_step, update_expansion_bar};
use crate::expand::{ExpansionOptions, ExpansionReport, ensure_expanded, expand_image};
use crate::iso::DiscImage;

pub fn execute(
    source: &Path,
    output: Option<&Path>,
    timestamp: Option<NaiveDateTime>,
    if_needed: bool,
    json: bool,
    progress: bool,
) -> anyhow::Result<()> {
    let started = Instant::now();

    let target = match output {
        Some(output) => {
            if progress {
                print_step(1, 3, DISK, &format!("Copying to {}...", output.display()));
            }
            std::fs::copy(source, output)
                .with_context(|| format!("Failed to copy {} to {}", source.display(), output.display()))?;
            output
        }
        None => source,
    };

    if progress {
        print_step(2, 3, LOOKING_GLASS, "Reading image...");
    }
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(target)
        .with_context(|| format!("Failed to open {}", target.display()))?;
    let mut image = DiscImage::open(file)?;

    let mut options = ExpansionOptions::new();
    if let Some(timestamp) = timestamp {
        options = options.with_timestamp(timestamp);
    }
    let bar = progress.then(expansion_bar);
    if let Some(pb) = bar.clone() {
        options = options.with_progress(move |p| update_expansion_bar(&pb, p));
    }

    if progress {
        print_step(3, 3, DISK, &format!("Expanding {} image...", image.platform()));
    }
    let report = if if_needed {
        ensure_expanded(&mut image, &options)?
    } else {
        Some(expand_image(&mut image, &options).with_context(|| format!("Failed to expand {}", target.display()))?)
    };
    if let Some(pb) = bar {
        pb.finish_and_clear();
    }

    match report {
        Some(report) if json => println!("{}", serde_json::to_string_pretty(&report)?),
        Some(report) => print_report(&report),
        None if json => println!("null"),
        None => println!("Image is already expanded; nothing to do"),
    }
    if progress {
        print_done(started.elapsed());
    }
    Ok(())
}

fn print_report(report: &ExpansionReport) {
    println!("Platform:           {}", report.platform);
    println!("Relocated sprites:  {}", report.relocated_assets);
    if report.directory_entries > 0 {
        println!("Directory entries:  {}", report.directory_entries);
    }
    if report.filler_sectors > 0 {
        println!("Filler sectors:     {}", report.filler_sectors);
    }
    println!("Patches applied:    {}", report.patches_applied);
    println!("Image length:       {} bytes", report.image_len);
}
