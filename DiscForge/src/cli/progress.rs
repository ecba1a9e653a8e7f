//! CLI progress display utilities
//!
//! Step indicators with emoji and a progress bar fed by expansion updates.

use std::time::Duration;

use console::{Emoji, style};
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};

use crate::expand::ExpansionProgress;

/// Magnifying glass - for reading/scanning operations
pub static LOOKING_GLASS: Emoji<'_, '_> = Emoji("🔍 ", "");
/// Package - for pack operations
pub static PACKAGE: Emoji<'_, '_> = Emoji("📦 ", "");
/// Floppy disk - for writing/saving operations
pub static DISK: Emoji<'_, '_> = Emoji("💾 ", "");
/// Sparkles - for completion
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "");

/// Print a step indicator: `[1/3] 📦 Message...`
pub fn print_step(current: usize, total: usize, emoji: Emoji, msg: &str) {
    println!(
        "{} {}{}",
        style(format!("[{current}/{total}]")).bold().dim(),
        emoji,
        msg
    );
}

/// Print completion message: `✨ Done in 2s`
pub fn print_done(elapsed: Duration) {
    println!("{} Done in {}", SPARKLE, HumanDuration(elapsed));
}

/// Progress bar style with percentage
///
/// Format: `Writing filler sectors [████████░░░░░░░░] 50% (50/100)`
///
/// # Panics
/// Panics if the template string is invalid (this is a compile-time constant).
#[must_use]
pub fn bar_style_with_percent() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{msg:24} [{bar:40.cyan/blue}] {percent}% ({pos}/{len})")
        .expect("valid template")
}

/// Create a progress bar that follows expansion phases.
#[must_use]
pub fn expansion_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(bar_style_with_percent());
    pb
}

/// Apply one expansion update to a bar created by [`expansion_bar`].
pub fn update_expansion_bar(pb: &ProgressBar, progress: &ExpansionProgress) {
    pb.set_message(progress.phase.as_str());
    pb.set_length(progress.total as u64);
    pb.set_position(progress.current as u64);
}
