//! # DiscForge
//!
//! A pure-Rust library for expanding and patching the disc images of one
//! game in its PSX (raw `MODE2/2352`) and PSP (cooked ISO-9660) releases.
//!
//! ## Components
//!
//! - **Disc image accessor** - Logical/physical sector mapping, patch application
//! - **Directory tables** - ISO-9660 directory record codec and path lookup
//! - **Sprite location table** - `(sector, size)` slots inside the executables
//! - **Pack archive** - Dump and merge `fftpack.bin` members
//! - **Expansion** - Grow an image and relocate every sprite into its own slot
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::fs::OpenOptions;
//! use discforge::prelude::*;
//!
//! let file = OpenOptions::new().read(true).write(true).open("game.bin")?;
//! let mut image = DiscImage::open(file)?;
//! if !detect_expansion(&mut image)? {
//!     let report = expand_image(&mut image, &ExpansionOptions::new())?;
//!     println!("{} sprites relocated", report.relocated_assets);
//! }
//! # Ok::<(), discforge::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` - Enables the `discforge` command-line binary

pub mod directory;
pub mod error;
pub mod expand;
pub mod iso;
pub mod pack;
pub mod patch;
pub mod sprites;

// Re-exports for convenience
pub use error::{Error, ErrorKind, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::iso::{DiscImage, Msf, PAYLOAD_SIZE, Platform};
    pub use crate::patch::{BothEndianField, FilePosition, Patch};

    pub use crate::directory::{DirectoryEntry, DirectoryTable, FileFlags, RecordTimestamp, find_path};
    pub use crate::sprites::{SpriteLocation, SpriteLocationTable, SpriteTableLayout};
    pub use crate::pack::{PackIndex, PackMember, dump_to_directory, merge_dumped_files};

    pub use crate::expand::{
        DirectoryPlan, ExpansionOptions, ExpansionPhase, ExpansionProgress, ExpansionReport,
        detect_expansion, ensure_expanded, expand_file, expand_image,
    };
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;
