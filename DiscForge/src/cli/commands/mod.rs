use clap::Subcommand;
use std::path::PathBuf;

pub mod detect;
pub mod expand;
pub mod pack;
pub mod sprites;

#[derive(Subcommand)]
pub enum Commands {
    /// Report the platform and expansion state of an image
    Detect {
        /// Disc image (raw PSX BIN or PSP ISO)
        image: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Expand an image so every sprite gets its own 64 KiB slot
    Expand {
        /// Disc image to expand (modified in place unless --output is given)
        image: PathBuf,

        /// Copy the image here first and expand the copy
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Timestamp for new directory entries (e.g. "2024-01-31T12:00:00")
        #[arg(long)]
        timestamp: Option<chrono::NaiveDateTime>,

        /// Succeed without changes if the image is already expanded
        #[arg(long)]
        if_needed: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Suppress progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// List the sprite location table
    Sprites {
        /// Disc image
        image: PathBuf,

        /// Print the table as JSON
        #[arg(long)]
        json: bool,
    },

    /// PSP pack archive (fftpack.bin) utilities
    Pack {
        #[command(subcommand)]
        command: PackCommands,
    },
}

#[derive(Subcommand)]
pub enum PackCommands {
    /// Split the pack of a PSP image into fftpack.<index> files
    Dump {
        /// PSP disc image
        image: PathBuf,

        /// Output directory
        #[arg(short, long)]
        destination: PathBuf,
    },

    /// Join a dump directory back into one pack file
    Merge {
        /// Dump directory containing pack_index.json
        #[arg(short, long)]
        source: PathBuf,

        /// Output pack file
        #[arg(short, long)]
        destination: PathBuf,
    },
}

impl Commands {
    pub fn execute(&self) -> anyhow::Result<()> {
        match self {
            Commands::Detect { image, json } => detect::execute(image, *json),
            Commands::Expand {
                image,
                output,
                timestamp,
                if_needed,
                json,
                quiet,
            } => expand::execute(
                image,
                output.as_deref(),
                *timestamp,
                *if_needed,
                *json,
                !*quiet && !*json,
            ),
            Commands::Sprites { image, json } => sprites::execute(image, *json),
            Commands::Pack { command } => command.execute(),
        }
    }
}

impl PackCommands {
    pub fn execute(&self) -> anyhow::Result<()> {
        match self {
            PackCommands::Dump { image, destination } => pack::execute_dump(image, destination),
            PackCommands::Merge { source, destination } => pack::execute_merge(source, destination),
        }
    }
}
