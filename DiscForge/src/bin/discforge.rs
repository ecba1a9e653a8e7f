//! DiscForge command-line entry point

fn main() -> anyhow::Result<()> {
    discforge::cli::run_cli()
}
