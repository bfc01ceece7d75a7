use anyhow::Result;
use clap::Parser;

use purldb_toolkit::cli::{Cli, Commands};
use purldb_toolkit::commands::run_capability;
use purldb_toolkit::common::Capability;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Metadata(args) => {
            run_capability(Capability::Metadata, args, false)?;
        }
        Commands::Urls(args) => {
            run_capability(Capability::Urls, args.query, args.head)?;
        }
        Commands::Validate(args) => {
            run_capability(Capability::Validate, args, false)?;
        }
        Commands::Versions(args) => {
            run_capability(Capability::Versions, args, false)?;
        }
    }

    Ok(())
}
