//! Main entry point for the mycoid application.
//!
//! mycoid is a command-line front end for fungal DNA barcode
//! identification. It prepares reference datasets, reads FASTA queries,
//! and dispatches them to one of two external classification backends:
//! TaxoTagger (embeddings-based semantic search) or DNABarcoder
//! (alignment-based classification with similarity cutoffs).

// Modules defined within the project
mod backends;
mod cli;
mod config;
mod datasets;
mod dispatch;
mod io;
mod report;
mod results;

use anyhow::Result;
use clap::Parser;

use cli::{run_cli, Cli};

fn main() -> Result<()> {
    // Initialize logging (controlled by RUST_LOG)
    env_logger::init();

    // Parse command line arguments
    let cli = Cli::parse();

    // Run CLI
    run_cli(cli)?;

    Ok(())
}
