//! Command-line interface.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use crate::backends::dnabarcoder::DnaBarcoderCli;
use crate::backends::taxotagger::TaxoTaggerCli;
use crate::config::Config;
use crate::datasets::{self, organizer};
use crate::dispatch::{ClassificationRequest, Dispatcher, MethodOptions};
use crate::io::fasta;
use crate::report;

#[derive(Parser)]
#[command(name = "mycoid", version, about = "Fungal DNA barcode identification via TaxoTagger and DNABarcoder", long_about = None)]
pub struct Cli {
    /// Data root directory (overrides the MYCOID_HOME environment variable)
    #[arg(long, global = true)]
    pub data_root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Copy reference datasets from a dnabarcoder checkout into the data root
    Setup {
        /// Path to the dnabarcoder repository checkout
        #[arg(short, long)]
        source: PathBuf,
    },

    /// List available reference datasets
    Datasets {
        /// Show details for one dataset instead of the listing
        #[arg(long)]
        info: Option<String>,
    },

    /// Identify sequences with one of the classification backends
    Identify {
        /// Input FASTA file(s)
        #[arg(short, long, num_args = 1.., required_unless_present = "text")]
        input: Vec<PathBuf>,

        /// Inline FASTA text instead of input files
        #[arg(long, conflicts_with = "input")]
        text: Option<String>,

        /// Classification method: taxotagger or dnabarcoder
        #[arg(short, long)]
        method: String,

        /// Embedding model name (taxotagger)
        #[arg(long)]
        model: Option<String>,

        /// Number of top matches per sequence (taxotagger)
        #[arg(long, default_value_t = 2)]
        top_k: usize,

        /// Reference dataset name (dnabarcoder)
        #[arg(short, long)]
        dataset: Option<String>,

        /// Single similarity cutoff in [0.90, 1.0]; omit to use the
        /// dataset's local cutoffs (dnabarcoder)
        #[arg(long)]
        cutoff: Option<f64>,

        /// Taxonomic rank to classify at (dnabarcoder)
        #[arg(long, default_value = "species")]
        rank: String,

        /// Confidence threshold (dnabarcoder)
        #[arg(long)]
        confidence: Option<f64>,

        /// Minimum BLAST alignment length; defaults to 400, or 50 for
        /// ITS1/ITS2 datasets (dnabarcoder)
        #[arg(long)]
        min_alignment_length: Option<usize>,

        /// Write the result table as TSV
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Path to the dnabarcoder.py script
        #[arg(long)]
        dnabarcoder_script: Option<PathBuf>,

        /// Path to the taxotagger executable
        #[arg(long)]
        taxotagger_bin: Option<PathBuf>,
    },
}

/// Main entry point for the CLI.
pub fn run_cli(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Setup { source } => {
            let summary = organizer::organize(&source, config.data_root())?;
            println!("Copied {} files:", summary.total());
            for (dataset, count) in &summary.copied {
                println!("  {dataset}: {count} files");
            }
            Ok(())
        }

        Commands::Datasets { info } => {
            if let Some(name) = info {
                let details = datasets::dataset_info(&config, &name)?;
                println!("{}", report::render_dataset_info(&details));
                return Ok(());
            }
            let available = datasets::available_datasets(&config);
            if available.is_empty() {
                bail!(
                    "no complete reference datasets under {}; run `mycoid setup` first",
                    config.dnabarcoder_dir().display()
                );
            }
            println!("{}", report::render_datasets(&available));
            Ok(())
        }

        Commands::Identify {
            input,
            text,
            method,
            model,
            top_k,
            dataset,
            cutoff,
            rank,
            confidence,
            min_alignment_length,
            output,
            dnabarcoder_script,
            taxotagger_bin,
        } => {
            let records = match text {
                Some(text) => fasta::read_str(&text)?,
                None => fasta::read_files(&input)?,
            };
            info!("read {} sequences", records.len());

            let request = ClassificationRequest {
                method,
                records,
                options: MethodOptions {
                    model,
                    top_k,
                    dataset,
                    cutoff,
                    rank,
                    confidence,
                    min_alignment_length,
                },
            };

            let semantic = TaxoTaggerCli::new(taxotagger_bin);
            let classifier = DnaBarcoderCli::new(dnabarcoder_script);
            let dispatcher = Dispatcher::new(&config, &semantic, &classifier);
            let results = dispatcher.run(&request)?;

            if results.is_empty() {
                println!("No matches found. Try adjusting the parameters or another dataset.");
                return Ok(());
            }
            println!("{}", report::render_results(&results));
            if let Some(path) = output {
                report::export_tsv(&results, &path)?;
                println!("Results written to {}", path.display());
            }
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.data_root {
        Some(root) => Config::from_root(root.clone())
            .with_context(|| format!("invalid data root {}", root.display())),
        None => Config::from_env().context("could not resolve the data root"),
    }
}
