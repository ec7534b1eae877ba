//! Classification backends.
//!
//! The actual identification engines are external, pre-existing tools: a
//! semantic-search taxonomy tagger and the dnabarcoder cutoff classifier
//! (which itself shells out to BLAST). This module defines the two
//! capability traits the dispatcher talks to, so the real subprocess-backed
//! implementations and test doubles are interchangeable. Backend output is
//! treated as an opaque, versioned contract: scores and ordering are passed
//! through without reinterpretation, and a failing tool's message is
//! surfaced verbatim.

pub mod dnabarcoder;
pub mod taxotagger;

use std::path::{Path, PathBuf};
use std::process::Command;

use indexmap::IndexMap;
use log::debug;
use thiserror::Error;

use crate::datasets::ReferenceDataset;
use crate::results::{ResultRow, TaxonomyRank};

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to launch {tool}: {source}")]
    Launch {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} failed ({status}): {stderr}")]
    Failed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("{tool} produced no {what} in {dir}")]
    MissingOutput {
        tool: String,
        what: String,
        dir: PathBuf,
    },

    #[error("could not parse {tool} output: {message}")]
    Parse { tool: String, message: String },

    #[error("I/O error while running {tool}: {source}")]
    Io {
        tool: String,
        #[source]
        source: std::io::Error,
    },
}

/// Run an external tool to completion, capturing its output.
///
/// A non-zero exit becomes [`BackendError::Failed`] carrying the tool's own
/// stderr. No timeout: a hang in the tool hangs the request.
pub(crate) fn run_tool(cmd: &mut Command, tool: &str) -> Result<std::process::Output, BackendError> {
    debug!("running {cmd:?}");
    let output = cmd.output().map_err(|source| BackendError::Launch {
        tool: tool.to_string(),
        source,
    })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(BackendError::Failed {
            tool: tool.to_string(),
            status: output.status.to_string(),
            stderr,
        });
    }
    Ok(output)
}

/// One semantic-search match at one taxonomic rank.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticMatch {
    /// Reference sequence the match points at.
    pub hit_id: String,
    /// Similarity reported by the vector search.
    pub distance: f64,
    /// Taxon name at this rank, possibly empty.
    pub label: String,
}

/// Semantic-search results: per rank, one ranked match list per query,
/// in query submission order.
#[derive(Debug, Clone, Default)]
pub struct SemanticHits {
    pub per_rank: IndexMap<TaxonomyRank, Vec<Vec<SemanticMatch>>>,
}

impl SemanticHits {
    /// Number of query groups the backend returned.
    pub fn query_count(&self) -> usize {
        self.per_rank
            .values()
            .map(|per_query| per_query.len())
            .max()
            .unwrap_or(0)
    }
}

/// Options forwarded to the cutoff classifier.
#[derive(Debug, Clone)]
pub struct ClassifyOptions {
    /// Minimum BLAST alignment length.
    pub min_alignment_length: usize,
    pub cutoff: CutoffStrategy,
    /// Taxonomic rank to classify at.
    pub rank: String,
    /// Optional confidence threshold.
    pub confidence: Option<f64>,
}

/// How the classifier picks its similarity cutoffs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CutoffStrategy {
    /// Taxon-specific cutoffs from the dataset's cutoff file.
    Local,
    /// One global cutoff for all taxa.
    Single(f64),
}

/// Embedding/vector-search capability: top-K matches per query sequence.
pub trait SemanticSearch {
    fn top_k_matches(
        &self,
        query_fasta: &Path,
        db_dir: &Path,
        model: &str,
        k: usize,
    ) -> Result<SemanticHits, BackendError>;
}

/// Cutoff-based classification capability.
pub trait CutoffClassifier {
    fn classify(
        &self,
        query_fasta: &Path,
        dataset: &ReferenceDataset,
        options: &ClassifyOptions,
    ) -> Result<Vec<ResultRow>, BackendError>;
}
