//! Cutoff-classification backend: the external dnabarcoder script.
//!
//! dnabarcoder works in two stages, both run here as subprocesses in a
//! scratch directory: `search` aligns the queries against the reference
//! FASTA with BLAST and writes a `.bestmatch` file, then `classify` turns
//! the best matches into taxonomic calls using either the dataset's local
//! cutoff file or one global cutoff, writing a tab-separated `.classified`
//! file. Only that final table is parsed; everything in between is
//! dnabarcoder's own business.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::debug;

use super::{run_tool, BackendError, ClassifyOptions, CutoffClassifier, CutoffStrategy};
use crate::datasets::ReferenceDataset;
use crate::results::{ResultRow, TaxonomyRank};

const TOOL: &str = "dnabarcoder";

/// Header names the query-ID column may go by, tried in order.
const ID_COLUMNS: &[&str] = &[
    "id",
    "query",
    "query id",
    "queryid",
    "name",
    "sequenceid",
    "sequence_id",
    "seqid",
];

/// Invokes `dnabarcoder.py` through a Python interpreter.
pub struct DnaBarcoderCli {
    python: PathBuf,
    script: PathBuf,
}

impl DnaBarcoderCli {
    /// `script` defaults to `dnabarcoder/dnabarcoder.py` relative to the
    /// working directory, matching a sibling checkout.
    pub fn new(script: Option<PathBuf>) -> Self {
        DnaBarcoderCli {
            python: PathBuf::from("python"),
            script: script.unwrap_or_else(|| PathBuf::from("dnabarcoder/dnabarcoder.py")),
        }
    }

    fn base_command(&self, subcommand: &str) -> Command {
        let mut cmd = Command::new(&self.python);
        cmd.arg(&self.script).arg(subcommand);
        cmd
    }

    /// Stage one: BLAST search for best matches.
    fn search(
        &self,
        query_fasta: &Path,
        dataset: &ReferenceDataset,
        min_alignment_length: usize,
        workdir: &Path,
    ) -> Result<PathBuf, BackendError> {
        let mut cmd = self.base_command("search");
        cmd.arg("-i")
            .arg(query_fasta)
            .arg("-r")
            .arg(&dataset.reference)
            .arg("-ml")
            .arg(min_alignment_length.to_string())
            .arg("-o")
            .arg(workdir);
        run_tool(&mut cmd, TOOL)?;

        // dnabarcoder names the result `<query>.<reference>_BLAST.bestmatch`;
        // fall back to any .bestmatch file in the scratch directory.
        let query_name = file_name(query_fasta);
        let reference_stem = file_name(&dataset.reference).replace(".fasta", "");
        let expected = workdir.join(format!("{query_name}.{reference_stem}_BLAST.bestmatch"));
        if expected.is_file() {
            return Ok(expected);
        }
        find_output(workdir, "bestmatch").ok_or_else(|| BackendError::MissingOutput {
            tool: TOOL.to_string(),
            what: ".bestmatch file".to_string(),
            dir: workdir.to_path_buf(),
        })
    }

    /// Stage two: classification of the best matches.
    fn classify_bestmatch(
        &self,
        bestmatch: &Path,
        dataset: &ReferenceDataset,
        options: &ClassifyOptions,
        workdir: &Path,
    ) -> Result<PathBuf, BackendError> {
        let mut cmd = self.base_command("classify");
        cmd.arg("-i")
            .arg(bestmatch)
            .arg("-c")
            .arg(&dataset.classification)
            .arg("-o")
            .arg(workdir);
        match options.cutoff {
            CutoffStrategy::Single(value) => {
                cmd.arg("-cutoff").arg(value.to_string());
            }
            CutoffStrategy::Local => {
                cmd.arg("-cutoffs").arg(&dataset.cutoffs);
            }
        }
        if !options.rank.is_empty() {
            cmd.arg("-rank").arg(&options.rank);
        }
        if let Some(confidence) = options.confidence {
            cmd.arg("-confidence").arg(confidence.to_string());
        }
        run_tool(&mut cmd, TOOL)?;

        find_output(workdir, "classified").ok_or_else(|| BackendError::MissingOutput {
            tool: TOOL.to_string(),
            what: ".classified file".to_string(),
            dir: workdir.to_path_buf(),
        })
    }
}

impl CutoffClassifier for DnaBarcoderCli {
    fn classify(
        &self,
        query_fasta: &Path,
        dataset: &ReferenceDataset,
        options: &ClassifyOptions,
    ) -> Result<Vec<ResultRow>, BackendError> {
        let workdir = tempfile::tempdir().map_err(|source| BackendError::Io {
            tool: TOOL.to_string(),
            source,
        })?;
        let bestmatch = self.search(
            query_fasta,
            dataset,
            options.min_alignment_length,
            workdir.path(),
        )?;
        debug!("best matches at {}", bestmatch.display());
        let classified = self.classify_bestmatch(&bestmatch, dataset, options, workdir.path())?;
        let content = fs::read_to_string(&classified).map_err(|source| BackendError::Io {
            tool: TOOL.to_string(),
            source,
        })?;
        parse_classified(&content)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn find_output(dir: &Path, extension: &str) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .find(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext == extension)
        })
}

/// Parse a `.classified` table into result rows.
///
/// Column names vary slightly between dnabarcoder versions, so lookups are
/// case-insensitive and tolerant of absent columns.
pub(crate) fn parse_classified(content: &str) -> Result<Vec<ResultRow>, BackendError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(content.as_bytes());
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| BackendError::Parse {
            tool: TOOL.to_string(),
            message: e.to_string(),
        })?
        .iter()
        .map(|h| h.trim().to_ascii_lowercase())
        .collect();

    let column = |name: &str| headers.iter().position(|h| h == name);
    let id_column = ID_COLUMNS.iter().find_map(|name| column(name)).unwrap_or(0);
    let hit_column = column("referenceid").or_else(|| column("reference id"));
    let lineage_column = column("full classification");
    let score_column = column("blast sim").or_else(|| column("score"));
    let rank_column = column("rank");
    let cutoff_column = column("cut-off").or_else(|| column("cutoff"));
    let confidence_column = column("confidence");

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| BackendError::Parse {
            tool: TOOL.to_string(),
            message: e.to_string(),
        })?;
        let field = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .map(str::trim)
                .unwrap_or_default()
        };

        let mut row = ResultRow {
            query_id: field(Some(id_column)).to_string(),
            hit_id: field(hit_column).to_string(),
            rank: field(rank_column).to_ascii_lowercase(),
            score: parse_float(field(score_column)),
            cutoff: parse_float(field(cutoff_column)),
            confidence: parse_float(field(confidence_column)),
            ..ResultRow::default()
        };
        row.apply_lineage(field(lineage_column));
        // Some versions also emit per-rank columns; those win over the
        // lineage string when present.
        for rank in TaxonomyRank::all() {
            if let Some(idx) = column(rank.as_str()) {
                if let Some(value) = record.get(idx) {
                    if !value.trim().is_empty() {
                        row.set_label(rank, value);
                    }
                }
            }
        }
        if row.query_id.is_empty() {
            continue;
        }
        rows.push(row);
    }
    Ok(rows)
}

fn parse_float(value: &str) -> Option<f64> {
    if value.is_empty() {
        return None;
    }
    value.parse().ok()
}
