//! Reference dataset model and catalog.
//!
//! A reference dataset is a directory under `<root>/dnabarcoder/` holding
//! exactly three things: a reference FASTA, a tab-separated classification
//! file, and a JSON cutoff file. A dataset is only selectable once all three
//! resolve; [`ReferenceDataset::resolve`] enforces that invariant.

pub mod organizer;

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

use crate::config::Config;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("dataset directory {0} not found; run `mycoid setup` first")]
    NotFound(PathBuf),

    #[error("dataset `{name}` has no {kind} file in {dir}; re-run `mycoid setup`")]
    Incomplete {
        name: String,
        kind: &'static str,
        dir: PathBuf,
    },

    #[error("failed to read dataset file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A resolved reference dataset with its three constituent files.
#[derive(Debug, Clone)]
pub struct ReferenceDataset {
    pub name: String,
    pub display_name: String,
    pub dir: PathBuf,
    /// Reference FASTA file.
    pub reference: PathBuf,
    /// Tab-separated taxonomy mapping.
    pub classification: PathBuf,
    /// JSON cutoff file.
    pub cutoffs: PathBuf,
}

impl ReferenceDataset {
    /// Locate a dataset's files under the configured root.
    ///
    /// Any missing piece makes the whole dataset unavailable.
    pub fn resolve(config: &Config, name: &str) -> Result<Self, DatasetError> {
        let dir = config.dataset_dir(name);
        if !dir.is_dir() {
            return Err(DatasetError::NotFound(dir));
        }
        let reference = find_file(&dir, name, "reference FASTA", |file| {
            has_extension(file, "fasta") && !file_stem_contains(file, "_classification")
        })?;
        let classification = find_file(&dir, name, "classification", |file| {
            has_extension(file, "classification")
        })?;
        let cutoffs = find_file(&dir, name, "cutoff", |file| has_extension(file, "json"))?;
        debug!("resolved dataset {name} at {}", dir.display());
        Ok(ReferenceDataset {
            name: name.to_string(),
            display_name: display_name(name),
            dir,
            reference,
            classification,
            cutoffs,
        })
    }

    /// Marker region encoded in the dataset name, if recognizable.
    ///
    /// `UNITE2024ITS1` -> `ITS1`; anything containing plain `ITS` -> `ITS`.
    pub fn marker_region(&self) -> Option<&'static str> {
        if self.name.contains("ITS1") {
            Some("ITS1")
        } else if self.name.contains("ITS2") {
            Some("ITS2")
        } else if self.name.contains("ITS") {
            Some("ITS")
        } else {
            None
        }
    }
}

/// Human-facing name for a dataset directory.
pub fn display_name(name: &str) -> String {
    if let Some(region) = name.strip_prefix("UNITE2024") {
        format!("UNITE 2024 {region}")
    } else if name == "CBSITS" {
        "CBS ITS".to_string()
    } else {
        name.to_string()
    }
}

/// All complete datasets under the configured root, sorted by display name.
///
/// Incomplete directories are skipped rather than reported; they only become
/// an error when explicitly selected.
pub fn available_datasets(config: &Config) -> Vec<ReferenceDataset> {
    let dir = config.dnabarcoder_dir();
    let Ok(entries) = fs::read_dir(&dir) else {
        return Vec::new();
    };
    let mut datasets: Vec<ReferenceDataset> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            match ReferenceDataset::resolve(config, &name) {
                Ok(dataset) => Some(dataset),
                Err(err) => {
                    debug!("skipping dataset {name}: {err}");
                    None
                }
            }
        })
        .collect();
    datasets.sort_by(|a, b| a.display_name.cmp(&b.display_name));
    datasets
}

/// Details about a dataset, read from its files.
#[derive(Debug, Clone)]
pub struct DatasetInfo {
    pub dataset: ReferenceDataset,
    /// Number of sequences in the reference FASTA.
    pub sequence_count: usize,
    /// Taxonomic ranks listed in the classification header.
    pub ranks: Vec<String>,
    /// Per-rank similarity cutoffs from the cutoff file.
    pub cutoffs: BTreeMap<String, f64>,
}

/// Gather [`DatasetInfo`] for a resolved dataset.
pub fn dataset_info(config: &Config, name: &str) -> Result<DatasetInfo, DatasetError> {
    let dataset = ReferenceDataset::resolve(config, name)?;
    let sequence_count = count_sequences(&dataset.reference)?;
    let ranks = classification_ranks(&dataset.classification)?;
    let cutoffs = load_cutoffs(&dataset.cutoffs)?;
    Ok(DatasetInfo {
        dataset,
        sequence_count,
        ranks,
        cutoffs,
    })
}

fn find_file(
    dir: &Path,
    name: &str,
    kind: &'static str,
    matches: impl Fn(&Path) -> bool,
) -> Result<PathBuf, DatasetError> {
    let entries = fs::read_dir(dir).map_err(|source| DatasetError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut found: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && matches(path))
        .collect();
    found.sort();
    found.into_iter().next().ok_or(DatasetError::Incomplete {
        name: name.to_string(),
        kind,
        dir: dir.to_path_buf(),
    })
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn file_stem_contains(path: &Path, needle: &str) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.contains(needle))
}

fn count_sequences(reference: &Path) -> Result<usize, DatasetError> {
    let file = File::open(reference).map_err(|source| DatasetError::Io {
        path: reference.to_path_buf(),
        source,
    })?;
    let mut count = 0;
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|source| DatasetError::Io {
            path: reference.to_path_buf(),
            source,
        })?;
        if line.starts_with('>') {
            count += 1;
        }
    }
    Ok(count)
}

/// Taxonomic ranks from a classification header, skipping bookkeeping columns.
fn classification_ranks(classification: &Path) -> Result<Vec<String>, DatasetError> {
    let file = File::open(classification).map_err(|source| DatasetError::Io {
        path: classification.to_path_buf(),
        source,
    })?;
    let mut header = String::new();
    BufReader::new(file)
        .read_line(&mut header)
        .map_err(|source| DatasetError::Io {
            path: classification.to_path_buf(),
            source,
        })?;
    let ranks = header
        .trim_end()
        .split('\t')
        .skip(1) // ID column
        .map(|col| col.to_ascii_lowercase())
        .filter(|col| !matches!(col.as_str(), "strain number" | "id" | "strain" | "notes"))
        .collect();
    Ok(ranks)
}

/// Per-rank cutoffs from the `cut-off` section of a cutoff JSON file.
fn load_cutoffs(cutoffs: &Path) -> Result<BTreeMap<String, f64>, DatasetError> {
    let file = File::open(cutoffs).map_err(|source| DatasetError::Io {
        path: cutoffs.to_path_buf(),
        source,
    })?;
    let value: serde_json::Value =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| DatasetError::Io {
            path: cutoffs.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, source),
        })?;
    let mut out = BTreeMap::new();
    if let Some(section) = value.get("cut-off").and_then(|v| v.as_object()) {
        for (rank, entry) in section {
            // Entries are either bare numbers or objects with a nested
            // "cut-off" value, depending on the dnabarcoder version.
            let cutoff = entry
                .as_f64()
                .or_else(|| entry.get("cut-off").and_then(|v| v.as_f64()));
            if let Some(cutoff) = cutoff {
                out.insert(rank.clone(), cutoff);
            }
        }
    }
    Ok(out)
}
