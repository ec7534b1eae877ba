//! One-shot dataset setup.
//!
//! Copies the known reference datasets out of a dnabarcoder checkout into
//! the `<root>/dnabarcoder/<NAME>/` layout the rest of the application
//! expects. Re-running overwrites prior copies, so the operation is
//! idempotent.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};
use walkdir::WalkDir;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("source path {0} does not exist")]
    MissingSourceRoot(PathBuf),

    #[error("{kind} file `{filename}` for dataset {dataset} not found under {root}")]
    MissingSource {
        dataset: &'static str,
        kind: &'static str,
        filename: &'static str,
        root: PathBuf,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Files making up one known dataset in a dnabarcoder checkout.
#[derive(Debug, Clone, Copy)]
pub struct DatasetManifest {
    pub name: &'static str,
    pub reference: &'static str,
    pub classification: &'static str,
    pub cutoffs: &'static str,
    /// Secondary reference FASTA shipped by some datasets; copied when
    /// present but never required.
    pub alt_reference: Option<&'static str>,
}

/// The datasets a dnabarcoder checkout is expected to provide.
pub const DATASETS: &[DatasetManifest] = &[
    DatasetManifest {
        name: "UNITE2024ITS",
        reference: "unite2024ITS.fasta",
        classification: "unite2024ITS.classification",
        cutoffs: "unite2024ITS.unique.cutoffs.best.json",
        alt_reference: None,
    },
    DatasetManifest {
        name: "UNITE2024ITS1",
        reference: "unite2024ITS1.fasta",
        classification: "unite2024ITS1.classification",
        cutoffs: "unite2024ITS1.unique.cutoffs.best.json",
        alt_reference: None,
    },
    DatasetManifest {
        name: "UNITE2024ITS2",
        reference: "unite2024ITS2.fasta",
        classification: "unite2024ITS2.classification",
        cutoffs: "unite2024ITS2.unique.cutoffs.best.json",
        alt_reference: None,
    },
    DatasetManifest {
        name: "CBSITS",
        reference: "CBSITS.fasta",
        classification: "CBSITS.current.classification",
        cutoffs: "CBSITS.cutoffs.json",
        alt_reference: Some("CBSITS_classification.fasta"),
    },
];

/// Copy counts per dataset after a setup run.
#[derive(Debug, Default)]
pub struct SetupSummary {
    pub copied: Vec<(String, usize)>,
}

impl SetupSummary {
    pub fn total(&self) -> usize {
        self.copied.iter().map(|(_, n)| n).sum()
    }
}

/// Copy every known dataset from `source_root` into `<dest_root>/dnabarcoder/`.
pub fn organize(source_root: &Path, dest_root: &Path) -> Result<SetupSummary, SetupError> {
    if !source_root.exists() {
        return Err(SetupError::MissingSourceRoot(source_root.to_path_buf()));
    }

    let mut summary = SetupSummary::default();
    for manifest in DATASETS {
        info!("processing dataset {}", manifest.name);
        let target_dir = dest_root.join("dnabarcoder").join(manifest.name);
        fs::create_dir_all(&target_dir).map_err(|source| SetupError::Write {
            path: target_dir.clone(),
            source,
        })?;

        let mut copied = 0;
        for (kind, filename) in [
            ("reference", manifest.reference),
            ("classification", manifest.classification),
            ("cutoff", manifest.cutoffs),
        ] {
            let source = find_source_file(source_root, filename).ok_or(
                SetupError::MissingSource {
                    dataset: manifest.name,
                    kind,
                    filename,
                    root: source_root.to_path_buf(),
                },
            )?;
            copy_into(&source, &target_dir, filename)?;
            copied += 1;
        }

        if let Some(alt) = manifest.alt_reference {
            match find_source_file(source_root, alt) {
                Some(source) => {
                    copy_into(&source, &target_dir, alt)?;
                    copied += 1;
                }
                None => warn!(
                    "alternative reference {alt} not found for {}; skipping",
                    manifest.name
                ),
            }
        }

        summary.copied.push((manifest.name.to_string(), copied));
    }
    info!("copied {} files in total", summary.total());
    Ok(summary)
}

/// Locate `filename` in the checkout: first the conventional `data/`
/// directory, then anywhere below the source root.
fn find_source_file(source_root: &Path, filename: &str) -> Option<PathBuf> {
    let direct = source_root.join("data").join(filename);
    if direct.is_file() {
        return Some(direct);
    }
    WalkDir::new(source_root)
        .into_iter()
        .filter_map(Result::ok)
        .find(|entry| entry.file_type().is_file() && entry.file_name().to_str() == Some(filename))
        .map(|entry| entry.into_path())
}

fn copy_into(source: &Path, target_dir: &Path, filename: &str) -> Result<(), SetupError> {
    let target = target_dir.join(filename);
    info!("copying {} to {}", source.display(), target.display());
    fs::copy(source, &target).map_err(|source| SetupError::Write {
        path: target,
        source,
    })?;
    Ok(())
}
