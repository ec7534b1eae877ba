//! Method dispatch: from a validated request to a backend call.
//!
//! Each request is stateless and single-shot: validate the method name and
//! the method-specific parameters, resolve whatever the backend needs from
//! the configuration, invoke it once, and hand back the normalized table.
//! Backend failures are wrapped, never retried and never reinterpreted.

use std::str::FromStr;

use log::info;
use thiserror::Error;

use crate::backends::{
    BackendError, ClassifyOptions, CutoffClassifier, CutoffStrategy, SemanticSearch,
};
use crate::config::Config;
use crate::datasets::{DatasetError, ReferenceDataset};
use crate::io::fasta::{self, SeqRecord};
use crate::results::ResultTable;

/// Bounds on the single-cutoff strategy.
pub const MIN_ALLOWED_CUTOFF: f64 = 0.90;
pub const MAX_ALLOWED_CUTOFF: f64 = 1.0;
pub const DEFAULT_CUTOFF: f64 = 0.97;

/// Minimum BLAST alignment lengths by marker region. Full ITS reads are
/// long; the ITS1/ITS2 sub-regions are much shorter.
pub const DEFAULT_MIN_ALIGNMENT: usize = 400;
pub const SUBREGION_MIN_ALIGNMENT: usize = 50;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("unsupported method `{0}`; expected `taxotagger` or `dnabarcoder`")]
    UnsupportedMethod(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("dataset unavailable: {0}")]
    DatasetNotFound(#[from] DatasetError),

    #[error("classification backend failed: {0}")]
    Backend(#[from] BackendError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The fixed set of classification methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    TaxoTagger,
    DnaBarcoder,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::TaxoTagger => "taxotagger",
            Method::DnaBarcoder => "dnabarcoder",
        }
    }
}

impl FromStr for Method {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "taxotagger" => Ok(Method::TaxoTagger),
            "dnabarcoder" => Ok(Method::DnaBarcoder),
            _ => Err(DispatchError::UnsupportedMethod(s.to_string())),
        }
    }
}

/// Method-specific knobs, mirroring the command-line flags. Which fields
/// matter depends on the selected method; the dispatcher validates the
/// combination.
#[derive(Debug, Clone)]
pub struct MethodOptions {
    /// Embedding model name (taxotagger).
    pub model: Option<String>,
    /// Matches requested per query (taxotagger).
    pub top_k: usize,
    /// Reference dataset name (dnabarcoder).
    pub dataset: Option<String>,
    /// Single global cutoff; `None` selects the dataset's local cutoffs
    /// (dnabarcoder).
    pub cutoff: Option<f64>,
    /// Rank to classify at (dnabarcoder).
    pub rank: String,
    /// Confidence threshold (dnabarcoder).
    pub confidence: Option<f64>,
    /// Override for the minimum BLAST alignment length (dnabarcoder).
    pub min_alignment_length: Option<usize>,
}

impl Default for MethodOptions {
    fn default() -> Self {
        MethodOptions {
            model: None,
            top_k: 2,
            dataset: None,
            cutoff: None,
            rank: "species".to_string(),
            confidence: None,
            min_alignment_length: None,
        }
    }
}

/// One classification request: sequences, a method selector, and its
/// parameters. Consumed once; not persisted.
#[derive(Debug, Clone)]
pub struct ClassificationRequest {
    pub method: String,
    pub records: Vec<SeqRecord>,
    pub options: MethodOptions,
}

/// Bridges requests to the two backend capabilities.
pub struct Dispatcher<'a> {
    config: &'a Config,
    semantic: &'a dyn SemanticSearch,
    classifier: &'a dyn CutoffClassifier,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        config: &'a Config,
        semantic: &'a dyn SemanticSearch,
        classifier: &'a dyn CutoffClassifier,
    ) -> Self {
        Dispatcher {
            config,
            semantic,
            classifier,
        }
    }

    /// Run a single classification attempt.
    pub fn run(&self, request: &ClassificationRequest) -> Result<ResultTable, DispatchError> {
        let method = Method::from_str(&request.method)?;
        fasta::validate(&request.records)
            .map_err(|e| DispatchError::Validation(e.to_string()))?;
        info!(
            "dispatching {} sequences to {}",
            request.records.len(),
            method.as_str()
        );
        match method {
            Method::TaxoTagger => self.run_taxotagger(request),
            Method::DnaBarcoder => self.run_dnabarcoder(request),
        }
    }

    fn run_taxotagger(&self, request: &ClassificationRequest) -> Result<ResultTable, DispatchError> {
        let options = &request.options;
        let model = options.model.as_deref().ok_or_else(|| {
            DispatchError::Validation("an embedding model must be chosen for taxotagger".into())
        })?;
        if options.top_k == 0 {
            return Err(DispatchError::Validation(
                "top-k must be a positive integer".into(),
            ));
        }

        let workdir = tempfile::tempdir()?;
        let query_fasta = workdir.path().join("query.fasta");
        fasta::write_fasta(&request.records, &query_fasta)?;

        let hits = self.semantic.top_k_matches(
            &query_fasta,
            &self.config.taxotagger_dir(),
            model,
            options.top_k,
        )?;
        if hits.query_count() != request.records.len() {
            return Err(DispatchError::Backend(BackendError::Parse {
                tool: "taxotagger".to_string(),
                message: format!(
                    "expected results for {} sequences, got {}",
                    request.records.len(),
                    hits.query_count()
                ),
            }));
        }

        let query_ids: Vec<String> = request.records.iter().map(|r| r.id.clone()).collect();
        Ok(ResultTable::from_semantic_hits(&hits, &query_ids, options.top_k))
    }

    fn run_dnabarcoder(
        &self,
        request: &ClassificationRequest,
    ) -> Result<ResultTable, DispatchError> {
        let options = &request.options;
        let name = options.dataset.as_deref().ok_or_else(|| {
            DispatchError::Validation("a reference dataset must be selected for dnabarcoder".into())
        })?;
        let cutoff = match options.cutoff {
            Some(value) => {
                if !(MIN_ALLOWED_CUTOFF..=MAX_ALLOWED_CUTOFF).contains(&value) {
                    return Err(DispatchError::Validation(format!(
                        "invalid cutoff value {value}; must be between {MIN_ALLOWED_CUTOFF} and {MAX_ALLOWED_CUTOFF}"
                    )));
                }
                CutoffStrategy::Single(value)
            }
            None => CutoffStrategy::Local,
        };
        let dataset = ReferenceDataset::resolve(self.config, name)?;
        let min_alignment_length = options
            .min_alignment_length
            .unwrap_or_else(|| default_min_alignment(&dataset));

        let workdir = tempfile::tempdir()?;
        let query_fasta = workdir.path().join("query.fasta");
        fasta::write_fasta(&request.records, &query_fasta)?;

        let classify_options = ClassifyOptions {
            min_alignment_length,
            cutoff,
            rank: options.rank.clone(),
            confidence: options.confidence,
        };
        let rows = self
            .classifier
            .classify(&query_fasta, &dataset, &classify_options)?;

        let query_ids: Vec<String> = request.records.iter().map(|r| r.id.clone()).collect();
        Ok(ResultTable::from_classified_rows(
            Method::DnaBarcoder.as_str(),
            rows,
            &query_ids,
        ))
    }
}

/// Region-appropriate minimum alignment length for a dataset.
pub fn default_min_alignment(dataset: &ReferenceDataset) -> usize {
    match dataset.marker_region() {
        Some("ITS1") | Some("ITS2") => SUBREGION_MIN_ALIGNMENT,
        _ => DEFAULT_MIN_ALIGNMENT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{SemanticHits, SemanticMatch};
    use crate::results::{ResultRow, TaxonomyRank};
    use std::cell::Cell;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// Semantic double returning `per_query` matches for `queries` queries.
    struct FakeSemantic {
        queries: usize,
        per_query: usize,
        called: Cell<bool>,
    }

    impl FakeSemantic {
        fn new(queries: usize, per_query: usize) -> Self {
            FakeSemantic {
                queries,
                per_query,
                called: Cell::new(false),
            }
        }
    }

    impl SemanticSearch for FakeSemantic {
        fn top_k_matches(
            &self,
            _query: &Path,
            _db_dir: &Path,
            _model: &str,
            k: usize,
        ) -> Result<SemanticHits, BackendError> {
            self.called.set(true);
            let mut hits = SemanticHits::default();
            let per_query: Vec<Vec<SemanticMatch>> = (0..self.queries)
                .map(|_| {
                    (0..self.per_query.min(k))
                        .map(|j| SemanticMatch {
                            hit_id: format!("hit{j}"),
                            distance: 0.99,
                            label: format!("Species{j}"),
                        })
                        .collect()
                })
                .collect();
            hits.per_rank.insert(TaxonomyRank::Species, per_query);
            Ok(hits)
        }
    }

    /// Classifier double returning one row per query.
    struct FakeClassifier {
        called: Cell<bool>,
        fail_with: Option<String>,
    }

    impl FakeClassifier {
        fn new() -> Self {
            FakeClassifier {
                called: Cell::new(false),
                fail_with: None,
            }
        }

        fn failing(message: &str) -> Self {
            FakeClassifier {
                called: Cell::new(false),
                fail_with: Some(message.to_string()),
            }
        }
    }

    impl CutoffClassifier for FakeClassifier {
        fn classify(
            &self,
            query_fasta: &Path,
            _dataset: &ReferenceDataset,
            _options: &ClassifyOptions,
        ) -> Result<Vec<ResultRow>, BackendError> {
            self.called.set(true);
            if let Some(message) = &self.fail_with {
                return Err(BackendError::Failed {
                    tool: "dnabarcoder".to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: message.clone(),
                });
            }
            let records = fasta::read_files(&[query_fasta.to_path_buf()]).unwrap();
            Ok(records
                .iter()
                .map(|r| ResultRow {
                    query_id: r.id.clone(),
                    species: "Fusarium oxysporum".to_string(),
                    score: Some(0.99),
                    ..ResultRow::default()
                })
                .collect())
        }
    }

    fn records(n: usize) -> Vec<SeqRecord> {
        (0..n)
            .map(|i| SeqRecord {
                id: format!("q{i}"),
                sequence: format!("ACGTACGT{i}"),
            })
            .collect()
    }

    fn make_dataset_dir(root: &Path, name: &str) {
        let dir = root.join("dnabarcoder").join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{name}.fasta")), ">r1\nACGT\n").unwrap();
        fs::write(dir.join(format!("{name}.classification")), "id\tspecies\n").unwrap();
        fs::write(dir.join(format!("{name}.cutoffs.json")), "{}").unwrap();
    }

    fn request(method: &str, options: MethodOptions, n: usize) -> ClassificationRequest {
        ClassificationRequest {
            method: method.to_string(),
            records: records(n),
            options,
        }
    }

    #[test]
    fn test_unsupported_method_no_backend_invoked() {
        let root = TempDir::new().unwrap();
        let config = Config::from_root(root.path()).unwrap();
        let semantic = FakeSemantic::new(1, 1);
        let classifier = FakeClassifier::new();
        let dispatcher = Dispatcher::new(&config, &semantic, &classifier);

        let err = dispatcher
            .run(&request("unsupported_method_xyz", MethodOptions::default(), 1))
            .unwrap_err();
        assert!(matches!(err, DispatchError::UnsupportedMethod(_)));
        assert!(!semantic.called.get());
        assert!(!classifier.called.get());
    }

    #[test]
    fn test_taxotagger_requires_model() {
        let root = TempDir::new().unwrap();
        let config = Config::from_root(root.path()).unwrap();
        let semantic = FakeSemantic::new(1, 1);
        let classifier = FakeClassifier::new();
        let dispatcher = Dispatcher::new(&config, &semantic, &classifier);

        let err = dispatcher
            .run(&request("taxotagger", MethodOptions::default(), 1))
            .unwrap_err();
        assert!(matches!(err, DispatchError::Validation(_)));
    }

    #[test]
    fn test_taxotagger_rejects_zero_k() {
        let root = TempDir::new().unwrap();
        let config = Config::from_root(root.path()).unwrap();
        let semantic = FakeSemantic::new(3, 5);
        let classifier = FakeClassifier::new();
        let dispatcher = Dispatcher::new(&config, &semantic, &classifier);

        let options = MethodOptions {
            model: Some("MycoAI-CNN".to_string()),
            top_k: 0,
            ..MethodOptions::default()
        };
        let err = dispatcher.run(&request("taxotagger", options, 3)).unwrap_err();
        assert!(matches!(err, DispatchError::Validation(_)));
        assert!(!semantic.called.get());
    }

    #[test]
    fn test_taxotagger_result_shape() {
        let root = TempDir::new().unwrap();
        let config = Config::from_root(root.path()).unwrap();
        let semantic = FakeSemantic::new(3, 5);
        let classifier = FakeClassifier::new();
        let dispatcher = Dispatcher::new(&config, &semantic, &classifier);

        let options = MethodOptions {
            model: Some("MycoAI-CNN".to_string()),
            top_k: 5,
            ..MethodOptions::default()
        };
        let table = dispatcher.run(&request("taxotagger", options, 3)).unwrap();
        let grouped = table.by_query();
        assert_eq!(grouped.len(), 3);
        for (_, rows) in grouped {
            assert!(rows.len() <= 5);
        }
    }

    #[test]
    fn test_taxotagger_query_count_mismatch() {
        let root = TempDir::new().unwrap();
        let config = Config::from_root(root.path()).unwrap();
        let semantic = FakeSemantic::new(2, 1); // backend answers for 2 queries
        let classifier = FakeClassifier::new();
        let dispatcher = Dispatcher::new(&config, &semantic, &classifier);

        let options = MethodOptions {
            model: Some("MycoAI-CNN".to_string()),
            ..MethodOptions::default()
        };
        let err = dispatcher.run(&request("taxotagger", options, 3)).unwrap_err();
        assert!(matches!(err, DispatchError::Backend(_)));
    }

    #[test]
    fn test_dnabarcoder_requires_dataset() {
        let root = TempDir::new().unwrap();
        let config = Config::from_root(root.path()).unwrap();
        let semantic = FakeSemantic::new(1, 1);
        let classifier = FakeClassifier::new();
        let dispatcher = Dispatcher::new(&config, &semantic, &classifier);

        let err = dispatcher
            .run(&request("dnabarcoder", MethodOptions::default(), 1))
            .unwrap_err();
        assert!(matches!(err, DispatchError::Validation(_)));
    }

    #[test]
    fn test_dnabarcoder_incomplete_dataset() {
        let root = TempDir::new().unwrap();
        make_dataset_dir(root.path(), "UNITE2024ITS");
        // Remove the cutoff file so the dataset is incomplete.
        fs::remove_file(
            root.path()
                .join("dnabarcoder")
                .join("UNITE2024ITS")
                .join("UNITE2024ITS.cutoffs.json"),
        )
        .unwrap();
        let config = Config::from_root(root.path()).unwrap();
        let semantic = FakeSemantic::new(1, 1);
        let classifier = FakeClassifier::new();
        let dispatcher = Dispatcher::new(&config, &semantic, &classifier);

        let options = MethodOptions {
            dataset: Some("UNITE2024ITS".to_string()),
            ..MethodOptions::default()
        };
        let err = dispatcher.run(&request("dnabarcoder", options, 1)).unwrap_err();
        assert!(matches!(err, DispatchError::DatasetNotFound(_)));
        assert!(!classifier.called.get());
    }

    #[test]
    fn test_dnabarcoder_cutoff_bounds() {
        let root = TempDir::new().unwrap();
        make_dataset_dir(root.path(), "UNITE2024ITS");
        let config = Config::from_root(root.path()).unwrap();
        let semantic = FakeSemantic::new(1, 1);
        let classifier = FakeClassifier::new();
        let dispatcher = Dispatcher::new(&config, &semantic, &classifier);

        let options = MethodOptions {
            dataset: Some("UNITE2024ITS".to_string()),
            cutoff: Some(0.5),
            ..MethodOptions::default()
        };
        let err = dispatcher.run(&request("dnabarcoder", options, 1)).unwrap_err();
        assert!(matches!(err, DispatchError::Validation(_)));
        assert!(!classifier.called.get());
    }

    #[test]
    fn test_dnabarcoder_success() {
        let root = TempDir::new().unwrap();
        make_dataset_dir(root.path(), "UNITE2024ITS");
        let config = Config::from_root(root.path()).unwrap();
        let semantic = FakeSemantic::new(2, 1);
        let classifier = FakeClassifier::new();
        let dispatcher = Dispatcher::new(&config, &semantic, &classifier);

        let options = MethodOptions {
            dataset: Some("UNITE2024ITS".to_string()),
            ..MethodOptions::default()
        };
        let table = dispatcher.run(&request("dnabarcoder", options, 2)).unwrap();
        assert!(classifier.called.get());
        assert_eq!(table.query_count(), 2);
        assert_eq!(table.rows[0].species, "Fusarium oxysporum");
    }

    #[test]
    fn test_backend_error_propagates_verbatim() {
        let root = TempDir::new().unwrap();
        make_dataset_dir(root.path(), "UNITE2024ITS");
        let config = Config::from_root(root.path()).unwrap();
        let semantic = FakeSemantic::new(1, 1);
        let classifier = FakeClassifier::failing("BLAST not found on PATH");
        let dispatcher = Dispatcher::new(&config, &semantic, &classifier);

        let options = MethodOptions {
            dataset: Some("UNITE2024ITS".to_string()),
            ..MethodOptions::default()
        };
        let err = dispatcher.run(&request("dnabarcoder", options, 1)).unwrap_err();
        assert!(err.to_string().contains("BLAST not found on PATH"));
    }

    #[test]
    fn test_empty_input_is_validation_error() {
        let root = TempDir::new().unwrap();
        let config = Config::from_root(root.path()).unwrap();
        let semantic = FakeSemantic::new(0, 0);
        let classifier = FakeClassifier::new();
        let dispatcher = Dispatcher::new(&config, &semantic, &classifier);

        let err = dispatcher
            .run(&request("taxotagger", MethodOptions::default(), 0))
            .unwrap_err();
        assert!(matches!(err, DispatchError::Validation(_)));
    }

    #[test]
    fn test_default_min_alignment() {
        let root = TempDir::new().unwrap();
        make_dataset_dir(root.path(), "UNITE2024ITS1");
        make_dataset_dir(root.path(), "UNITE2024ITS");
        let config = Config::from_root(root.path()).unwrap();
        let its1 = ReferenceDataset::resolve(&config, "UNITE2024ITS1").unwrap();
        let its = ReferenceDataset::resolve(&config, "UNITE2024ITS").unwrap();
        assert_eq!(default_min_alignment(&its1), SUBREGION_MIN_ALIGNMENT);
        assert_eq!(default_min_alignment(&its), DEFAULT_MIN_ALIGNMENT);
    }
}
