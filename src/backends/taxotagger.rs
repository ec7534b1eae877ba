//! Semantic-search backend: the external `taxotagger` tool.
//!
//! The tool embeds the query sequences, searches the per-rank vector
//! databases under the configured directory, and prints JSON on stdout:
//! one key per taxonomic rank, each holding one ranked match list per query
//! in submission order. Matches carry the reference ID, the similarity, and
//! the taxon labels of the matched entity.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;

use super::{run_tool, BackendError, SemanticHits, SemanticMatch, SemanticSearch};
use crate::results::TaxonomyRank;

const TOOL: &str = "taxotagger";

/// Invokes the `taxotagger` executable.
pub struct TaxoTaggerCli {
    executable: PathBuf,
}

impl TaxoTaggerCli {
    /// `executable` defaults to `taxotagger` on PATH.
    pub fn new(executable: Option<PathBuf>) -> Self {
        TaxoTaggerCli {
            executable: executable.unwrap_or_else(|| PathBuf::from(TOOL)),
        }
    }
}

impl SemanticSearch for TaxoTaggerCli {
    fn top_k_matches(
        &self,
        query_fasta: &Path,
        db_dir: &Path,
        model: &str,
        k: usize,
    ) -> Result<SemanticHits, BackendError> {
        let mut cmd = Command::new(&self.executable);
        cmd.arg("search")
            .arg("-i")
            .arg(query_fasta)
            .arg("--db-dir")
            .arg(db_dir)
            .arg("--model")
            .arg(model)
            .arg("--top-k")
            .arg(k.to_string())
            .arg("--format")
            .arg("json");
        let output = run_tool(&mut cmd, TOOL)?;
        parse_hits(&String::from_utf8_lossy(&output.stdout))
    }
}

#[derive(Deserialize)]
struct RawMatch {
    id: String,
    distance: f64,
    #[serde(default)]
    entity: HashMap<String, String>,
}

/// Parse the tool's JSON output into [`SemanticHits`].
pub(crate) fn parse_hits(json: &str) -> Result<SemanticHits, BackendError> {
    let raw: HashMap<String, Vec<Vec<RawMatch>>> =
        serde_json::from_str(json).map_err(|e| BackendError::Parse {
            tool: TOOL.to_string(),
            message: e.to_string(),
        })?;

    let mut hits = SemanticHits::default();
    for rank in TaxonomyRank::all() {
        let Some(per_query) = raw.get(rank.as_str()) else {
            continue;
        };
        let converted = per_query
            .iter()
            .map(|matches| {
                matches
                    .iter()
                    .map(|m| SemanticMatch {
                        hit_id: m.id.clone(),
                        distance: m.distance,
                        label: m.entity.get(rank.as_str()).cloned().unwrap_or_default(),
                    })
                    .collect()
            })
            .collect();
        hits.per_rank.insert(rank, converted);
    }

    if hits.per_rank.is_empty() {
        return Err(BackendError::Parse {
            tool: TOOL.to_string(),
            message: "output contains no taxonomic ranks".to_string(),
        });
    }
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "genus": [
            [
                {"id": "UDB001", "distance": 0.98, "entity": {"genus": "Fusarium"}},
                {"id": "UDB002", "distance": 0.95, "entity": {"genus": "Aspergillus"}}
            ]
        ],
        "species": [
            [
                {"id": "UDB001", "distance": 0.97, "entity": {"species": "Fusarium oxysporum"}}
            ]
        ]
    }"#;

    #[test]
    fn test_parse_hits() {
        let hits = parse_hits(SAMPLE).unwrap();
        assert_eq!(hits.query_count(), 1);
        let genus = &hits.per_rank[&TaxonomyRank::Genus];
        assert_eq!(genus[0].len(), 2);
        assert_eq!(genus[0][0].label, "Fusarium");
        assert_eq!(genus[0][1].hit_id, "UDB002");
        let species = &hits.per_rank[&TaxonomyRank::Species];
        assert_eq!(species[0][0].label, "Fusarium oxysporum");
        assert_eq!(species[0][0].distance, 0.97);
    }

    #[test]
    fn test_parse_hits_missing_entity_label() {
        let json = r#"{"species": [[{"id": "X", "distance": 0.5}]]}"#;
        let hits = parse_hits(json).unwrap();
        assert_eq!(hits.per_rank[&TaxonomyRank::Species][0][0].label, "");
    }

    #[test]
    fn test_parse_hits_invalid_json() {
        assert!(matches!(
            parse_hits("not json"),
            Err(BackendError::Parse { .. })
        ));
    }

    #[test]
    fn test_parse_hits_no_ranks() {
        assert!(matches!(
            parse_hits(r#"{"unknown_rank": []}"#),
            Err(BackendError::Parse { .. })
        ));
    }
}
