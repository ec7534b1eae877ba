//! Normalized classification results.
//!
//! Both backends produce their own output shapes (per-rank semantic hits, or
//! dnabarcoder's `.classified` table). This module flattens them into one
//! [`ResultTable`] of per-query rows so the presentation layer renders a
//! single format. Scores and row order are passed through exactly as the
//! backend produced them.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::backends::SemanticHits;

/// Taxonomic ranks used for display columns, kingdom first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaxonomyRank {
    Kingdom,
    Phylum,
    Class,
    Order,
    Family,
    Genus,
    Species,
}

impl TaxonomyRank {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxonomyRank::Kingdom => "kingdom",
            TaxonomyRank::Phylum => "phylum",
            TaxonomyRank::Class => "class",
            TaxonomyRank::Order => "order",
            TaxonomyRank::Family => "family",
            TaxonomyRank::Genus => "genus",
            TaxonomyRank::Species => "species",
        }
    }

    /// All ranks in hierarchical order.
    pub fn all() -> [TaxonomyRank; 7] {
        [
            TaxonomyRank::Kingdom,
            TaxonomyRank::Phylum,
            TaxonomyRank::Class,
            TaxonomyRank::Order,
            TaxonomyRank::Family,
            TaxonomyRank::Genus,
            TaxonomyRank::Species,
        ]
    }

    /// The single-letter prefix used in `k__Fungi;p__...` lineage strings.
    fn lineage_prefix(&self) -> &'static str {
        match self {
            TaxonomyRank::Kingdom => "k__",
            TaxonomyRank::Phylum => "p__",
            TaxonomyRank::Class => "c__",
            TaxonomyRank::Order => "o__",
            TaxonomyRank::Family => "f__",
            TaxonomyRank::Genus => "g__",
            TaxonomyRank::Species => "s__",
        }
    }
}

/// One match for one query sequence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultRow {
    pub query_id: String,
    /// Reference sequence the match points at, when the backend reports one.
    pub hit_id: String,
    /// 1-based position of this match among the query's matches.
    pub position: usize,
    pub kingdom: String,
    pub phylum: String,
    pub class: String,
    pub order: String,
    pub family: String,
    pub genus: String,
    pub species: String,
    /// Rank at which the backend made the call (dnabarcoder only).
    pub rank: String,
    pub score: Option<f64>,
    pub cutoff: Option<f64>,
    pub confidence: Option<f64>,
}

impl ResultRow {
    pub fn label(&self, rank: TaxonomyRank) -> &str {
        match rank {
            TaxonomyRank::Kingdom => &self.kingdom,
            TaxonomyRank::Phylum => &self.phylum,
            TaxonomyRank::Class => &self.class,
            TaxonomyRank::Order => &self.order,
            TaxonomyRank::Family => &self.family,
            TaxonomyRank::Genus => &self.genus,
            TaxonomyRank::Species => &self.species,
        }
    }

    pub fn set_label(&mut self, rank: TaxonomyRank, value: &str) {
        let value = clean_label(value);
        match rank {
            TaxonomyRank::Kingdom => self.kingdom = value,
            TaxonomyRank::Phylum => self.phylum = value,
            TaxonomyRank::Class => self.class = value,
            TaxonomyRank::Order => self.order = value,
            TaxonomyRank::Family => self.family = value,
            TaxonomyRank::Genus => self.genus = value,
            TaxonomyRank::Species => self.species = value,
        }
    }

    /// Fill taxonomy columns from a `k__Fungi;p__Ascomycota;...` string.
    pub fn apply_lineage(&mut self, lineage: &str) {
        for taxon in lineage.split(';') {
            let taxon = taxon.trim();
            for rank in TaxonomyRank::all() {
                if let Some(name) = taxon.strip_prefix(rank.lineage_prefix()) {
                    self.set_label(rank, name);
                }
            }
        }
    }
}

/// Strip placeholder labels the backends use for "no call".
pub fn clean_label(value: &str) -> String {
    let trimmed = value.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "unidentified" | "unid." | "na" | "n/a" => String::new(),
        _ => trimmed.to_string(),
    }
}

/// Flattened result set for one classification request.
#[derive(Debug, Clone, Default)]
pub struct ResultTable {
    pub method: String,
    pub rows: Vec<ResultRow>,
}

impl ResultTable {
    /// Group rows by query ID, preserving row order within each group.
    pub fn by_query(&self) -> IndexMap<&str, Vec<&ResultRow>> {
        let mut grouped: IndexMap<&str, Vec<&ResultRow>> = IndexMap::new();
        for row in &self.rows {
            grouped.entry(row.query_id.as_str()).or_default().push(row);
        }
        grouped
    }

    pub fn query_count(&self) -> usize {
        self.by_query().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Flatten semantic-search hits into at most `top_k` rows per query.
    ///
    /// Each row carries the labels of every rank at that match position; the
    /// hit ID and score come from the deepest rank that returned a match for
    /// the position.
    pub fn from_semantic_hits(hits: &SemanticHits, query_ids: &[String], top_k: usize) -> Self {
        let mut rows = Vec::new();
        for (i, query_id) in query_ids.iter().enumerate() {
            for j in 0..top_k {
                let mut row = ResultRow {
                    query_id: query_id.clone(),
                    position: j + 1,
                    ..ResultRow::default()
                };
                let mut any_match = false;
                for rank in TaxonomyRank::all() {
                    let Some(per_query) = hits.per_rank.get(&rank) else {
                        continue;
                    };
                    let Some(m) = per_query.get(i).and_then(|matches| matches.get(j)) else {
                        continue;
                    };
                    any_match = true;
                    row.set_label(rank, &m.label);
                    // Deepest rank wins; ranks iterate kingdom -> species.
                    row.hit_id = m.hit_id.clone();
                    row.score = Some(m.distance);
                }
                if any_match {
                    rows.push(row);
                }
            }
        }
        ResultTable {
            method: "taxotagger".to_string(),
            rows,
        }
    }

    /// Order backend rows by query input order and number them per query.
    ///
    /// Rows for queries the backend never mentioned are dropped implicitly
    /// (there are none to drop); rows with query IDs not in the input are
    /// kept at the end rather than discarded, since the backend's output is
    /// an opaque contract.
    pub fn from_classified_rows(
        method: &str,
        rows: Vec<ResultRow>,
        query_ids: &[String],
    ) -> Self {
        let mut grouped: IndexMap<String, Vec<ResultRow>> = IndexMap::new();
        for id in query_ids {
            grouped.entry(id.clone()).or_default();
        }
        for row in rows {
            grouped.entry(row.query_id.clone()).or_default().push(row);
        }
        let mut ordered = Vec::new();
        for (_, group) in grouped {
            for (j, mut row) in group.into_iter().enumerate() {
                row.position = j + 1;
                ordered.push(row);
            }
        }
        ResultTable {
            method: method.to_string(),
            rows: ordered,
        }
    }
}
