//! Rendering of results and dataset listings.
//!
//! The terminal is the presentation layer: result tables are drawn with
//! `comfy-table`, and the same rows can be exported as TSV for downstream
//! use.

use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};
use itertools::Itertools;

use crate::datasets::{DatasetInfo, ReferenceDataset};
use crate::results::{ResultTable, TaxonomyRank};

/// Columns present in every rendered table, before the taxonomy ranks.
const LEAD_COLUMNS: &[&str] = &["Query", "#", "Hit"];

/// Render a result table for the terminal.
pub fn render_results(results: &ResultTable) -> Table {
    let (header, rows) = tabulate(results);
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    for row in rows {
        table.add_row(row);
    }
    table
}

/// Export a result table as TSV.
pub fn export_tsv(results: &ResultTable, path: &Path) -> Result<()> {
    let (header, rows) = tabulate(results);
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    writer.write_record(&header)?;
    for row in &rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Flatten a result table into display cells. Numeric columns that no row
/// fills are left out entirely.
fn tabulate(results: &ResultTable) -> (Vec<String>, Vec<Vec<String>>) {
    let has_rank = results.rows.iter().any(|r| !r.rank.is_empty());
    let has_score = results.rows.iter().any(|r| r.score.is_some());
    let has_cutoff = results.rows.iter().any(|r| r.cutoff.is_some());
    let has_confidence = results.rows.iter().any(|r| r.confidence.is_some());

    let mut header: Vec<String> = LEAD_COLUMNS.iter().map(|c| c.to_string()).collect();
    for rank in TaxonomyRank::all() {
        header.push(capitalize(rank.as_str()));
    }
    if has_rank {
        header.push("Rank".to_string());
    }
    if has_score {
        header.push("Score".to_string());
    }
    if has_cutoff {
        header.push("Cutoff".to_string());
    }
    if has_confidence {
        header.push("Confidence".to_string());
    }

    let rows = results
        .rows
        .iter()
        .map(|row| {
            let mut cells = vec![
                row.query_id.clone(),
                row.position.to_string(),
                row.hit_id.clone(),
            ];
            for rank in TaxonomyRank::all() {
                cells.push(row.label(rank).to_string());
            }
            if has_rank {
                cells.push(row.rank.clone());
            }
            if has_score {
                cells.push(format_float(row.score));
            }
            if has_cutoff {
                cells.push(format_float(row.cutoff));
            }
            if has_confidence {
                cells.push(format_float(row.confidence));
            }
            cells
        })
        .collect();
    (header, rows)
}

/// Render the dataset listing for `mycoid datasets`.
pub fn render_datasets(datasets: &[ReferenceDataset]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_header(vec!["Name", "Display name", "Location"]);
    for dataset in datasets {
        table.add_row(vec![
            dataset.name.clone(),
            dataset.display_name.clone(),
            dataset.dir.display().to_string(),
        ]);
    }
    table
}

/// Render the details of one dataset.
pub fn render_dataset_info(info: &DatasetInfo) -> String {
    let cutoffs = if info.cutoffs.is_empty() {
        "none recorded".to_string()
    } else {
        info.cutoffs
            .iter()
            .map(|(rank, cutoff)| format!("{rank}={cutoff}"))
            .join(", ")
    };
    format!(
        "{} ({})\n  reference sequences: {}\n  taxonomic ranks: {}\n  cutoffs: {}",
        info.dataset.display_name,
        info.dataset.name,
        info.sequence_count,
        if info.ranks.is_empty() {
            "not specified".to_string()
        } else {
            info.ranks.join(", ")
        },
        cutoffs,
    )
}

fn format_float(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.4}")).unwrap_or_default()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
