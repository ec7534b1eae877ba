//! FASTA input reading and request validation.
//!
//! Uses `needletail` for parsing, which also handles compressed files
//! transparently. Validation enforces the rules the identification request
//! needs: unique IDs, unique non-empty sequences, and the overall sequence
//! limit.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use needletail::{parse_fastx_file, parse_fastx_reader, FastxReader};
use thiserror::Error;

/// Upper bound on sequences per identification request.
pub const MAX_SEQUENCES: usize = 100;

#[derive(Error, Debug)]
pub enum FastaError {
    #[error("failed to read {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("invalid FASTA input: {0}")]
    Parse(String),

    #[error("no sequences found in the input")]
    Empty,

    #[error("empty sequence found for `{0}`; ensure all sequences are non-empty")]
    EmptySequence(String),

    #[error("duplicate sequence ID found: `{0}`; ensure all sequence IDs are unique")]
    DuplicateId(String),

    #[error("`{0}` and `{1}` have the same DNA sequence; ensure all sequences are unique")]
    DuplicateSequence(String, String),

    #[error("{0} sequences provided; limit the input to {MAX_SEQUENCES} or fewer")]
    TooManySequences(usize),
}

/// One query sequence with its identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeqRecord {
    pub id: String,
    pub sequence: String,
}

/// Read records from one or more FASTA files, in argument order.
pub fn read_files(paths: &[PathBuf]) -> Result<Vec<SeqRecord>, FastaError> {
    let mut records = Vec::new();
    for path in paths {
        let reader = parse_fastx_file(path).map_err(|e| FastaError::Read {
            path: path.clone(),
            message: e.to_string(),
        })?;
        collect_records(reader, &mut records)?;
    }
    Ok(records)
}

/// Read records from inline FASTA text.
pub fn read_str(text: &str) -> Result<Vec<SeqRecord>, FastaError> {
    if text.trim().is_empty() {
        return Err(FastaError::Empty);
    }
    let reader = parse_fastx_reader(Cursor::new(text.as_bytes().to_vec()))
        .map_err(|e| FastaError::Parse(e.to_string()))?;
    let mut records = Vec::new();
    collect_records(reader, &mut records)?;
    Ok(records)
}

fn collect_records(
    mut reader: Box<dyn FastxReader>,
    records: &mut Vec<SeqRecord>,
) -> Result<(), FastaError> {
    while let Some(record) = reader.next() {
        let record = record.map_err(|e| FastaError::Parse(e.to_string()))?;
        let header = String::from_utf8_lossy(record.id());
        // The ID is the first whitespace-separated token of the header.
        let id = header
            .split_whitespace()
            .next()
            .ok_or_else(|| {
                FastaError::Parse(
                    "header must start with '>' plus at least one non-empty character".to_string(),
                )
            })?
            .to_string();
        let sequence = String::from_utf8_lossy(&record.seq()).to_string();
        records.push(SeqRecord { id, sequence });
    }
    Ok(())
}

/// Validate a full request's worth of records.
pub fn validate(records: &[SeqRecord]) -> Result<(), FastaError> {
    if records.is_empty() {
        return Err(FastaError::Empty);
    }
    if records.len() > MAX_SEQUENCES {
        return Err(FastaError::TooManySequences(records.len()));
    }
    let mut by_id: IndexMap<&str, &SeqRecord> = IndexMap::new();
    let mut by_sequence: IndexMap<&str, &str> = IndexMap::new();
    for record in records {
        if record.sequence.is_empty() {
            return Err(FastaError::EmptySequence(record.id.clone()));
        }
        if by_id.insert(record.id.as_str(), record).is_some() {
            return Err(FastaError::DuplicateId(record.id.clone()));
        }
        if let Some(first) = by_sequence.insert(record.sequence.as_str(), record.id.as_str()) {
            return Err(FastaError::DuplicateSequence(
                record.id.clone(),
                first.to_string(),
            ));
        }
    }
    Ok(())
}

/// Write records as FASTA, one sequence per record.
pub fn write_fasta(records: &[SeqRecord], path: &Path) -> std::io::Result<()> {
    use std::io::Write;
    let mut file = std::fs::File::create(path)?;
    for record in records {
        writeln!(file, ">{}", record.id)?;
        writeln!(file, "{}", record.sequence)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rec(id: &str, seq: &str) -> SeqRecord {
        SeqRecord {
            id: id.to_string(),
            sequence: seq.to_string(),
        }
    }

    #[test]
    fn test_read_str() {
        let records = read_str(">seq1 some description\nACGT\nACGT\n>seq2\nTTTT\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "seq1");
        assert_eq!(records[0].sequence, "ACGTACGT");
        assert_eq!(records[1].id, "seq2");
    }

    #[test]
    fn test_read_str_empty() {
        assert!(matches!(read_str("   \n"), Err(FastaError::Empty)));
    }

    #[test]
    fn test_read_files_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("q.fasta");
        let records = vec![rec("a", "ACGT"), rec("b", "TTAA")];
        write_fasta(&records, &path).unwrap();
        let back = read_files(&[path]).unwrap();
        assert_eq!(back, records);
    }

    #[test]
    fn test_read_files_missing() {
        let err = read_files(&[PathBuf::from("/no/such/file.fasta")]).unwrap_err();
        assert!(matches!(err, FastaError::Read { .. }));
    }

    #[test]
    fn test_validate_ok() {
        assert!(validate(&[rec("a", "ACGT"), rec("b", "TTAA")]).is_ok());
    }

    #[test]
    fn test_validate_empty_input() {
        assert!(matches!(validate(&[]), Err(FastaError::Empty)));
    }

    #[test]
    fn test_validate_duplicate_id() {
        let err = validate(&[rec("a", "ACGT"), rec("a", "TTAA")]).unwrap_err();
        assert!(matches!(err, FastaError::DuplicateId(id) if id == "a"));
    }

    #[test]
    fn test_validate_duplicate_sequence() {
        let err = validate(&[rec("a", "ACGT"), rec("b", "ACGT")]).unwrap_err();
        assert!(matches!(err, FastaError::DuplicateSequence(..)));
    }

    #[test]
    fn test_validate_empty_sequence() {
        let err = validate(&[rec("a", "")]).unwrap_err();
        assert!(matches!(err, FastaError::EmptySequence(id) if id == "a"));
    }

    #[test]
    fn test_validate_too_many() {
        let records: Vec<SeqRecord> = (0..MAX_SEQUENCES + 1)
            .map(|i| rec(&format!("s{i}"), &format!("ACGT{i}")))
            .collect();
        let err = validate(&records).unwrap_err();
        assert!(matches!(err, FastaError::TooManySequences(n) if n == MAX_SEQUENCES + 1));
    }
}
