//! Input/output operations module.
//!
//! FASTA reading and validation for identification requests lives in the
//! `fasta` sub-module; result export is handled by the report module.

pub mod fasta;
