//! Locus-scoped PheWAS extraction over Pan-UKB style summary statistics.
//!
//! For each phenotype in a manifest, the rows of its remote bgzipped,
//! tabix-indexed table that overlap a windowed locus are fetched, tagged with
//! the phenocode and merged into one table joined with phenotype metadata.

pub mod aggregate;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod extract;
pub mod layout;
pub mod output;
pub mod pipeline;
pub mod prefetch;
pub mod remote;
pub mod table;
pub mod tabix;
