//! Data layer for the CDR analyzer.
//!
//! Responsible for reading CDR files, mapping their columns to roles,
//! parsing timestamps, filtering by date, aggregating call counts and
//! exporting report tables.

pub mod aggregator;
pub mod analysis;
pub mod canonical;
pub mod export;
pub mod filter;
pub mod mapper;
pub mod reader;

pub use cdr_core as core;
