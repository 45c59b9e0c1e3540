//! Core types shared by the CDR analyzer crates.
//!
//! Holds the record and report models, the error taxonomy, timestamp parsing,
//! number formatting and the command-line settings.

pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
pub mod time_utils;
