//! Runtime layer for the CDR analyzer.
//!
//! Runs loads and analyses on a background worker and keeps all UI-facing
//! state in a single session controller.

pub mod session;
pub mod worker;

pub use cdr_core as core;
pub use cdr_data as data;
