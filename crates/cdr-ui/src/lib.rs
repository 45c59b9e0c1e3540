//! Terminal UI layer for the CDR analyzer.
//!
//! Provides themes, the header and status bar components, the mapping and
//! results screens, chart export, and the main application event loop built
//! on top of [`ratatui`].

pub mod app;
pub mod chart_export;
pub mod components;
pub mod mapping_view;
pub mod results_view;
pub mod themes;

pub use cdr_core as core;
