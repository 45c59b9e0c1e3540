//! Small line-based widgets shared by every screen.

pub mod header;
pub mod status_bar;
