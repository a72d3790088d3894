//! Analysis and playback toolkit for flex/DMS resistive sensor logs.
//!
//! The library holds everything except the desktop viewer: parsing and
//! filtering ([`data`]), the numerical analyses ([`analysis`]), the
//! per-command pipelines and reports, TOML configuration, and video
//! rendering.

pub mod analysis;
pub mod color;
pub mod config;
pub mod data;
pub mod pipeline;
pub mod report;
pub mod video;
