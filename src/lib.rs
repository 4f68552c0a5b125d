//! # tmem132d-plot
//!
//! Box-and-strip figures of TMEM132D expression across diagnostic groups,
//! annotated with two-sided Mann-Whitney U tests against the control group.
//!
//! Each analysis is one linear pass:
//!
//! ```text
//!  load → filter / remap → transform → test vs control → plot → annotate → save
//! ```
//!
//! ## Module Organization
//!
//! - **[`data`]**: table model, CSV/JSON/Parquet loading, allow-list filter, log2 transform
//! - **[`stats`]**: Mann-Whitney U test (exact and normal approximation)
//! - **[`annotate`]**: p-value → significance marker, marker policies and placement
//! - **[`plot`]**: box statistics, jitter, bitmap rendering
//! - **[`config`]**: analysis configuration, presets and validation
//! - **[`pipeline`]**: `prepare` / `analyze` / `run`

pub mod annotate;
pub mod color;
pub mod config;
pub mod data;
pub mod pipeline;
pub mod plot;
pub mod stats;
