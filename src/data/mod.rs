/// Data layer: core types, loading, filtering and transforms.
///
/// Architecture:
/// ```text
///  .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Table
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  allow-list rows, remap group labels → Observation
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ transform │  log2 (optional) → plotted value
///   └───────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
pub mod transform;

use std::path::PathBuf;

use thiserror::Error;

/// Failures of the data layer. Everything here is fatal for an analysis.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("unsupported file extension: .{0}")]
    UnsupportedExtension(String),

    #[error("expected column '{0}' is missing")]
    MissingColumn(String),

    #[error("row {row}: column '{column}' is not numeric ({found})")]
    NotNumeric {
        row: usize,
        column: String,
        found: String,
    },

    #[error("row {row}: expression value {value} is not a finite non-negative number")]
    InvalidMeasure { row: usize, value: f64 },

    #[error("no rows match the configured {column} labels (found: {})", found.join(", "))]
    NothingSelected { column: String, found: Vec<String> },

    #[error("row {row}: cannot take log2 of non-positive value {value}")]
    NonPositive { row: usize, value: f64 },
}
