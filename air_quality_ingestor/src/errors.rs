use std::path::PathBuf;

use thiserror::Error;

use crate::providers::{ProviderError, ProviderInitError};

/// The unified error type for the `air_quality_ingestor` crate.
#[derive(Debug, Error)]
pub enum IngestError {
    /// A sensor id that is neither `@<digits>`, `A<digits>` nor bare digits.
    /// The field layout of the feed depends on the id, so guessing is not an option.
    #[error("Unknown sensor id format: {0:?}")]
    UnknownSensorFormat(String),

    /// A required local input (e.g. a per-sensor history export) does not exist.
    #[error("Missing input file: {}", .0.display())]
    MissingInput(PathBuf),

    /// A row or file could not be interpreted.
    #[error("Malformed input in {path}: {message}")]
    Malformed { path: String, message: String },

    /// A PM2.5 value outside the plausible range `(-0.1, 500]`.
    #[error("PM2.5 of {value} for {entity} on {date} is out of range")]
    OutOfRange {
        entity: String,
        date: chrono::NaiveDate,
        value: f64,
    },

    /// The places file is unreadable or inconsistent.
    #[error("Invalid places file: {0}")]
    Places(String),

    /// An error originating from a data provider.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A provider could not be constructed.
    #[error(transparent)]
    ProviderInit(#[from] ProviderInitError),

    /// A generic I/O error.
    #[error("I/O error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An error from the Polars library.
    #[error("Polars operation failed")]
    Polars(#[from] polars::prelude::PolarsError),
}
