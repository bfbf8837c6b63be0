//! Regression model seam, the boosted-tree model, evaluation metrics and
//! the local model registry.

pub mod boosted;
pub mod metrics;
pub mod registry;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("expected {expected} features, got {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("invalid booster parameters: {0}")]
    Params(String),

    #[error("xgboost: {0}")]
    Booster(String),

    #[error("booster returned no prediction")]
    EmptyPrediction,

    #[error("model {name} has no registered versions")]
    NotRegistered { name: String },

    #[error("model {name} v{version} not found")]
    VersionNotFound { name: String, version: u32 },

    #[error("registry I/O on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model artifact {} is unreadable", path.display())]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl From<xgboost::XGBError> for ModelError {
    fn from(err: xgboost::XGBError) -> Self {
        ModelError::Booster(err.to_string())
    }
}

/// Anything that maps a feature vector to a PM2.5 estimate.
pub trait Regressor {
    fn predict(&self, features: &[f64]) -> Result<f64, ModelError>;

    /// Predict every row; stops at the first failure.
    fn predict_many(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        rows.iter().map(|row| self.predict(row)).collect()
    }
}
