//! Gradient-boosted regression trees backed by XGBoost.
//!
//! Features arrive as `f64` and are handed to XGBoost as row-major `f32`
//! matrices. The artifact is XGBoost's own binary model format; the feature
//! count is not part of it and comes from the model card on load.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;
use xgboost::{Booster, DMatrix, parameters};

use crate::model::{ModelError, Regressor};

/// Training knobs. Defaults match the stock `XGBRegressor`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostParams {
    pub rounds: u32,
    pub max_depth: u32,
    pub eta: f32,
}

impl Default for BoostParams {
    fn default() -> Self {
        Self {
            rounds: 100,
            max_depth: 6,
            eta: 0.3,
        }
    }
}

pub struct BoostedTrees {
    booster: Booster,
    n_features: usize,
}

fn dense(rows: &[Vec<f64>], width: usize) -> Result<DMatrix, ModelError> {
    let mut flat = Vec::with_capacity(rows.len() * width);
    for row in rows {
        if row.len() != width {
            return Err(ModelError::DimensionMismatch {
                expected: width,
                found: row.len(),
            });
        }
        flat.extend(row.iter().map(|&v| v as f32));
    }
    Ok(DMatrix::from_dense(&flat, rows.len())?)
}

impl BoostedTrees {
    /// Fit on row-major `x` against `y`. Every row must have `n_features`
    /// values.
    pub fn fit(
        n_features: usize,
        x: &[Vec<f64>],
        y: &[f64],
        params: &BoostParams,
    ) -> Result<Self, ModelError> {
        if x.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        if y.len() != x.len() {
            return Err(ModelError::DimensionMismatch {
                expected: x.len(),
                found: y.len(),
            });
        }
        let mut dtrain = dense(x, n_features)?;
        let labels: Vec<f32> = y.iter().map(|&v| v as f32).collect();
        dtrain.set_labels(&labels)?;

        let tree = parameters::tree::TreeBoosterParametersBuilder::default()
            .max_depth(params.max_depth)
            .eta(params.eta)
            .build()
            .map_err(ModelError::Params)?;
        let learning = parameters::learning::LearningTaskParametersBuilder::default()
            .objective(parameters::learning::Objective::RegLinear)
            .build()
            .map_err(ModelError::Params)?;
        let booster_params = parameters::BoosterParametersBuilder::default()
            .booster_type(parameters::BoosterType::Tree(tree))
            .learning_params(learning)
            .verbose(false)
            .build()
            .map_err(ModelError::Params)?;
        let training = parameters::TrainingParametersBuilder::default()
            .dtrain(&dtrain)
            .boost_rounds(params.rounds)
            .booster_params(booster_params)
            .build()
            .map_err(ModelError::Params)?;

        let booster = Booster::train(&training)?;
        debug!(rows = x.len(), n_features, rounds = params.rounds, "boosted trees fitted");
        Ok(Self { booster, n_features })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        Ok(self.booster.save(path)?)
    }

    pub fn load(path: &Path, n_features: usize) -> Result<Self, ModelError> {
        let booster = Booster::load(path)?;
        Ok(Self { booster, n_features })
    }
}

impl Regressor for BoostedTrees {
    fn predict(&self, features: &[f64]) -> Result<f64, ModelError> {
        let row = [features.to_vec()];
        self.predict_many(&row)?
            .into_iter()
            .next()
            .ok_or(ModelError::EmptyPrediction)
    }

    /// One XGBoost call for the whole batch.
    fn predict_many(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let matrix = dense(rows, self.n_features)?;
        let predicted = self.booster.predict(&matrix)?;
        if predicted.len() != rows.len() {
            return Err(ModelError::EmptyPrediction);
        }
        Ok(predicted.into_iter().map(f64::from).collect())
    }
}
