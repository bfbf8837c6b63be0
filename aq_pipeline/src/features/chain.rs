//! Chained multi-day forecasts.
//!
//! Lag features for future dates cannot come from measurements, so each
//! day's prediction is fed forward as the next day's lag-1, the old lag-1
//! becomes lag-2, and so on: a right-shift of the lag window per day.
//! Dates must be resolved in ascending order within an entity; entities are
//! independent of each other.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{
    features::lag::LagSet,
    model::{ModelError, Regressor},
};

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("lag set {0:?} is not 1..=k; predictions cannot be shifted into it")]
    NonContiguousLags(Vec<u32>),

    #[error("{entity} on {date}: expected {expected} lag values, found {found}")]
    LayoutMismatch {
        entity: String,
        date: NaiveDate,
        expected: usize,
        found: usize,
    },

    #[error("{entity} appears twice on {date}")]
    DuplicateRow { entity: String, date: NaiveDate },

    #[error("{entity} on {date}: lag {lag} has no value")]
    MissingFeature {
        entity: String,
        date: NaiveDate,
        lag: u32,
    },

    #[error("{entity} on {date}: prediction failed")]
    Model {
        entity: String,
        date: NaiveDate,
        #[source]
        source: ModelError,
    },
}

/// One future `(entity, date)` awaiting a prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastInput {
    pub entity_id: String,
    pub date: NaiveDate,
    /// Weather features in model order.
    pub weather: Vec<f64>,
    /// Lag values for lags `1..=k`, in that order.
    pub lags: Vec<Option<f64>>,
}

impl ForecastInput {
    /// Full feature vector: weather followed by lags.
    fn features(&self, lags: &LagSet) -> Result<Vec<f64>, ChainError> {
        let mut features = self.weather.clone();
        for (value, lag) in self.lags.iter().zip(lags.as_slice()) {
            let value = value.ok_or_else(|| ChainError::MissingFeature {
                entity: self.entity_id.clone(),
                date: self.date,
                lag: *lag,
            })?;
            features.push(value);
        }
        Ok(features)
    }
}

/// A prediction for `date` made on `forecast_on`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    pub entity_id: String,
    pub date: NaiveDate,
    pub predicted_pm25: f64,
    pub forecast_on: NaiveDate,
}

/// Predict every row of `batch`, feeding predictions forward as lags.
///
/// After a row for date D is predicted, the row for D+1 of the same entity
/// (if present) receives `[prediction, lag1(D), ..., lag(k-1)(D)]` as its
/// lags. A row whose predecessor date is absent from the batch keeps the
/// lags it came with. `batch` is updated in place so callers can inspect
/// the propagated lags.
///
/// Any failure aborts the whole batch; partial chains are never returned.
/// The result is sorted by `(date, entity_id)`.
pub fn chain_forecasts(
    batch: &mut [ForecastInput],
    lags: &LagSet,
    model: &dyn Regressor,
    forecast_on: NaiveDate,
) -> Result<Vec<ForecastRow>, ChainError> {
    if !lags.is_contiguous() {
        return Err(ChainError::NonContiguousLags(lags.as_slice().to_vec()));
    }
    if let Some(row) = batch.iter().find(|r| r.lags.len() != lags.len()) {
        return Err(ChainError::LayoutMismatch {
            entity: row.entity_id.clone(),
            date: row.date,
            expected: lags.len(),
            found: row.lags.len(),
        });
    }

    let mut by_entity: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (i, row) in batch.iter().enumerate() {
        by_entity.entry(row.entity_id.clone()).or_default().push(i);
    }

    let mut out = Vec::with_capacity(batch.len());
    for (entity, mut indices) in by_entity {
        indices.sort_by_key(|&i| batch[i].date);
        if let Some(w) = indices.windows(2).find(|w| batch[w[0]].date == batch[w[1]].date) {
            return Err(ChainError::DuplicateRow {
                entity,
                date: batch[w[0]].date,
            });
        }

        for (pos, &i) in indices.iter().enumerate() {
            let row = &batch[i];
            let features = row.features(lags)?;
            let predicted = model.predict(&features).map_err(|source| ChainError::Model {
                entity: entity.clone(),
                date: row.date,
                source,
            })?;
            out.push(ForecastRow {
                entity_id: entity.clone(),
                date: row.date,
                predicted_pm25: predicted,
                forecast_on,
            });

            let Some(&next) = indices.get(pos + 1) else {
                continue;
            };
            if row.date.succ_opt() != Some(batch[next].date) {
                debug!(entity = %entity, date = %row.date, "gap after date, lags not propagated");
                continue;
            }
            let mut shifted = Vec::with_capacity(lags.len());
            shifted.push(Some(predicted));
            shifted.extend_from_slice(&row.lags[..lags.len() - 1]);
            batch[next].lags = shifted;
        }
    }

    out.sort_by(|a, b| (a.date, &a.entity_id).cmp(&(b.date, &b.entity_id)));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(n - 1)
    }

    /// Returns a fixed value regardless of input.
    struct Constant(f64);

    impl Regressor for Constant {
        fn predict(&self, _features: &[f64]) -> Result<f64, ModelError> {
            Ok(self.0)
        }
    }

    /// Returns its first feature, which the tests set to the day index.
    struct DayIndex;

    impl Regressor for DayIndex {
        fn predict(&self, features: &[f64]) -> Result<f64, ModelError> {
            Ok(features[0])
        }
    }

    /// Fails on a given day index.
    struct FailOn(f64);

    impl Regressor for FailOn {
        fn predict(&self, features: &[f64]) -> Result<f64, ModelError> {
            if features[0] == self.0 {
                Err(ModelError::DimensionMismatch {
                    expected: 0,
                    found: features.len(),
                })
            } else {
                Ok(1.0)
            }
        }
    }

    fn input(entity: &str, n: i64, lags: [Option<f64>; 3]) -> ForecastInput {
        ForecastInput {
            entity_id: entity.to_string(),
            date: day(n),
            weather: vec![n as f64],
            lags: lags.to_vec(),
        }
    }

    fn lags123() -> LagSet {
        LagSet::new([1, 2, 3]).unwrap()
    }

    #[test]
    fn constant_model_propagates_into_following_days() {
        let v = 42.0;
        let mut batch = vec![
            input("X", 1, [Some(5.0), Some(6.0), Some(7.0)]),
            input("X", 2, [None, None, None]),
            input("X", 3, [None, None, None]),
        ];
        chain_forecasts(&mut batch, &lags123(), &Constant(v), day(0)).unwrap();

        assert_eq!(batch[1].lags[0], Some(v));
        assert_eq!(batch[1].lags[1], Some(5.0));
        assert_eq!(batch[2].lags[0], Some(v));
        assert_eq!(batch[2].lags[1], Some(v));
        assert_eq!(batch[2].lags[2], Some(5.0));
    }

    #[test]
    fn scenario_days_six_to_eight() {
        // Day 5 measured 11, day 4 14, day 3 9; days 7 and 8 carry the stale
        // window from the as-of join.
        let seeded = [Some(11.0), Some(14.0), Some(9.0)];
        let mut batch = vec![
            input("X", 8, seeded),
            input("X", 6, seeded),
            input("X", 7, seeded),
        ];
        let rows = chain_forecasts(&mut batch, &lags123(), &DayIndex, day(5)).unwrap();

        let predicted: Vec<_> = rows.iter().map(|r| r.predicted_pm25).collect();
        assert_eq!(predicted, [6.0, 7.0, 8.0]);
        assert!(rows.iter().all(|r| r.forecast_on == day(5)));

        let by_day = |n: i64| batch.iter().find(|r| r.date == day(n)).unwrap();
        assert_eq!(by_day(6).lags[0], Some(11.0));
        assert_eq!(by_day(7).lags[0], Some(6.0));
        assert_eq!(by_day(8).lags[0], Some(7.0));
        assert_eq!(by_day(8).lags[1], Some(6.0));
        assert_eq!(by_day(8).lags[2], Some(11.0));
    }

    #[test]
    fn entities_chain_independently() {
        let mut batch = vec![
            input("B", 1, [Some(100.0), Some(100.0), Some(100.0)]),
            input("A", 1, [Some(1.0), Some(1.0), Some(1.0)]),
            input("A", 2, [None, None, None]),
            input("B", 2, [None, None, None]),
        ];
        let rows = chain_forecasts(&mut batch, &lags123(), &DayIndex, day(0)).unwrap();
        let keys: Vec<_> = rows.iter().map(|r| (r.date, r.entity_id.as_str())).collect();
        assert_eq!(keys, [(day(1), "A"), (day(1), "B"), (day(2), "A"), (day(2), "B")]);
        assert_eq!(batch[2].lags, vec![Some(1.0), Some(1.0), Some(1.0)]);
        assert_eq!(batch[3].lags, vec![Some(1.0), Some(100.0), Some(100.0)]);
    }

    #[test]
    fn gap_keeps_incoming_lags() {
        let mut batch = vec![
            input("X", 1, [Some(1.0), Some(1.0), Some(1.0)]),
            input("X", 3, [Some(9.0), Some(9.0), Some(9.0)]),
        ];
        chain_forecasts(&mut batch, &lags123(), &Constant(0.5), day(0)).unwrap();
        assert_eq!(batch[1].lags, vec![Some(9.0), Some(9.0), Some(9.0)]);
    }

    #[test]
    fn missing_seed_lag_fails_the_batch() {
        let mut batch = vec![
            input("A", 1, [Some(1.0), Some(1.0), Some(1.0)]),
            input("B", 1, [Some(1.0), None, Some(1.0)]),
        ];
        let err = chain_forecasts(&mut batch, &lags123(), &Constant(1.0), day(0)).unwrap_err();
        assert!(matches!(err, ChainError::MissingFeature { lag: 2, .. }));
    }

    #[test]
    fn model_failure_fails_the_batch() {
        let mut batch = vec![
            input("X", 1, [Some(1.0), Some(1.0), Some(1.0)]),
            input("X", 2, [None, None, None]),
            input("X", 3, [None, None, None]),
        ];
        let err = chain_forecasts(&mut batch, &lags123(), &FailOn(2.0), day(0)).unwrap_err();
        assert!(matches!(err, ChainError::Model { date, .. } if date == day(2)));
    }

    #[test]
    fn non_contiguous_lags_are_rejected() {
        let set = LagSet::new([1, 3]).unwrap();
        let mut batch = vec![ForecastInput {
            entity_id: "X".into(),
            date: day(1),
            weather: vec![],
            lags: vec![Some(1.0), Some(1.0)],
        }];
        let err = chain_forecasts(&mut batch, &set, &Constant(1.0), day(0)).unwrap_err();
        assert!(matches!(err, ChainError::NonContiguousLags(_)));
    }

    #[test]
    fn duplicate_dates_are_rejected() {
        let mut batch = vec![
            input("X", 1, [Some(1.0), Some(1.0), Some(1.0)]),
            input("X", 1, [Some(1.0), Some(1.0), Some(1.0)]),
        ];
        let err = chain_forecasts(&mut batch, &lags123(), &Constant(1.0), day(0)).unwrap_err();
        assert!(matches!(err, ChainError::DuplicateRow { .. }));
    }
}
