//! Positional lag features.
//!
//! `value_lagged_Nd` at a row is the value found N rows earlier in the same
//! entity's date-sorted series. The shift is by *position*, not by calendar:
//! when a date is missing from the input, the lag silently reaches further
//! back in time instead of producing a null. Downstream models were trained
//! on features built this way, so the behavior is preserved as-is.

use std::collections::VecDeque;

use air_quality_ingestor::models::observation::Observation;
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Value column the lags are computed from.
pub const TARGET_COLUMN: &str = "pm25";

#[derive(Debug, Error, PartialEq)]
pub enum LagError {
    /// Two rows share `(entity, date)`; the order within a day is undefined.
    #[error("duplicate observation for {entity} on {date}")]
    Duplicate { entity: String, date: NaiveDate },

    #[error("invalid lag set: {0}")]
    InvalidLagSet(String),
}

/// A non-empty, sorted, duplicate-free set of positive lag offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LagSet(Vec<u32>);

impl LagSet {
    pub fn new(lags: impl IntoIterator<Item = u32>) -> Result<Self, LagError> {
        let mut lags: Vec<u32> = lags.into_iter().collect();
        if lags.is_empty() {
            return Err(LagError::InvalidLagSet("no lags".to_string()));
        }
        if lags.contains(&0) {
            return Err(LagError::InvalidLagSet("lag 0 is the value itself".to_string()));
        }
        lags.sort_unstable();
        lags.dedup();
        Ok(Self(lags))
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn max(&self) -> u32 {
        self.0.last().copied().unwrap_or(0)
    }

    /// `true` for `{1, 2, ..., k}`; required for forecast chaining.
    pub fn is_contiguous(&self) -> bool {
        self.0.iter().zip(1u32..).all(|(lag, expected)| *lag == expected)
    }
}

/// `pm25_lagged_3d` style column name.
pub fn lag_column(column: &str, lag: u32) -> String {
    format!("{column}_lagged_{lag}d")
}

/// Inverse of [`lag_column`].
pub fn parse_lag_column(column: &str, name: &str) -> Option<u32> {
    name.strip_prefix(column)?
        .strip_prefix("_lagged_")?
        .strip_suffix('d')?
        .parse()
        .ok()
}

/// An observation plus its lag columns, keyed by lag offset in ascending order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaggedObservation {
    pub entity_id: String,
    pub date: NaiveDate,
    pub value: Option<f64>,
    pub lags: IndexMap<u32, Option<f64>>,
}

impl LaggedObservation {
    pub fn lag(&self, n: u32) -> Option<f64> {
        self.lags.get(&n).copied().flatten()
    }

    /// Value and every lag present.
    pub fn is_complete(&self) -> bool {
        self.value.is_some() && self.lags.values().all(Option::is_some)
    }
}

/// Add one lag column per offset in `lags`.
///
/// Input order is irrelevant. Output has one row per input row, sorted by
/// `(date, entity_id)`. Rows with fewer than N earlier rows in their entity
/// get `None` for lag N. Nothing is dropped here; see [`complete_rows`].
pub fn add_lagged(rows: &[Observation], lags: &LagSet) -> Result<Vec<LaggedObservation>, LagError> {
    let mut order: Vec<&Observation> = rows.iter().collect();
    order.sort_by(|a, b| (&a.entity_id, a.date).cmp(&(&b.entity_id, b.date)));

    if let Some(w) = order
        .windows(2)
        .find(|w| w[0].entity_id == w[1].entity_id && w[0].date == w[1].date)
    {
        return Err(LagError::Duplicate {
            entity: w[0].entity_id.clone(),
            date: w[0].date,
        });
    }

    let depth = lags.max() as usize;
    let mut out = Vec::with_capacity(order.len());
    let mut window: VecDeque<Option<f64>> = VecDeque::with_capacity(depth + 1);
    let mut current: Option<&str> = None;

    for obs in order {
        if current != Some(obs.entity_id.as_str()) {
            window.clear();
            current = Some(obs.entity_id.as_str());
        }

        let lagged = lags
            .as_slice()
            .iter()
            .map(|&n| {
                let n = n as usize;
                let value = if window.len() >= n {
                    window[window.len() - n]
                } else {
                    None
                };
                (n as u32, value)
            })
            .collect();

        out.push(LaggedObservation {
            entity_id: obs.entity_id.clone(),
            date: obs.date,
            value: obs.value,
            lags: lagged,
        });

        window.push_back(obs.value);
        if window.len() > depth {
            window.pop_front();
        }
    }

    out.sort_by(|a, b| (a.date, &a.entity_id).cmp(&(b.date, &b.entity_id)));
    Ok(out)
}

/// Keep rows with the value and every lag present.
pub fn complete_rows(rows: Vec<LaggedObservation>) -> Vec<LaggedObservation> {
    rows.into_iter().filter(LaggedObservation::is_complete).collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(n - 1)
    }

    fn obs(entity: &str, n: i64, value: f64) -> Observation {
        Observation::new(entity, day(n), Some(value))
    }

    fn lags123() -> LagSet {
        LagSet::new([1, 2, 3]).unwrap()
    }

    #[test]
    fn scenario_day_five() {
        let rows: Vec<_> = [10.0, 12.0, 9.0, 14.0, 11.0]
            .iter()
            .enumerate()
            .map(|(i, v)| obs("X", i as i64 + 1, *v))
            .collect();
        let out = add_lagged(&rows, &lags123()).unwrap();
        let d5 = out.iter().find(|r| r.date == day(5)).unwrap();
        assert_eq!(d5.lag(1), Some(14.0));
        assert_eq!(d5.lag(2), Some(9.0));
        assert_eq!(d5.lag(3), Some(12.0));
    }

    #[test]
    fn short_history_is_null_at_the_start() {
        let rows = vec![obs("X", 1, 1.0), obs("X", 2, 2.0)];
        let out = add_lagged(&rows, &lags123()).unwrap();
        assert_eq!(out[0].lags.values().filter(|v| v.is_none()).count(), 3);
        assert_eq!(out[1].lag(1), Some(1.0));
        assert_eq!(out[1].lag(2), None);
        assert_eq!(out[1].lag(3), None);
        assert!(complete_rows(out).is_empty());
    }

    /// Possibly unintended: with day 3 missing, lag-1 at day 4 is day 2's
    /// value (one row back), not null (one calendar day back).
    #[test]
    fn gap_lags_by_position_not_calendar() {
        let rows = vec![obs("X", 1, 1.0), obs("X", 2, 2.0), obs("X", 4, 4.0)];
        let out = add_lagged(&rows, &lags123()).unwrap();
        let d4 = out.iter().find(|r| r.date == day(4)).unwrap();
        assert_eq!(d4.lag(1), Some(2.0));
        assert_eq!(d4.lag(2), Some(1.0));
        assert_eq!(d4.lag(3), None);
    }

    #[test]
    fn entities_do_not_leak_into_each_other() {
        let rows = vec![obs("B", 1, 100.0), obs("A", 1, 1.0), obs("A", 2, 2.0), obs("B", 2, 200.0)];
        let out = add_lagged(&rows, &lags123()).unwrap();
        let keys: Vec<_> = out.iter().map(|r| (r.date, r.entity_id.as_str())).collect();
        assert_eq!(keys, [(day(1), "A"), (day(1), "B"), (day(2), "A"), (day(2), "B")]);
        assert_eq!(out[0].lag(1), None);
        assert_eq!(out[3].lag(1), Some(100.0));
    }

    #[test]
    fn missing_values_keep_their_position() {
        let rows = vec![
            obs("X", 1, 1.0),
            Observation::new("X", day(2), None),
            obs("X", 3, 3.0),
        ];
        let out = add_lagged(&rows, &lags123()).unwrap();
        assert_eq!(out[2].lag(1), None);
        assert_eq!(out[2].lag(2), Some(1.0));
    }

    #[test]
    fn duplicates_are_rejected() {
        let rows = vec![obs("X", 1, 1.0), obs("X", 1, 2.0)];
        let err = add_lagged(&rows, &lags123()).unwrap_err();
        assert_eq!(
            err,
            LagError::Duplicate {
                entity: "X".to_string(),
                date: day(1)
            }
        );
    }

    #[test]
    fn lag_set_validation() {
        assert!(LagSet::new([]).is_err());
        assert!(LagSet::new([0, 1]).is_err());
        let set = LagSet::new([3, 1, 2, 2]).unwrap();
        assert_eq!(set.as_slice(), &[1, 2, 3]);
        assert!(set.is_contiguous());
        assert!(!LagSet::new([1, 3]).unwrap().is_contiguous());
        assert!(!LagSet::new([2]).unwrap().is_contiguous());
    }

    #[test]
    fn lag_column_names() {
        assert_eq!(lag_column("pm25", 2), "pm25_lagged_2d");
        assert_eq!(parse_lag_column("pm25", "pm25_lagged_12d"), Some(12));
        assert_eq!(parse_lag_column("pm25", "pm25"), None);
        assert_eq!(parse_lag_column("pm25", "pm10_lagged_1d"), None);
    }

    fn series() -> impl Strategy<Value = Vec<Observation>> {
        // Distinct days per entity, arbitrary values (including missing).
        proptest::collection::vec(
            (0usize..3, proptest::collection::btree_set(1i64..60, 0..20)),
            1..4,
        )
        .prop_flat_map(|groups| {
            let n: usize = groups.iter().map(|(_, days)| days.len()).sum();
            (
                Just(groups),
                proptest::collection::vec(proptest::option::of(-5.0f64..500.0), n),
            )
        })
        .prop_map(|(groups, values)| {
            let mut values = values.into_iter();
            let mut rows = Vec::new();
            let mut used = std::collections::HashSet::new();
            for (entity, days) in groups {
                if !used.insert(entity) {
                    continue;
                }
                for d in days {
                    rows.push(Observation::new(format!("E{entity}"), day(d), values.next().flatten()));
                }
            }
            rows
        })
    }

    proptest! {
        #[test]
        fn lag_n_is_the_value_n_positions_back(rows in series(), lags in proptest::collection::btree_set(1u32..6, 1..4)) {
            let set = LagSet::new(lags).unwrap();
            let out = add_lagged(&rows, &set).unwrap();
            prop_assert_eq!(out.len(), rows.len());

            let mut by_entity: std::collections::BTreeMap<&str, Vec<&LaggedObservation>> = Default::default();
            for r in &out {
                by_entity.entry(r.entity_id.as_str()).or_default().push(r);
            }
            for series in by_entity.values() {
                for (i, row) in series.iter().enumerate() {
                    for &n in set.as_slice() {
                        let expected = i.checked_sub(n as usize).and_then(|j| series[j].value);
                        prop_assert_eq!(row.lag(n), expected);
                    }
                }
            }
        }

        #[test]
        fn transform_is_idempotent(rows in series()) {
            let set = lags123();
            let first = add_lagged(&rows, &set).unwrap();
            let mut reversed = rows.clone();
            reversed.reverse();
            prop_assert_eq!(&first, &add_lagged(&rows, &set).unwrap());
            prop_assert_eq!(&first, &add_lagged(&reversed, &set).unwrap());
        }
    }
}
