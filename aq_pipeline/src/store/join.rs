//! Row joins used when assembling model inputs.

use std::collections::HashMap;

use crate::store::FeatureRecord;

/// Pairs of rows sharing `(entity, date)`, in `left` order. Left rows with
/// no partner are dropped.
pub fn join_exact<'l, 'r, L: FeatureRecord, R: FeatureRecord>(
    left: &'l [L],
    right: &'r [R],
) -> Vec<(&'l L, &'r R)> {
    let index: HashMap<(&str, chrono::NaiveDate), &R> = right
        .iter()
        .map(|r| ((r.entity_id(), r.event_date()), r))
        .collect();
    left.iter()
        .filter_map(|l| {
            index
                .get(&(l.entity_id(), l.event_date()))
                .map(|r| (l, *r))
        })
        .collect()
}

/// For each left row, the latest right row of the same entity dated strictly
/// before it, in `left` order.
pub fn join_asof_before<'l, 'r, L: FeatureRecord, R: FeatureRecord>(
    left: &'l [L],
    right: &'r [R],
) -> Vec<(&'l L, Option<&'r R>)> {
    let mut by_entity: HashMap<&str, Vec<&R>> = HashMap::new();
    for r in right {
        by_entity.entry(r.entity_id()).or_default().push(r);
    }
    for rows in by_entity.values_mut() {
        rows.sort_by_key(|r| r.event_date());
    }

    left.iter()
        .map(|l| {
            let hit = by_entity.get(l.entity_id()).and_then(|rows| {
                let idx = rows.partition_point(|r| r.event_date() < l.event_date());
                idx.checked_sub(1).map(|i| rows[i])
            });
            (l, hit)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use air_quality_ingestor::models::observation::Observation;
    use chrono::NaiveDate;

    use super::*;

    fn d(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, n).unwrap()
    }

    fn obs(id: &str, day: u32, v: f64) -> Observation {
        Observation::new(id, d(day), Some(v))
    }

    #[test]
    fn exact_join_matches_entity_and_date() {
        let left = vec![obs("a", 1, 1.0), obs("a", 2, 2.0), obs("b", 1, 3.0)];
        let right = vec![obs("a", 2, 20.0), obs("b", 1, 30.0), obs("b", 2, 40.0)];
        let pairs: Vec<_> = join_exact(&left, &right)
            .into_iter()
            .map(|(l, r)| (l.value, r.value))
            .collect();
        assert_eq!(pairs, [(Some(2.0), Some(20.0)), (Some(3.0), Some(30.0))]);
    }

    #[test]
    fn asof_join_takes_latest_strictly_earlier_row() {
        let left = vec![obs("a", 5, 0.0), obs("a", 2, 0.0), obs("b", 5, 0.0), obs("c", 5, 0.0)];
        let right = vec![
            obs("a", 4, 4.0),
            obs("a", 1, 1.0),
            obs("a", 5, 5.0),
            obs("b", 7, 7.0),
            obs("c", 3, 3.0),
        ];
        let hits: Vec<_> = join_asof_before(&left, &right)
            .into_iter()
            .map(|(_, r)| r.and_then(|r| r.value))
            .collect();
        assert_eq!(hits, [Some(4.0), Some(1.0), None, Some(3.0)]);
    }
}
