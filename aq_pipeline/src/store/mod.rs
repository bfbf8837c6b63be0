//! Feature-store abstraction.
//!
//! A feature group is a versioned table keyed by a primary key plus an
//! event-time column. Groups are registered create-if-absent; inserts are
//! appends where a row with an existing key replaces the old one, which
//! makes re-running a pipeline for the same day idempotent. Reads can be
//! restricted to an event-date window.

pub mod join;
pub mod local;
pub mod record;

use std::path::PathBuf;

use chrono::NaiveDate;
use polars::prelude::PolarsError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use local::LocalFeatureStore;
pub use record::FeatureRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("feature group {name} v{version} does not exist")]
    GroupNotFound { name: String, version: u32 },

    #[error("feature group {name} v{version} already exists with a different {field}")]
    SpecMismatch {
        name: String,
        version: u32,
        field: &'static str,
    },

    #[error("schema error: {0}")]
    Schema(String),

    #[error("I/O error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("metadata {} is unreadable", path.display())]
    Meta {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Polars operation failed")]
    Polars(#[from] PolarsError),
}

/// Registration parameters of a feature group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureGroupSpec {
    pub name: String,
    pub version: u32,
    pub description: String,
    pub primary_key: Vec<String>,
    pub event_time: String,
}

impl FeatureGroupSpec {
    /// A group keyed by `id` with event time `date`.
    pub fn keyed_by_id(name: &str, version: u32, description: &str) -> Self {
        Self {
            name: name.to_string(),
            version,
            description: description.to_string(),
            primary_key: vec!["id".to_string()],
            event_time: "date".to_string(),
        }
    }
}

/// Handle to a registered group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureGroup {
    pub spec: FeatureGroupSpec,
}

/// Inclusive event-date window; open ends are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn from(from: NaiveDate) -> Self {
        Self {
            from: Some(from),
            to: None,
        }
    }

    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.is_none_or(|f| date >= f) && self.to.is_none_or(|t| date <= t)
    }
}

/// Counts reported by an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertSummary {
    /// Rows in the insert batch.
    pub written: usize,
    /// Of those, rows that replaced an existing key.
    pub replaced: usize,
    /// Rows in the group afterwards.
    pub total: usize,
}

pub trait FeatureStore {
    /// Register `spec` unless it exists. An existing group must agree on
    /// primary key and event-time column.
    fn get_or_create_group(&self, spec: &FeatureGroupSpec) -> Result<FeatureGroup, StoreError>;

    /// Look up an existing group.
    fn get_group(&self, name: &str, version: u32) -> Result<FeatureGroup, StoreError>;

    /// Append rows; a row whose key already exists replaces the stored one.
    fn insert<R: FeatureRecord>(
        &self,
        group: &FeatureGroup,
        rows: &[R],
    ) -> Result<InsertSummary, StoreError>;

    /// Rows whose event date falls inside `filter`, sorted by `(date, id)`.
    fn read<R: FeatureRecord>(
        &self,
        group: &FeatureGroup,
        filter: DateFilter,
    ) -> Result<Vec<R>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_filter_bounds_are_inclusive() {
        let d = |n| NaiveDate::from_ymd_opt(2024, 1, n).unwrap();
        let f = DateFilter::between(d(5), d(10));
        assert!(!f.contains(d(4)));
        assert!(f.contains(d(5)));
        assert!(f.contains(d(10)));
        assert!(!f.contains(d(11)));
        assert!(DateFilter::all().contains(d(1)));
        assert!(DateFilter::from(d(3)).contains(d(31)));
    }
}
