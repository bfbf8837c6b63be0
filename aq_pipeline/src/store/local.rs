//! Directory-per-group feature store backed by Arrow IPC files.
//!
//! Each group lives in `<root>/<name>_v<version>/` with `meta.json` (the
//! registration spec) and `data.arrow` (all rows, sorted by key). Writes go
//! to a temporary file that is renamed over the data file.

use std::{
    collections::BTreeMap,
    fs::File,
    path::{Path, PathBuf},
};

use polars::prelude::*;
use tracing::{debug, info};
use uuid::Uuid;

use crate::store::{
    DateFilter, FeatureGroup, FeatureGroupSpec, FeatureRecord, FeatureStore, InsertSummary,
    StoreError, record::RecordKey,
};

const META_FILE: &str = "meta.json";
const DATA_FILE: &str = "data.arrow";

pub struct LocalFeatureStore {
    root: PathBuf,
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl LocalFeatureStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(io_err(&root))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn group_dir(&self, name: &str, version: u32) -> PathBuf {
        self.root.join(format!("{name}_v{version}"))
    }

    fn read_meta(path: &Path) -> Result<FeatureGroupSpec, StoreError> {
        let text = std::fs::read_to_string(path).map_err(io_err(path))?;
        serde_json::from_str(&text).map_err(|source| StoreError::Meta {
            path: path.to_path_buf(),
            source,
        })
    }

    fn read_frame(dir: &Path) -> Result<Option<DataFrame>, StoreError> {
        let path = dir.join(DATA_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let file = File::open(&path).map_err(io_err(&path))?;
        Ok(Some(IpcReader::new(file).finish()?))
    }

    fn write_frame(dir: &Path, df: &mut DataFrame) -> Result<(), StoreError> {
        let tmp = dir.join(format!(".{DATA_FILE}.{}.tmp", Uuid::new_v4()));
        {
            let mut file = File::create(&tmp).map_err(io_err(&tmp))?;
            IpcWriter::new(&mut file).finish(df)?;
            file.sync_all().map_err(io_err(&tmp))?;
        }
        let target = dir.join(DATA_FILE);
        std::fs::rename(&tmp, &target).map_err(io_err(&target))
    }

    fn dir_of(&self, group: &FeatureGroup) -> PathBuf {
        self.group_dir(&group.spec.name, group.spec.version)
    }
}

impl FeatureStore for LocalFeatureStore {
    fn get_or_create_group(&self, spec: &FeatureGroupSpec) -> Result<FeatureGroup, StoreError> {
        let dir = self.group_dir(&spec.name, spec.version);
        let meta = dir.join(META_FILE);

        if meta.is_file() {
            let stored = Self::read_meta(&meta)?;
            let mismatch = if stored.primary_key != spec.primary_key {
                Some("primary key")
            } else if stored.event_time != spec.event_time {
                Some("event-time column")
            } else {
                None
            };
            if let Some(field) = mismatch {
                return Err(StoreError::SpecMismatch {
                    name: spec.name.clone(),
                    version: spec.version,
                    field,
                });
            }
            return Ok(FeatureGroup { spec: stored });
        }

        std::fs::create_dir_all(&dir).map_err(io_err(&dir))?;
        let text = serde_json::to_string_pretty(spec).map_err(|source| StoreError::Meta {
            path: meta.clone(),
            source,
        })?;
        std::fs::write(&meta, text).map_err(io_err(&meta))?;
        info!(group = %spec.name, version = spec.version, "feature group created");
        Ok(FeatureGroup { spec: spec.clone() })
    }

    fn get_group(&self, name: &str, version: u32) -> Result<FeatureGroup, StoreError> {
        let meta = self.group_dir(name, version).join(META_FILE);
        if !meta.is_file() {
            return Err(StoreError::GroupNotFound {
                name: name.to_string(),
                version,
            });
        }
        Ok(FeatureGroup {
            spec: Self::read_meta(&meta)?,
        })
    }

    fn insert<R: FeatureRecord>(
        &self,
        group: &FeatureGroup,
        rows: &[R],
    ) -> Result<InsertSummary, StoreError> {
        let dir = self.dir_of(group);
        let existing = match Self::read_frame(&dir)? {
            Some(df) => R::from_frame(&df)?,
            None => Vec::new(),
        };

        let mut merged: BTreeMap<RecordKey, R> =
            existing.into_iter().map(|r| (r.key(), r)).collect();
        let mut replaced = 0;
        for row in rows {
            if merged.insert(row.key(), row.clone()).is_some() {
                replaced += 1;
            }
        }

        let all: Vec<R> = merged.into_values().collect();
        let mut df = R::to_frame(&all)?;
        Self::write_frame(&dir, &mut df)?;

        let summary = InsertSummary {
            written: rows.len(),
            replaced,
            total: all.len(),
        };
        debug!(group = %group.spec.name, version = group.spec.version, ?summary, "rows inserted");
        Ok(summary)
    }

    fn read<R: FeatureRecord>(
        &self,
        group: &FeatureGroup,
        filter: DateFilter,
    ) -> Result<Vec<R>, StoreError> {
        let Some(df) = Self::read_frame(&self.dir_of(group))? else {
            return Ok(Vec::new());
        };
        let mut rows = R::from_frame(&df)?;
        rows.retain(|r| filter.contains(r.event_date()));
        Ok(rows)
    }
}
