//! File-backed model registry.
//!
//! Layout: `<root>/<name>/v<version>/{model.bin, card.json}`, where
//! `model.bin` is the booster's native artifact. Versions are
//! assigned on registration as one past the highest existing version. A
//! version directory is written under a temporary name and renamed into
//! place, so a half-written model is never visible.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::info;
use uuid::Uuid;

use crate::model::{ModelError, boosted::BoostedTrees, metrics::Metrics};

const MODEL_FILE: &str = "model.bin";
const CARD_FILE: &str = "card.json";

/// Metadata stored next to a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCard {
    pub name: String,
    /// Assigned by the registry.
    pub version: u32,
    pub description: String,
    pub feature_names: Vec<String>,
    pub lags: Vec<u32>,
    pub metrics: Metrics,
    pub trained_at: DateTime<Utc>,
}

pub struct LocalModelRegistry {
    root: PathBuf,
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ModelError + '_ {
    move |source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ModelError> {
    let text = std::fs::read_to_string(path).map_err(io_err(path))?;
    serde_json::from_str(&text).map_err(|source| ModelError::Serde {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ModelError> {
    let text = serde_json::to_string_pretty(value).map_err(|source| ModelError::Serde {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, text).map_err(io_err(path))
}

impl LocalModelRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn model_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Registered versions of `name`, ascending. Empty if none.
    pub fn versions(&self, name: &str) -> Result<Vec<u32>, ModelError> {
        let dir = self.model_dir(name);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut versions = Vec::new();
        for entry in std::fs::read_dir(&dir).map_err(io_err(&dir))? {
            let entry = entry.map_err(io_err(&dir))?;
            let file_name = entry.file_name();
            let Some(version) = file_name
                .to_str()
                .and_then(|s| s.strip_prefix('v'))
                .and_then(|s| s.parse::<u32>().ok())
            else {
                continue;
            };
            if entry.path().join(CARD_FILE).is_file() {
                versions.push(version);
            }
        }
        versions.sort_unstable();
        Ok(versions)
    }

    /// Store `model` under `card.name` with the next free version.
    pub fn register(
        &self,
        model: &BoostedTrees,
        mut card: ModelCard,
    ) -> Result<ModelCard, ModelError> {
        let name_dir = self.model_dir(&card.name);
        std::fs::create_dir_all(&name_dir).map_err(io_err(&name_dir))?;

        card.version = self.versions(&card.name)?.last().map_or(1, |v| v + 1);
        let staging = name_dir.join(format!(".staging-{}", Uuid::new_v4()));
        std::fs::create_dir(&staging).map_err(io_err(&staging))?;
        model.save(&staging.join(MODEL_FILE))?;
        write_json(&staging.join(CARD_FILE), &card)?;

        let target = name_dir.join(format!("v{}", card.version));
        std::fs::rename(&staging, &target).map_err(io_err(&target))?;

        info!(model = %card.name, version = card.version, mse = card.metrics.mse, r2 = card.metrics.r2, "model registered");
        Ok(card)
    }

    /// Load a specific version, or the latest when `version` is `None`.
    pub fn load(
        &self,
        name: &str,
        version: Option<u32>,
    ) -> Result<(BoostedTrees, ModelCard), ModelError> {
        let version = match version {
            Some(v) => v,
            None => *self
                .versions(name)?
                .last()
                .ok_or_else(|| ModelError::NotRegistered {
                    name: name.to_string(),
                })?,
        };
        let dir = self.model_dir(name).join(format!("v{version}"));
        if !dir.join(CARD_FILE).is_file() {
            return Err(ModelError::VersionNotFound {
                name: name.to_string(),
                version,
            });
        }
        let card: ModelCard = read_json(&dir.join(CARD_FILE))?;
        let model = BoostedTrees::load(&dir.join(MODEL_FILE), card.feature_names.len())?;
        Ok((model, card))
    }
}
