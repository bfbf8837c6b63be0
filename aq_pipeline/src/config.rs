//! Pipeline configuration: parsing, normalization, and loading.
//!
//! One TOML file drives every command. It names the project directories,
//! the feature-group names and versions, the lag set and forecast horizon,
//! the model, the dashboard window and the ingestor transport settings
//! (`[ingest]`). Secrets never live here; the aqicn token is read from the
//! environment variable named by `ingest.token_env`.
//!
//! Key behaviors:
//! - Every section except `[project]` may be omitted and falls back to the
//!   defaults below.
//! - Normalization sorts and de-duplicates the lag set and the dashboard lead
//!   days, trims group names, and rejects values no pipeline can run with.
//! - Relative paths are resolved against the directory of the config file
//!   when loading from disk.
//!
//! Entrypoints:
//! - Parse + normalize from a TOML string: [`load_config_str`]
//! - Parse + normalize from a file path: [`load_config_path`]

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use air_quality_ingestor::{config::IngestConfig, models::request_params::MAX_FORECAST_DAYS};
use anyhow::{Context, bail};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use toml::from_str;
use tracing::debug;

use crate::{features::lag::LagSet, model::boosted::BoostParams};

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub project: ProjectCfg,
    #[serde(default)]
    pub groups: GroupsCfg,
    #[serde(default)]
    pub features: FeaturesCfg,
    #[serde(default)]
    pub model: ModelCfg,
    #[serde(default)]
    pub dashboard: DashboardCfg,
    #[serde(default)]
    pub ingest: IngestConfig,
}

/// Where things live on disk.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectCfg {
    pub name: String,
    /// Root of the local feature store.
    pub store_dir: PathBuf,
    /// Root of the local model registry.
    pub model_dir: PathBuf,
    /// JSON file mapping place keys to place records.
    pub places_file: PathBuf,
    /// Directory of per-sensor CSV exports used by the backfill.
    pub history_dir: PathBuf,
    /// Charts are written here.
    pub output_dir: PathBuf,
    /// IANA zone in which "today" is computed.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "Europe/Stockholm".to_string()
}

/// Name and version of one feature group.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GroupRef {
    pub name: String,
    pub version: u32,
}

impl GroupRef {
    fn new(name: &str, version: u32) -> Self {
        Self {
            name: name.to_string(),
            version,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GroupsCfg {
    pub air_quality: GroupRef,
    pub weather: GroupRef,
    pub air_quality_lagged: GroupRef,
    pub forecasts: GroupRef,
}

impl Default for GroupsCfg {
    fn default() -> Self {
        Self {
            air_quality: GroupRef::new("air_quality", 2),
            weather: GroupRef::new("weather", 2),
            air_quality_lagged: GroupRef::new("air_quality_lagged", 3),
            forecasts: GroupRef::new("air_quality_forecasts", 1),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeaturesCfg {
    /// Lag offsets in days.
    pub lags: Vec<u32>,
    /// Weather forecast horizon, and therefore the prediction horizon.
    pub forecast_days: u8,
}

impl Default for FeaturesCfg {
    fn default() -> Self {
        Self {
            lags: vec![1, 2, 3],
            forecast_days: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelCfg {
    pub name: String,
    /// Registry version used for inference; latest when absent.
    pub version: Option<u32>,
    /// Boosting rounds.
    pub rounds: u32,
    pub max_depth: u32,
    /// Learning rate.
    pub eta: f32,
}

impl ModelCfg {
    pub fn boost_params(&self) -> BoostParams {
        BoostParams {
            rounds: self.rounds,
            max_depth: self.max_depth,
            eta: self.eta,
        }
    }
}

impl Default for ModelCfg {
    fn default() -> Self {
        let boost = BoostParams::default();
        Self {
            name: "air_quality_xgboost_model".to_string(),
            version: None,
            rounds: boost.rounds,
            max_depth: boost.max_depth,
            eta: boost.eta,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DashboardCfg {
    /// Days of measured history shown before today.
    pub history_days: u32,
    /// Days of forecasts shown after today.
    pub forecast_window_days: u32,
    /// One forecast series is drawn per lead time (days between forecast and date).
    pub lead_days: Vec<u32>,
}

impl Default for DashboardCfg {
    fn default() -> Self {
        Self {
            history_days: 14,
            forecast_window_days: 14,
            lead_days: vec![1, 4, 9],
        }
    }
}

/// Summary of changes performed during normalization.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct NormalizationReport {
    /// Duplicate lag offsets removed.
    pub lags_deduped: usize,
    /// Whether the lag set had to be reordered.
    pub lags_reordered: bool,
    /// Duplicate dashboard lead days removed.
    pub lead_days_deduped: usize,
    /// Group names that changed when trimming.
    pub group_names_trimmed: usize,
}

impl PipelineConfig {
    /// Parsed `project.timezone`.
    pub fn timezone(&self) -> anyhow::Result<Tz> {
        self.project
            .timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("bad timezone {:?}: {e}", self.project.timezone))
    }

    /// The configured lag set. Valid after normalization.
    pub fn lag_set(&self) -> anyhow::Result<LagSet> {
        LagSet::new(self.features.lags.iter().copied()).context("invalid features.lags")
    }

    fn resolve_paths(&mut self, base: &Path) {
        let p = &mut self.project;
        for path in [
            &mut p.store_dir,
            &mut p.model_dir,
            &mut p.places_file,
            &mut p.history_dir,
            &mut p.output_dir,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

fn dedupe_sorted(values: &mut Vec<u32>) -> (usize, bool) {
    let before = values.len();
    let was_sorted = values.windows(2).all(|w| w[0] <= w[1]);
    values.sort_unstable();
    values.dedup();
    (before - values.len(), !was_sorted)
}

/// Normalize a configuration in place.
///
/// Errors:
/// - empty project name or group name, duplicate group (name, version)
/// - empty lag set or a zero lag
/// - forecast horizon outside `1..=16`
/// - zero boosting rounds or depth, learning rate outside `(0, 1]`
/// - unknown time zone
pub fn normalize_config(cfg: &mut PipelineConfig) -> anyhow::Result<NormalizationReport> {
    let mut report = NormalizationReport::default();

    cfg.project.name = cfg.project.name.trim().to_string();
    if cfg.project.name.is_empty() {
        bail!("project.name cannot be empty");
    }
    cfg.timezone()?;

    let g = &mut cfg.groups;
    let mut seen = HashSet::new();
    for group in [
        &mut g.air_quality,
        &mut g.weather,
        &mut g.air_quality_lagged,
        &mut g.forecasts,
    ] {
        let trimmed = group.name.trim().to_string();
        if trimmed.is_empty() {
            bail!("feature group name cannot be empty");
        }
        if trimmed != group.name {
            report.group_names_trimmed += 1;
            group.name = trimmed;
        }
        if !seen.insert((group.name.clone(), group.version)) {
            bail!(
                "feature group {} v{} is configured twice",
                group.name,
                group.version
            );
        }
    }

    if cfg.features.lags.is_empty() {
        bail!("features.lags cannot be empty");
    }
    if cfg.features.lags.contains(&0) {
        bail!("features.lags cannot contain 0");
    }
    let (deduped, reordered) = dedupe_sorted(&mut cfg.features.lags);
    report.lags_deduped = deduped;
    report.lags_reordered = reordered;

    let days = cfg.features.forecast_days;
    if days == 0 || days > MAX_FORECAST_DAYS {
        bail!("features.forecast_days must be within 1..={MAX_FORECAST_DAYS}, got {days}");
    }

    if cfg.model.rounds == 0 || cfg.model.max_depth == 0 {
        bail!("model.rounds and model.max_depth must be positive");
    }
    if !(cfg.model.eta > 0.0 && cfg.model.eta <= 1.0) {
        bail!("model.eta must be within (0, 1], got {}", cfg.model.eta);
    }
    if cfg.model.name.trim().is_empty() {
        bail!("model.name cannot be empty");
    }

    let (deduped, _) = dedupe_sorted(&mut cfg.dashboard.lead_days);
    report.lead_days_deduped = deduped;

    Ok(report)
}

/// Parse and normalize a configuration from a TOML string.
///
/// Relative paths are left as written.
pub fn load_config_str(toml_str: &str) -> anyhow::Result<PipelineConfig> {
    let mut cfg: PipelineConfig = from_str(toml_str).context("failed to parse pipeline TOML")?;
    let report = normalize_config(&mut cfg).context("normalize_config failed")?;
    debug!(?report, "configuration normalized");
    Ok(cfg)
}

/// Read a configuration file from disk, parse, and normalize it.
///
/// Relative paths inside the file are resolved against the file's directory.
pub fn load_config_path(path: impl AsRef<Path>) -> anyhow::Result<PipelineConfig> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config file {}", path.display()))?;
    let mut cfg = load_config_str(&text)?;
    if let Some(base) = path.parent() {
        cfg.resolve_paths(base);
    }
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [project]
        name = "ostergotland_air_quality"
        store_dir = "store"
        model_dir = "models"
        places_file = "places.json"
        history_dir = "data/air-quality"
        output_dir = "out"
    "#;

    #[test]
    fn minimal_config_uses_pipeline_defaults() {
        let cfg = load_config_str(MINIMAL).unwrap();
        assert_eq!(cfg.groups.air_quality, GroupRef::new("air_quality", 2));
        assert_eq!(cfg.groups.air_quality_lagged.version, 3);
        assert_eq!(cfg.groups.forecasts.name, "air_quality_forecasts");
        assert_eq!(cfg.features.lags, vec![1, 2, 3]);
        assert_eq!(cfg.features.forecast_days, 10);
        assert_eq!(cfg.dashboard.lead_days, vec![1, 4, 9]);
        assert_eq!(cfg.timezone().unwrap(), chrono_tz::Europe::Stockholm);
        assert_eq!(cfg.ingest.token_env, "AQICN_ORG_API_TOKEN");
    }

    #[test]
    fn lags_are_sorted_and_deduped() {
        let toml_str = format!("{MINIMAL}\n[features]\nlags = [3, 1, 2, 1]\n");
        let mut cfg: PipelineConfig = toml::from_str(&toml_str).unwrap();
        let report = normalize_config(&mut cfg).unwrap();
        assert_eq!(cfg.features.lags, vec![1, 2, 3]);
        assert_eq!(report.lags_deduped, 1);
        assert!(report.lags_reordered);
    }

    #[test]
    fn invalid_values_are_rejected() {
        for extra in [
            "[features]\nlags = []\n",
            "[features]\nlags = [0, 1]\n",
            "[features]\nforecast_days = 0\n",
            "[features]\nforecast_days = 17\n",
            "[model]\nrounds = 0\n",
            "[model]\neta = 0.0\n",
            "[model]\neta = 1.5\n",
            "[groups.weather]\nname = \"air_quality\"\nversion = 2\n",
        ] {
            let toml_str = format!("{MINIMAL}\n{extra}");
            assert!(load_config_str(&toml_str).is_err(), "accepted: {extra}");
        }
    }

    #[test]
    fn bad_timezone_is_rejected() {
        let toml_str = MINIMAL.replace(
            "output_dir = \"out\"",
            "output_dir = \"out\"\ntimezone = \"Mars/Olympus\"",
        );
        let err = load_config_str(&toml_str).unwrap_err();
        assert!(format!("{err:#}").contains("bad timezone"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let toml_str = format!("{MINIMAL}\n[features]\nlag = [1]\n");
        assert!(load_config_str(&toml_str).is_err());
    }

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aq_pipeline.toml");
        std::fs::write(&path, MINIMAL).unwrap();

        let cfg = load_config_path(&path).unwrap();
        assert_eq!(cfg.project.store_dir, dir.path().join("store"));
        assert_eq!(cfg.project.places_file, dir.path().join("places.json"));
    }
}
