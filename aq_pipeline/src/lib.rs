//! PM2.5 forecasting pipeline.
//!
//! The crate wires the boundary collaborators of `air_quality_ingestor` to a
//! local feature store and model registry, and implements the small amount of
//! logic that is genuinely this project's own: positional lag features
//! ([`features::lag`]) and chained multi-day forecasts ([`features::chain`]).

pub mod charts;
pub mod config;
pub mod features;
pub mod model;
pub mod pipelines;
pub mod store;
