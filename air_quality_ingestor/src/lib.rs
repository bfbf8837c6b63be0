//! Boundary collaborators for the air-quality pipeline.
//!
//! Everything that talks to the outside world lives here: the air-quality
//! feed (aqicn.org), the Open-Meteo weather API, and the per-sensor CSV
//! exports used for backfills. Network calls go through [`retry`] so that
//! transient failures are retried with exponential backoff before they
//! surface to the caller.

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod errors;
pub mod io;
pub mod models;
pub mod providers;
pub mod retry;
