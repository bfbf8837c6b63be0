//! Small helpers shared by the ingestor and the pipeline crates.

pub mod env;
