//! Lot features: per-arrival spatio-temporal features of parking lots.
//!
//! Modular structure:
//! - [`records`] — Destination/origin event ingestion (CSV)
//! - [`spatial`] — Point-in-polygon lot assignment
//! - [`window`] — Causal term windows and flow counts
//! - [`density`] — Per-lot Gaussian KDE, density grid, hotspots
//! - [`features`] — Hotspot distance, earth-mover distance, log-prob, dwell, in/out ratio
//! - [`pipeline`] — Chronological driver producing the feature table
//! - [`output`] — CSV / SQLite feature table sinks
//! - [`logging`] — Structured JSON logging

pub mod config;
pub mod density;
pub mod error;
pub mod features;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod records;
pub mod spatial;
pub mod window;

pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use features::{FeatureExtractor, HorizonFeatures};
pub use logging::StructuredLogger;
pub use output::{FeatureRow, FeatureTable};
pub use pipeline::{PipelineDriver, RunSummary};
pub use records::{Coord, Dataset, Event, LotId};
