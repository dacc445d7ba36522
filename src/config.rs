//! Pipeline configuration, loaded from a JSON file.

use crate::error::{Error, Result};
use crate::records::LotId;
use crate::window::{Horizon, HorizonSpec};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Destination/origin record sets and lot polygons
    pub input: InputConfig,
    /// Feature extraction parameters
    pub features: FeaturesConfig,
    /// Short/medium/long window parameters
    pub horizons: HorizonsConfig,
    /// Execution options
    pub run: RunConfig,
    /// Feature table destination
    pub output: OutputConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub destinations: PathBuf,
    pub origins: PathBuf,
    /// Lot polygons (`pk_lot`, WKT `geometry`). Only needed when records carry no lot column.
    pub lots: Option<PathBuf>,
    pub destination_schema: RecordSchema,
    pub origin_schema: RecordSchema,
}

/// Column names of one record set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSchema {
    pub time: String,
    pub lon: String,
    pub lat: String,
    pub lot: String,
    /// Column holding dwell seconds directly
    #[serde(default)]
    pub dwell_seconds: Option<String>,
    /// Column holding the entry time; dwell is `time - entry_time`
    #[serde(default)]
    pub entry_time: Option<String>,
}

impl RecordSchema {
    pub fn destinations() -> Self {
        Self {
            time: "stop_time".to_string(),
            lon: "end_lon".to_string(),
            lat: "end_lat".to_string(),
            lot: "pk_lot".to_string(),
            dwell_seconds: None,
            entry_time: Some("entry_time".to_string()),
        }
    }

    pub fn origins() -> Self {
        Self {
            time: "start_time".to_string(),
            lon: "start_lon".to_string(),
            lat: "start_lat".to_string(),
            lot: "pk_lot".to_string(),
            dwell_seconds: None,
            entry_time: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DensityMode {
    /// One model per lot from all of its history (leaks future arrivals into early rows)
    Static,
    /// Refit from history up to the event being scored
    AsOf { refit_every: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    /// Lots to process; empty means every lot present in the destinations
    pub lot_ids: Vec<LotId>,
    pub num_hotspots: usize,
    /// Gaussian kernel bandwidth in coordinate degrees
    pub density_bandwidth: f64,
    /// Cells per axis of the hotspot grid
    pub grid_resolution: usize,
    /// Max reference points drawn for the earth-mover distance
    pub wasserstein_sample_size: usize,
    pub random_seed: u64,
    /// Emit `{horizon}_hunting_time` from dwell seconds
    pub hunting_mode: bool,
    pub density_mode: DensityMode,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HorizonConfig {
    pub max_records: usize,
    pub duration_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HorizonsConfig {
    pub short: HorizonConfig,
    pub medium: HorizonConfig,
    pub long: HorizonConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Shard events by lot and process shards on the rayon pool
    pub parallel: bool,
    /// Rows between progress log lines (0 disables)
    pub progress_every: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Csv,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: PathBuf,
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            destinations: PathBuf::from("data/destinations.csv"),
            origins: PathBuf::from("data/origins.csv"),
            lots: None,
            destination_schema: RecordSchema::destinations(),
            origin_schema: RecordSchema::origins(),
        }
    }
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            lot_ids: Vec::new(),
            num_hotspots: 3,
            density_bandwidth: 0.00008,
            grid_resolution: 100,
            wasserstein_sample_size: 100,
            random_seed: 0,
            hunting_mode: true,
            density_mode: DensityMode::Static,
        }
    }
}

impl Default for HorizonsConfig {
    fn default() -> Self {
        Self {
            short: HorizonConfig {
                max_records: 1,
                duration_secs: 3600,
            },
            medium: HorizonConfig {
                max_records: 8,
                duration_secs: 4 * 3600,
            },
            long: HorizonConfig {
                max_records: 50,
                duration_secs: 24 * 3600,
            },
        }
    }
}

impl HorizonsConfig {
    /// Horizon specs in output order (short, medium, long).
    pub fn specs(&self) -> [HorizonSpec; 3] {
        let spec = |horizon, c: &HorizonConfig| HorizonSpec {
            horizon,
            max_records: c.max_records,
            duration: Duration::seconds(c.duration_secs),
        };
        [
            spec(Horizon::Short, &self.short),
            spec(Horizon::Medium, &self.medium),
            spec(Horizon::Long, &self.long),
        ]
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            progress_every: 500,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("results/training_data.csv"),
            format: OutputFormat::Csv,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file. A missing file gives the defaults; a file that cannot
    /// be read or parsed is an error, never a silent fallback.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let invalid = |reason: String| Error::Config {
            path: path.to_path_buf(),
            reason,
        };
        let data = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        serde_json::from_str(&data).map_err(|e| invalid(e.to_string()))
    }
}
