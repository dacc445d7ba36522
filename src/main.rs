//! Lot features entrypoint: load destinations/origins, score every arrival,
//! write the feature table, print a one-line JSON summary to stdout.

use lot_features::{
    config::PipelineConfig,
    logging::{StructuredLogger, SummaryLine},
    pipeline::{PipelineDriver, RunSummary},
    records::load_dataset,
};
use std::time::Instant;
use tracing::{error, info};

fn run(config: &PipelineConfig) -> Result<RunSummary, (RunSummary, lot_features::Error)> {
    let dataset = load_dataset(&config.input, &config.features.lot_ids, config.features.hunting_mode)
        .map_err(|e| (RunSummary::default(), e))?;

    let driver = PipelineDriver::new(config);
    let (table, summary) = driver.run(&dataset).map_err(|e| (RunSummary::default(), e))?;
    if let Err(e) = table.flush(&config.output) {
        let aborted = summary.abort(e);
        return Err((summary, aborted));
    }
    info!(path = %config.output.path.display(), rows = table.len(), "feature table written");
    Ok(summary)
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config_path = std::env::var("LOT_FEATURES_CONFIG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("config.json"));
    let config = match PipelineConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            let defaults = PipelineConfig::default().log;
            StructuredLogger::init(defaults.json, &defaults.level);
            error!(error = %e, "config rejected");
            return Err(e.into());
        }
    };

    StructuredLogger::init(config.log.json, &config.log.level);
    info!(config = %config_path.display(), output = %config.output.path.display(), "lot features starting");

    let started = Instant::now();
    let output = config.output.path.display().to_string();
    let mut stdout = std::io::stdout();
    match run(&config) {
        Ok(summary) => {
            info!(elapsed_ms = started.elapsed().as_millis() as u64, "lot features done");
            StructuredLogger::emit_json(&SummaryLine::from_summary(&summary, Some(&output), None), &mut stdout);
            Ok(())
        }
        Err((summary, e)) => {
            error!(error = %e, "run failed");
            let reason = e.to_string();
            StructuredLogger::emit_json(
                &SummaryLine::from_summary(&summary, Some(&output), Some(&reason)),
                &mut stdout,
            );
            Err(e.into())
        }
    }
}
