//! Pipeline driver: chronological single pass over arrivals → causal windows →
//! per-horizon features → feature table.
//!
//! Per arrival the driver walks `Iterating → Windowing → Extracting → Emitting`,
//! or `Windowing → Skipping` when the arrival has no causal history or its lot
//! is unavailable. Lot-scoped state (history, density, reference population,
//! random source) lives in a [`LotContext`], so a run may be sharded by lot and
//! the shards merged afterwards without changing any value.

use crate::config::{PipelineConfig, RunConfig};
use crate::density::{DensityModelBuilder, LotDensity};
use crate::error::{Error, Result};
use crate::features::{FeatureExtractor, ReferencePopulation};
use crate::output::{FeatureRow, FeatureTable};
use crate::records::{Dataset, Event, LotId};
use crate::window::{HorizonSpec, LotHistory};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Iterating,
    Windowing,
    Extracting,
    Emitting,
    Skipping,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SkipReason {
    EmptyWindow,
    UnavailableLot,
}

/// Driver state with the data each state works on
enum Step<'a> {
    Iterating,
    Windowing(&'a Event),
    Extracting(&'a Event),
    Emitting(FeatureRow),
    Skipping(&'a Event, SkipReason),
    Done,
}

impl Step<'_> {
    fn state(&self) -> DriverState {
        match self {
            Step::Iterating => DriverState::Iterating,
            Step::Windowing(_) => DriverState::Windowing,
            Step::Extracting(_) => DriverState::Extracting,
            Step::Emitting(_) => DriverState::Emitting,
            Step::Skipping(..) => DriverState::Skipping,
            Step::Done => DriverState::Done,
        }
    }
}

/// Counts reported at the end of a run (or with an abort)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub events_seen: usize,
    pub rows_emitted: usize,
    pub skipped_empty_window: usize,
    /// Arrivals of lots that never built or were aborted
    pub skipped_unavailable_lot: usize,
    pub failed_lots: Vec<(LotId, String)>,
    pub last_timestamp: Option<DateTime<Utc>>,
}

impl RunSummary {
    fn merge(&mut self, other: RunSummary) {
        self.events_seen += other.events_seen;
        self.rows_emitted += other.rows_emitted;
        self.skipped_empty_window += other.skipped_empty_window;
        self.skipped_unavailable_lot += other.skipped_unavailable_lot;
        self.failed_lots.extend(other.failed_lots);
        self.last_timestamp = self.last_timestamp.max(other.last_timestamp);
    }

    /// Wrap a run-fatal error with the progress made so far.
    pub fn abort(&self, source: Error) -> Error {
        Error::Aborted {
            rows_emitted: self.rows_emitted,
            last_timestamp: self.last_timestamp,
            source: Box::new(source),
        }
    }
}

/// Everything the extractor needs for one lot
struct LotContext {
    history: LotHistory,
    density: LotDensity,
    reference: ReferencePopulation,
    rng: StdRng,
    rows: usize,
    last_ts: Option<DateTime<Utc>>,
}

enum LotSlot {
    Ready(Box<LotContext>),
    Unavailable,
}

/// Seed of a lot's random source; independent of which shard runs the lot.
fn lot_seed(seed: u64, lot_id: LotId) -> u64 {
    seed ^ (lot_id as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

pub struct PipelineDriver {
    extractor: FeatureExtractor,
    builder: DensityModelBuilder,
    specs: [HorizonSpec; 3],
    run: RunConfig,
}

impl PipelineDriver {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            extractor: FeatureExtractor::new(config.features.clone()),
            builder: DensityModelBuilder::from_config(&config.features),
            specs: config.horizons.specs(),
            run: config.run.clone(),
        }
    }

    /// Score every destination of the dataset.
    pub fn run(&self, dataset: &Dataset) -> Result<(FeatureTable, RunSummary)> {
        self.run_targets(&dataset.destinations, dataset)
    }

    /// Score `targets` against the dataset's history. Targets of lots outside the
    /// configured lot list are ignored. Rows come out ascending by (timestamp, lot).
    pub fn run_targets(&self, targets: &[Event], dataset: &Dataset) -> Result<(FeatureTable, RunSummary)> {
        let lot_filter = &self.extractor.config().lot_ids;
        let in_scope = |lot: LotId| lot_filter.is_empty() || lot_filter.contains(&lot);

        let mut targets: Vec<&Event> = targets.iter().filter(|e| in_scope(e.lot_id)).collect();
        targets.sort_by_key(|e| (e.ts, e.lot_id));

        let mut lot_ids: Vec<LotId> = if lot_filter.is_empty() {
            targets.iter().map(|e| e.lot_id).collect()
        } else {
            lot_filter.clone()
        };
        lot_ids.sort_unstable();
        lot_ids.dedup();

        if self.extractor.config().hunting_mode {
            check_dwell(dataset.destinations.iter().filter(|e| in_scope(e.lot_id)))?;
            check_dwell(targets.iter().copied())?;
        }

        let mut summary = RunSummary::default();
        let mut lots = self.prepare_lots(&lot_ids, dataset, &mut summary);
        let mut table = FeatureTable::with_capacity(self.extractor.config().hunting_mode, targets.len());
        let total = targets.len();

        if self.run.parallel {
            let mut shards: Vec<(LotId, Vec<&Event>)> = Vec::new();
            let mut by_lot: HashMap<LotId, usize> = HashMap::new();
            for e in targets {
                let idx = *by_lot.entry(e.lot_id).or_insert_with(|| {
                    shards.push((e.lot_id, Vec::new()));
                    shards.len() - 1
                });
                shards[idx].1.push(e);
            }
            let shards: Vec<(LotSlot, Vec<&Event>)> = shards
                .into_iter()
                .map(|(lot, events)| (lots.remove(&lot).unwrap_or(LotSlot::Unavailable), events))
                .collect();
            let hunting = table.hunting_mode();
            let results = shards
                .into_par_iter()
                .map(|(slot, events)| {
                    let lot = events[0].lot_id;
                    let mut lots = HashMap::from([(lot, slot)]);
                    let mut shard_table = FeatureTable::with_capacity(hunting, events.len());
                    let mut shard_summary = RunSummary::default();
                    let n = events.len();
                    self.drive(events.into_iter(), n, &mut lots, &mut shard_table, &mut shard_summary)?;
                    Ok((shard_table, shard_summary))
                })
                .collect::<Vec<Result<(FeatureTable, RunSummary)>>>();
            for r in results {
                match r {
                    Ok((t, s)) => {
                        table.extend(t.into_rows());
                        summary.merge(s);
                    }
                    Err(Error::Aborted { source, .. }) => return Err(summary.abort(*source)),
                    Err(e) => return Err(summary.abort(e)),
                }
            }
            table.sort();
        } else {
            self.drive(targets.into_iter(), total, &mut lots, &mut table, &mut summary)?;
        }

        info!(
            events = summary.events_seen,
            rows = summary.rows_emitted,
            skipped_empty_window = summary.skipped_empty_window,
            skipped_unavailable_lot = summary.skipped_unavailable_lot,
            failed_lots = summary.failed_lots.len(),
            "feature extraction complete"
        );
        Ok((table, summary))
    }

    /// Build history, density, and reference population per lot. Lots that fail
    /// are recorded and left unavailable.
    fn prepare_lots(&self, lot_ids: &[LotId], dataset: &Dataset, summary: &mut RunSummary) -> HashMap<LotId, LotSlot> {
        let prepare = |&lot: &LotId| (lot, self.prepare_lot(lot, dataset));
        let built: Vec<(LotId, Result<LotContext>)> = if self.run.parallel {
            lot_ids.par_iter().map(prepare).collect()
        } else {
            lot_ids.iter().map(prepare).collect()
        };
        built
            .into_iter()
            .map(|(lot, ctx)| match ctx {
                Ok(ctx) => (lot, LotSlot::Ready(Box::new(ctx))),
                Err(e) => {
                    warn!(lot_id = lot, error = %e, "lot skipped");
                    summary.failed_lots.push((lot, e.to_string()));
                    (lot, LotSlot::Unavailable)
                }
            })
            .collect()
    }

    fn prepare_lot(&self, lot_id: LotId, dataset: &Dataset) -> Result<LotContext> {
        let history = LotHistory::new(lot_id, &dataset.destinations, &dataset.origins);
        let config = self.extractor.config();
        let density = LotDensity::new(config.density_mode, self.builder, lot_id, history.coords())?;
        let reference = ReferencePopulation::new(lot_id, history.coords())?;
        debug!(lot_id, arrivals = history.arrivals().len(), "lot prepared");
        Ok(LotContext {
            history,
            density,
            reference,
            rng: StdRng::seed_from_u64(lot_seed(config.random_seed, lot_id)),
            rows: 0,
            last_ts: None,
        })
    }

    /// One chronological pass over `targets` (already sorted).
    fn drive<'a>(
        &self,
        mut targets: impl Iterator<Item = &'a Event>,
        total: usize,
        lots: &mut HashMap<LotId, LotSlot>,
        table: &mut FeatureTable,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let mut step = Step::Iterating;
        loop {
            trace!(state = ?step.state(), "driver step");
            step = match step {
                Step::Iterating => match targets.next() {
                    Some(e) => {
                        summary.events_seen += 1;
                        Step::Windowing(e)
                    }
                    None => Step::Done,
                },
                Step::Windowing(e) => match lots.get(&e.lot_id) {
                    Some(LotSlot::Ready(ctx)) if !ctx.history.causal(e.ts).is_empty() => Step::Extracting(e),
                    Some(LotSlot::Ready(_)) => Step::Skipping(e, SkipReason::EmptyWindow),
                    Some(LotSlot::Unavailable) | None => Step::Skipping(e, SkipReason::UnavailableLot),
                },
                Step::Extracting(e) => {
                    let Some(LotSlot::Ready(ctx)) = lots.get_mut(&e.lot_id) else {
                        return Err(summary.abort(Error::InsufficientData { lot_id: e.lot_id }));
                    };
                    match self.extract_row(ctx, e) {
                        Ok(row) => {
                            ctx.rows += 1;
                            ctx.last_ts = Some(e.ts);
                            Step::Emitting(row)
                        }
                        Err(err) if err.is_per_lot() => {
                            error!(
                                lot_id = e.lot_id,
                                timestamp = %e.ts,
                                rows_emitted = ctx.rows,
                                last_timestamp = ?ctx.last_ts,
                                error = %err,
                                "lot aborted"
                            );
                            summary.failed_lots.push((e.lot_id, err.to_string()));
                            summary.skipped_unavailable_lot += 1;
                            lots.insert(e.lot_id, LotSlot::Unavailable);
                            Step::Iterating
                        }
                        Err(err) => return Err(summary.abort(err)),
                    }
                }
                Step::Emitting(row) => {
                    summary.last_timestamp = Some(row.timestamp);
                    table.push(row);
                    summary.rows_emitted += 1;
                    let every = self.run.progress_every;
                    if every > 0 && summary.rows_emitted % every == 0 {
                        info!(
                            rows = summary.rows_emitted,
                            pct = (summary.events_seen as f64 / total.max(1) as f64 * 10000.0).round() / 100.0,
                            last_timestamp = ?summary.last_timestamp,
                            "progress"
                        );
                    }
                    Step::Iterating
                }
                Step::Skipping(e, SkipReason::EmptyWindow) => {
                    summary.skipped_empty_window += 1;
                    let reason = Error::EmptyWindow {
                        lot_id: e.lot_id,
                        timestamp: e.ts,
                    };
                    debug!(%reason, "arrival skipped");
                    Step::Iterating
                }
                Step::Skipping(e, SkipReason::UnavailableLot) => {
                    summary.skipped_unavailable_lot += 1;
                    debug!(lot_id = e.lot_id, timestamp = %e.ts, "arrival of unavailable lot skipped");
                    Step::Iterating
                }
                Step::Done => break,
            };
        }
        Ok(())
    }

    /// Features of all three horizons for arrival `e` of the context's lot.
    fn extract_row(&self, ctx: &mut LotContext, e: &Event) -> Result<FeatureRow> {
        let t = e.ts;
        let LotContext {
            history,
            density,
            reference,
            rng,
            ..
        } = ctx;
        let model = density.model_for(e.lot_id, history.causal_coords(t)).map_err(|err| err.at(t))?;
        let mut one = |spec: &HorizonSpec| {
            let window = history.term_window(t, spec);
            let flow = (
                history.arrivals_in(t, spec.duration),
                history.departures_in(t, spec.duration),
            );
            self.extractor
                .extract(&window, model, reference, flow, rng)
                .map_err(|err| err.at(t))
        };
        let horizons = [one(&self.specs[0])?, one(&self.specs[1])?, one(&self.specs[2])?];
        Ok(FeatureRow {
            lot_id: e.lot_id,
            timestamp: t,
            horizons,
        })
    }
}

/// Hunting mode needs a dwell time on every arrival; a missing one fails the run.
fn check_dwell<'a>(mut events: impl Iterator<Item = &'a Event>) -> Result<()> {
    match events.find(|e| e.dwell_seconds.is_none()) {
        Some(e) => Err(Error::MissingDwell {
            lot_id: e.lot_id,
            timestamp: e.ts,
        }),
        None => Ok(()),
    }
}
