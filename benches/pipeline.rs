//! Pipeline benchmark: dataset → feature table (sequential and lot-sharded).

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lot_features::config::PipelineConfig;
use lot_features::pipeline::PipelineDriver;
use lot_features::records::{Coord, Dataset, Event};

fn make_dataset(lots: i64, per_lot: usize) -> Dataset {
    let t0 = Utc.with_ymd_and_hms(2023, 1, 17, 0, 0, 0).unwrap();
    let mut destinations = Vec::new();
    let mut origins = Vec::new();
    for lot in 0..lots {
        for k in 0..per_lot {
            let ts = t0 + Duration::minutes(13 * k as i64 + lot);
            let c = Coord::new(
                -83.74 + lot as f64 * 0.01 + (k % 7) as f64 * 0.0001,
                42.28 + (k % 5) as f64 * 0.0001,
            );
            destinations.push(Event::new(lot, ts, c).with_dwell(60.0 + (k % 11) as f64 * 15.0));
            if k % 2 == 0 {
                origins.push(Event::new(lot, ts + Duration::minutes(40), c));
            }
        }
    }
    Dataset::new(destinations, origins)
}

fn config(parallel: bool) -> PipelineConfig {
    let mut c = PipelineConfig::default();
    c.features.grid_resolution = 50;
    c.run.parallel = parallel;
    c.run.progress_every = 0;
    c
}

fn bench_sequential(c: &mut Criterion) {
    let ds = make_dataset(4, 100);
    let driver = PipelineDriver::new(&config(false));

    c.bench_function("pipeline_4_lots_x_100_sequential", |b| {
        b.iter(|| black_box(driver.run(black_box(&ds))).unwrap())
    });
}

fn bench_sharded(c: &mut Criterion) {
    let ds = make_dataset(4, 100);
    let driver = PipelineDriver::new(&config(true));

    c.bench_function("pipeline_4_lots_x_100_sharded", |b| {
        b.iter(|| black_box(driver.run(black_box(&ds))).unwrap())
    });
}

criterion_group!(benches, bench_sequential, bench_sharded);
criterion_main!(benches);
