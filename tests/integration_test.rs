//! Integration test: config load, CSV ingestion, full run, CSV/SQLite output.

use chrono::{DateTime, Duration, TimeZone, Utc};
use lot_features::{
    config::{InputConfig, OutputConfig, OutputFormat, PipelineConfig},
    output::SqliteSink,
    pipeline::PipelineDriver,
    records::{load_dataset, Coord, Event},
    Error,
};
use std::fmt::Write as _;
use std::path::Path;

const LOTS: [i64; 3] = [101, 102, 103];

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, 17, 8, 0, 0).unwrap()
}

fn fmt(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// 20 arrivals spread over three lots and two days; dwell of arrival k is 60 + 10k seconds.
fn destinations() -> Vec<(i64, DateTime<Utc>, Coord, i64)> {
    (0..20usize)
        .map(|k| {
            let lot = LOTS[k % 3];
            let ts = t0() + Duration::minutes(144 * k as i64);
            let c = Coord::new(
                -83.743 + (lot - 101) as f64 * 0.01 + (k % 4) as f64 * 0.0001,
                42.280 + ((k / 3) % 3) as f64 * 0.0001,
            );
            (lot, ts, c, 60 + 10 * k as i64)
        })
        .collect()
}

/// 10 departures from lot 101, the first 20 minutes before the first arrival.
fn origins() -> Vec<DateTime<Utc>> {
    (0..10).map(|j| t0() - Duration::minutes(20) + Duration::minutes(288 * j)).collect()
}

fn write_inputs(dir: &Path) -> InputConfig {
    let mut dest = String::from("pk_lot,entry_time,stop_time,end_lon,end_lat\n");
    for (lot, ts, c, dwell) in destinations() {
        writeln!(dest, "{lot},{},{},{},{}", fmt(ts - Duration::seconds(dwell)), fmt(ts), c.lon, c.lat).unwrap();
    }
    let mut orig = String::from("pk_lot,start_time,start_lon,start_lat\n");
    for ts in origins() {
        writeln!(orig, "101,{},-83.7430,42.2800", fmt(ts)).unwrap();
    }
    std::fs::write(dir.join("destinations.csv"), dest).unwrap();
    std::fs::write(dir.join("origins.csv"), orig).unwrap();
    InputConfig {
        destinations: dir.join("destinations.csv"),
        origins: dir.join("origins.csv"),
        ..InputConfig::default()
    }
}

fn config(dir: &Path, format: OutputFormat, file: &str) -> PipelineConfig {
    let mut c = PipelineConfig::default();
    c.input = write_inputs(dir);
    c.run.progress_every = 0;
    c.output = OutputConfig {
        path: dir.join("results").join(file),
        format,
    };
    c
}

#[test]
fn config_load_default() {
    let c = PipelineConfig::load(Path::new("nonexistent.json")).unwrap();
    assert_eq!(c.features.num_hotspots, 3);
    assert_eq!(c.features.wasserstein_sample_size, 100);
    assert!(c.features.hunting_mode);
    assert_eq!(c.horizons.long.max_records, 50);
    assert_eq!(c.output.format, OutputFormat::Csv);
}

#[test]
fn config_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{"features": {"lot_ids": [101], "random_seed": 7}, "output": {"path": "out.db", "format": "sqlite"}}"#,
    )
    .unwrap();
    let c = PipelineConfig::load(&path).unwrap();
    assert_eq!(c.features.lot_ids, vec![101]);
    assert_eq!(c.features.random_seed, 7);
    assert_eq!(c.output.format, OutputFormat::Sqlite);
    assert_eq!(c.features.grid_resolution, 100);
}

#[test]
fn config_with_wrong_types_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"features": {"lot_ids": "101"}}"#).unwrap();
    assert!(matches!(PipelineConfig::load(&path), Err(Error::Config { .. })));
}

#[test]
fn end_to_end_csv() {
    let dir = tempfile::tempdir().unwrap();
    let c = config(dir.path(), OutputFormat::Csv, "training_data.csv");
    let ds = load_dataset(&c.input, &c.features.lot_ids, c.features.hunting_mode).unwrap();
    assert_eq!(ds.destinations.len(), 20);
    assert_eq!(ds.origins.len(), 10);

    let (table, summary) = PipelineDriver::new(&c).run(&ds).unwrap();
    assert_eq!(summary.events_seen, 20);
    assert_eq!(summary.rows_emitted, 20);
    assert!(summary.failed_lots.is_empty());
    table.flush(&c.output).unwrap();

    let mut rdr = csv::Reader::from_path(&c.output.path).unwrap();
    let headers: Vec<String> = rdr.headers().unwrap().iter().map(str::to_string).collect();
    assert_eq!(headers.len(), 17);
    assert_eq!(headers[0], "short_hotspot");
    assert_eq!(headers[3], "short_hunting_time");
    assert_eq!(headers[16], "timestamp");
    let col = |name: &str| headers.iter().position(|h| h == name).unwrap();

    let records: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 20);
    let stamps: Vec<DateTime<Utc>> = records
        .iter()
        .map(|r| r[col("timestamp")].parse::<DateTime<Utc>>().unwrap())
        .collect();
    assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(stamps[0], t0());

    // first arrival: one arrival and one departure in the trailing hour
    let first = &records[0];
    let departures = origins()
        .iter()
        .filter(|ts| **ts > t0() - Duration::hours(1) && **ts <= t0())
        .count();
    let ratio: f64 = first[col("short_in_out_ratio")].parse().unwrap();
    assert_eq!(ratio, 1.0 / departures.max(1) as f64);
    assert_eq!(&first[col("lot_id")], "101");

    // short window is the arrival itself
    for (k, r) in records.iter().enumerate() {
        let dwell: f64 = r[col("short_hunting_time")].parse().unwrap();
        assert_eq!(dwell, (60 + 10 * k) as f64);
        for name in ["short_hotspot", "medium_wasserstein", "long_log_prob"] {
            let v: f64 = r[col(name)].parse().unwrap();
            assert!(v.is_finite(), "{name} row {k}");
        }
    }
}

#[test]
fn end_to_end_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let c = config(dir.path(), OutputFormat::Sqlite, "training_data.db");
    let ds = load_dataset(&c.input, &[], true).unwrap();
    let (table, _) = PipelineDriver::new(&c).run(&ds).unwrap();
    table.flush(&c.output).unwrap();

    let sink = SqliteSink::open(&c.output.path).unwrap();
    assert_eq!(sink.row_count().unwrap(), 20);
    let dwell = sink.column("short_hunting_time").unwrap();
    assert_eq!(dwell[0], 60.0);
    assert_eq!(dwell[19], 250.0);
}

#[test]
fn lot_filter_limits_rows() {
    let dir = tempfile::tempdir().unwrap();
    let mut c = config(dir.path(), OutputFormat::Csv, "training_data.csv");
    c.features.lot_ids = vec![102];
    let ds = load_dataset(&c.input, &c.features.lot_ids, true).unwrap();
    assert!(ds.origins.is_empty());
    let (table, summary) = PipelineDriver::new(&c).run(&ds).unwrap();
    assert_eq!(table.len(), 7);
    assert!(table.rows().iter().all(|r| r.lot_id == 102));
    assert_eq!(summary.rows_emitted, 7);
}

#[test]
fn windows_and_flow_are_causal() {
    let dir = tempfile::tempdir().unwrap();
    let c = config(dir.path(), OutputFormat::Csv, "training_data.csv");
    let mut ds = load_dataset(&c.input, &[], true).unwrap();
    let before = PipelineDriver::new(&c).run(&ds).unwrap().0;

    // future arrivals and departures at lot 101
    let later = t0() + Duration::days(5);
    for i in 0..5 {
        let ts = later + Duration::minutes(i);
        ds.destinations
            .push(Event::new(101, ts, Coord::new(-83.7431 + i as f64 * 1e-4, 42.2801)).with_dwell(30.0));
        ds.origins.push(Event::new(101, ts, Coord::new(-83.7430, 42.2800)));
    }
    let after = PipelineDriver::new(&c).run(&ds).unwrap().0;
    assert_eq!(after.len(), before.len() + 5);

    for (a, b) in before.rows().iter().zip(after.rows()) {
        assert_eq!((a.lot_id, a.timestamp), (b.lot_id, b.timestamp));
        for (ha, hb) in a.horizons.iter().zip(&b.horizons) {
            assert_eq!(ha.in_out_ratio, hb.in_out_ratio);
            assert_eq!(ha.hunting_time, hb.hunting_time);
        }
    }
}

#[test]
fn malformed_timestamp_names_the_line() {
    let dir = tempfile::tempdir().unwrap();
    let c = config(dir.path(), OutputFormat::Csv, "training_data.csv");
    std::fs::write(
        &c.input.destinations,
        "pk_lot,entry_time,stop_time,end_lon,end_lat\n\
         101,2023-01-17 07:58:00,2023-01-17 08:00:00,-83.7430,42.2808\n\
         101,2023-01-17 08:00:00,yesterday,-83.7430,42.2808\n",
    )
    .unwrap();
    match load_dataset(&c.input, &[], true) {
        Err(Error::MalformedRecord { line, .. }) => assert_eq!(line, 3),
        other => panic!("expected malformed record, got {other:?}"),
    }
}

#[test]
fn polygon_join_assigns_lots() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("lots.csv"),
        "pk_lot,geometry\n\
         7,\"POLYGON ((0 0, 1 0, 1 1, 0 1, 0 0))\"\n\
         8,\"POLYGON ((2 0, 3 0, 3 1, 2 1, 2 0))\"\n",
    )
    .unwrap();
    let mut dest = String::from("entry_time,stop_time,end_lon,end_lat\n");
    for (i, (lon, lat)) in [(0.2, 0.3), (0.7, 0.6), (2.5, 0.5), (2.2, 0.1), (5.0, 5.0)].iter().enumerate() {
        let ts = t0() + Duration::minutes(10 * i as i64);
        writeln!(dest, "{},{},{lon},{lat}", fmt(ts - Duration::minutes(2)), fmt(ts)).unwrap();
    }
    std::fs::write(dir.path().join("destinations.csv"), dest).unwrap();
    std::fs::write(dir.path().join("origins.csv"), "start_time,start_lon,start_lat\n").unwrap();
    let input = InputConfig {
        destinations: dir.path().join("destinations.csv"),
        origins: dir.path().join("origins.csv"),
        lots: Some(dir.path().join("lots.csv")),
        ..InputConfig::default()
    };
    let ds = load_dataset(&input, &[], true).unwrap();
    // last point lies in no lot
    assert_eq!(ds.destinations.len(), 4);
    assert_eq!(ds.lot_ids(), vec![7, 8]);
    assert!(ds.destinations.iter().all(|e| e.dwell_seconds == Some(120.0)));
}
