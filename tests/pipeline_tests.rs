//! End-to-end runs of the station pipeline on synthetic data.
//!
//! Uses tempfile so every test gets its own data and output directories.

use std::path::Path;

use chrono::{Duration, NaiveDate};
use flowcast::{predict_file, run_all, Checkpoint, ExperimentConfig, FlowError, StationFrame};
use tempfile::TempDir;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Writes `<dir>/<station>.csv` with `rows` daily records. Discharge responds
/// to precipitation and temperature; every 17th RH reading is the 32700
/// missing sentinel.
fn write_station(dir: &Path, station: &str, rows: usize) {
    let start = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
    let mut csv = String::from("date,discharge,prcp,RH,tmax,tmin,vp\n");
    for i in 0..rows {
        let t = i as f64;
        let prcp = ((t * 0.7).sin() * 5.0 + 5.0).max(0.0);
        let rh = if i % 17 == 0 { 32700.0 } else { 60.0 + (t * 0.3).cos() * 20.0 };
        let tmax = 20.0 + (t * 0.05).sin() * 10.0;
        let tmin = tmax - 8.0;
        let vp = 1.0 + (t * 0.11).sin() * 0.4;
        let discharge = 40.0 + 6.0 * prcp + 0.8 * tmax + 3.0 * (t * 0.9).sin();
        let date = start + Duration::days(i as i64);
        csv.push_str(&format!(
            "{},{discharge:.3},{prcp:.3},{rh:.3},{tmax:.3},{tmin:.3},{vp:.3}\n",
            date.format("%Y-%m-%d")
        ));
    }
    std::fs::write(dir.join(format!("{station}.csv")), csv).unwrap();
}

/// Replaces the discharge of the final row, which lands in the test split.
fn set_last_discharge(dir: &Path, station: &str, value: &str) {
    let path = dir.join(format!("{station}.csv"));
    let text = std::fs::read_to_string(&path).unwrap();
    let mut rows: Vec<String> = text.lines().map(str::to_string).collect();
    let last = rows.last_mut().unwrap();
    let mut cells: Vec<&str> = last.split(',').collect();
    cells[1] = value;
    *last = cells.join(",");
    std::fs::write(&path, rows.join("\n") + "\n").unwrap();
}

fn small_config(data: &TempDir, out: &TempDir, stations: &[&str]) -> ExperimentConfig {
    ExperimentConfig {
        data_dir: data.path().to_path_buf(),
        out_dir: out.path().to_path_buf(),
        stations: stations.iter().map(|s| s.to_string()).collect(),
        epochs: 15,
        batch_size: 32,
        plot: flowcast::report::PlotConfig { width: 320, height: 160, major_tick: 100, minor_tick: 20 },
        ..Default::default()
    }
}

fn lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

// =============================================================================
// TRAIN PIPELINE
// =============================================================================

#[test]
fn run_all_writes_every_artefact() {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_station(data.path(), "61800400", 200);

    let runs = run_all(&small_config(&data, &out, &["61800400"])).unwrap();
    assert_eq!(runs.len(), 1);
    let run = &runs[0];
    assert_eq!(run.train_rows, 150);
    assert_eq!(run.test_rows, 50);
    assert!(run.best_epoch >= 1 && run.best_epoch <= 15);
    assert!(run.metrics.rmse.is_finite());

    let root = out.path();
    assert!(root.join("fig_res/bp_61800400.png").exists());
    assert!(root.join("models/bp_61800400.json").exists());

    let metrics = lines(&root.join("error_value/bp_61800400.csv"));
    assert_eq!(metrics[0], "MAE,MSE,RMSE,MAPE,R2,NSE,KGE");
    assert_eq!(metrics.len(), 2);

    let truth = lines(&root.join("pred_value/61800400_gt.csv"));
    let forecast = lines(&root.join("pred_value/61800400_bp.csv"));
    assert_eq!(truth[0], "date,discharge");
    assert_eq!(truth.len(), 51);
    assert_eq!(forecast.len(), 51);
    // Test rows start right after the 150 training days.
    assert!(truth[1].starts_with("2000-05-30,"));
    assert_eq!(truth[1].split(',').next(), forecast[1].split(',').next());

    let summary = lines(&root.join("error_value/summary.csv"));
    assert_eq!(summary.len(), 2);
    assert!(summary[1].starts_with("61800400,"));
}

#[test]
fn checkpoint_holds_the_best_epoch() {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_station(data.path(), "s", 120);

    let run = run_all(&small_config(&data, &out, &["s"])).unwrap().remove(0);
    let ckpt = Checkpoint::load_json(&run.checkpoint).unwrap();
    assert_eq!(ckpt.epoch, run.best_epoch);
    assert_eq!(ckpt.test_loss, run.best_test_loss);
    assert_eq!(ckpt.cutter.n_bins("prcp"), Some(6));
    // Sentinel readings get the code after the last real bin.
    assert!(ckpt.cutter.is_missing(32700.0));
}

#[test]
fn same_seed_gives_identical_forecasts() {
    let data = tempfile::tempdir().unwrap();
    write_station(data.path(), "s", 120);
    let out_a = tempfile::tempdir().unwrap();
    let out_b = tempfile::tempdir().unwrap();

    run_all(&small_config(&data, &out_a, &["s"])).unwrap();
    run_all(&small_config(&data, &out_b, &["s"])).unwrap();

    let a = std::fs::read_to_string(out_a.path().join("pred_value/s_bp.csv")).unwrap();
    let b = std::fs::read_to_string(out_b.path().join("pred_value/s_bp.csv")).unwrap();
    assert_eq!(a, b);
}

#[test]
fn failing_station_does_not_stop_the_others() {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_station(data.path(), "good", 100);

    let runs = run_all(&small_config(&data, &out, &["missing", "good"])).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].station, "good");
}

#[test]
fn all_stations_failing_is_an_error() {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let err = run_all(&small_config(&data, &out, &["nope"])).unwrap_err();
    assert!(matches!(err, FlowError::Io { .. }));
}

#[test]
fn unbounded_test_loss_fails_instead_of_reusing_old_checkpoint() {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_station(data.path(), "s", 120);
    let config = ExperimentConfig { seed: 5, ..small_config(&data, &out, &["s"]) };
    let first = run_all(&config).unwrap().remove(0);
    assert!(first.checkpoint.exists());

    // One huge test observation makes every epoch's test loss overflow.
    set_last_discharge(data.path(), "s", "1e300");
    let err = run_all(&config).unwrap_err();
    assert!(matches!(err, FlowError::NoFiniteLoss { epochs: 15 }));
    assert!(!first.checkpoint.exists());

    let fresh = tempfile::tempdir().unwrap();
    let err = run_all(&ExperimentConfig { seed: 5, ..small_config(&data, &fresh, &["s"]) }).unwrap_err();
    assert!(matches!(err, FlowError::NoFiniteLoss { .. }));
}

#[test]
fn train_only_cutter_clamps_unseen_test_values() {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    // tmax climbs steadily, so the test rows lie above every training value.
    let start = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
    let mut csv = String::from("date,discharge,prcp,RH,tmax,tmin,vp\n");
    for i in 0..120 {
        let t = i as f64;
        let prcp = (t * 0.7).sin() * 5.0 + 5.0;
        let tmax = t * 0.25;
        let date = start + Duration::days(i);
        csv.push_str(&format!(
            "{},{:.3},{prcp:.3},{:.3},{tmax:.3},{:.3},{:.3}\n",
            date.format("%Y-%m-%d"),
            30.0 + 4.0 * prcp + tmax,
            60.0 + (t * 0.3).cos() * 20.0,
            tmax - 8.0,
            1.0 + (t * 0.11).sin() * 0.4,
        ));
    }
    std::fs::write(data.path().join("s.csv"), csv).unwrap();

    let config = ExperimentConfig { fit_cutter_on_train_only: true, ..small_config(&data, &out, &["s"]) };
    let run = run_all(&config).unwrap().remove(0);
    assert_eq!(run.train_rows, 90);
    assert!(run.metrics.rmse.is_finite());

    let ckpt = Checkpoint::load_json(&run.checkpoint).unwrap();
    let edges = ckpt.cutter.edges("tmax").unwrap();
    // Training rows end at tmax = 89 * 0.25.
    assert_eq!(*edges.last().unwrap(), 22.25);

    let mut frame = StationFrame::from_csv_path(&data.path().join("s.csv")).unwrap();
    ckpt.cutter.transform(&mut frame).unwrap();
    let top = (ckpt.cutter.n_bins("tmax").unwrap() - 1) as f64;
    assert!(frame.column("tmax").unwrap()[90..].iter().all(|c| *c == top));
}

#[test]
fn missing_covariate_column_is_reported() {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    std::fs::write(
        data.path().join("s.csv"),
        "date,discharge,prcp\n2000-01-01,1,0\n2000-01-02,2,1\n2000-01-03,3,2\n2000-01-04,4,3\n",
    )
    .unwrap();
    let err = run_all(&small_config(&data, &out, &["s"])).unwrap_err();
    assert!(matches!(err, FlowError::MissingColumn(ref c) if c == "RH"));
}

// =============================================================================
// PREDICT COMMAND
// =============================================================================

#[test]
fn predict_file_reuses_the_checkpoint() {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_station(data.path(), "s", 120);
    let run = run_all(&small_config(&data, &out, &["s"])).unwrap().remove(0);

    let output = out.path().join("again.csv");
    let metrics = predict_file(&run.checkpoint, &data.path().join("s.csv"), &output)
        .unwrap()
        .expect("target column present");
    assert!(metrics.mae.is_finite());

    let rows = lines(&output);
    assert_eq!(rows.len(), 121);

    // The tail of a full-file prediction matches the pipeline's test forecast.
    let forecast = lines(&out.path().join("pred_value/s_bp.csv"));
    assert_eq!(rows[rows.len() - 1], forecast[forecast.len() - 1]);
}
