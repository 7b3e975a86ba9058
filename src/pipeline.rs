//! Per-station experiment driver: load, bin, split, train, reload the best
//! checkpoint, then write the plot, the metrics and the prediction files.

use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, error, info, warn};

use crate::checkpoint::Checkpoint;
use crate::config::ExperimentConfig;
use crate::data::dataset::{chronological_split, feature_rows, Dataset};
use crate::data::frame::StationFrame;
use crate::error::{FlowError, Result};
use crate::eval::metrics::ErrorMetrics;
use crate::preprocess::cutter::Cutter;
use crate::preprocess::scaler::TargetScaler;
use crate::report::csv_out::{write_metrics, write_series, write_summary};
use crate::report::plot::{plot_predictions, PredictionPlot};
use crate::train::{predict, train_loop, TrainConfig};

// ---------------------------------------------------------------------------
// Output layout
// ---------------------------------------------------------------------------

/// Where a run writes its artefacts, relative to one root directory.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    pub figures: PathBuf,
    pub errors: PathBuf,
    pub predictions: PathBuf,
    pub models: PathBuf,
}

impl OutputLayout {
    pub fn new(root: &Path) -> OutputLayout {
        OutputLayout {
            figures: root.join("fig_res"),
            errors: root.join("error_value"),
            predictions: root.join("pred_value"),
            models: root.join("models"),
        }
    }

    pub fn create_dirs(&self) -> Result<()> {
        for dir in [&self.figures, &self.errors, &self.predictions, &self.models] {
            std::fs::create_dir_all(dir).map_err(|e| FlowError::io(dir, e))?;
        }
        Ok(())
    }

    pub fn plot_path(&self, model: &str, station: &str) -> PathBuf {
        self.figures.join(format!("{model}_{station}.png"))
    }

    pub fn metrics_path(&self, model: &str, station: &str) -> PathBuf {
        self.errors.join(format!("{model}_{station}.csv"))
    }

    pub fn truth_path(&self, station: &str) -> PathBuf {
        self.predictions.join(format!("{station}_gt.csv"))
    }

    pub fn forecast_path(&self, model: &str, station: &str) -> PathBuf {
        self.predictions.join(format!("{station}_{model}.csv"))
    }

    pub fn checkpoint_path(&self, model: &str, station: &str) -> PathBuf {
        self.models.join(format!("{model}_{station}.json"))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.errors.join("summary.csv")
    }
}

// ---------------------------------------------------------------------------
// Station runs
// ---------------------------------------------------------------------------

/// Result of a completed station run.
#[derive(Debug, Clone)]
pub struct StationRun {
    pub station: String,
    pub train_rows: usize,
    pub test_rows: usize,
    pub best_epoch: usize,
    pub best_test_loss: f64,
    /// Metrics of the de-standardised test forecast.
    pub metrics: ErrorMetrics,
    pub checkpoint: PathBuf,
}

/// Trains and evaluates one station, drawing all randomness from `rng`.
pub fn run_station(
    config: &ExperimentConfig,
    station: &str,
    layout: &OutputLayout,
    rng: &mut StdRng,
) -> Result<StationRun> {
    let model = config.network.name.as_str();
    let data_path = config.data_dir.join(format!("{station}.csv"));
    let mut frame = StationFrame::from_csv_path(&data_path)?;
    frame.station = station.to_string();
    info!(station, rows = frame.len(), path = %data_path.display(), "loaded station data");

    let bad_dates = frame.check_chronological(&config.date_column)?;
    if bad_dates > 0 {
        warn!(station, bad_dates, "dates are not strictly increasing; the split follows file order");
    }
    let dates = frame.dates(&config.date_column)?;
    let observed = frame.column(&config.target_column)?.to_vec();
    if let Some(row) = observed.iter().position(|v| v.is_nan()) {
        return Err(FlowError::MissingTarget { column: config.target_column.clone(), row });
    }

    let train_len = chronological_split(frame.len(), config.train_fraction)?;

    let mut cutter = Cutter::new(config.feature_columns.clone(), config.bins, config.missing)
        .with_strategy(config.bin_strategy);
    if config.fit_cutter_on_train_only {
        cutter.fit(&frame.slice(0..train_len))?;
    } else {
        cutter.fit(&frame)?;
    }
    cutter.transform(&mut frame)?;

    let train_frame = frame.slice(0..train_len);
    let test_frame = frame.slice(train_len..frame.len());

    // Target statistics come from the training rows only.
    let scaler = TargetScaler::fit(&observed[..train_len])?;
    debug!(station, mean = scaler.mean, std = scaler.std, "target scaler");

    let train = Dataset::from_frame(&train_frame, &config.feature_columns, &config.target_column, &scaler)?;
    let test = Dataset::from_frame(&test_frame, &config.feature_columns, &config.target_column, &scaler)?;

    let mut network = config.network.build(rng)?;
    let mut optimizer = config.optimizer.build(config.learning_rate);
    let train_config = TrainConfig::new(config.epochs, config.batch_size, config.network.loss);
    let checkpoint_path = layout.checkpoint_path(model, station);
    remove_stale(&checkpoint_path)?;

    let report = train_loop(
        &mut network,
        &train,
        &test,
        optimizer.as_mut(),
        &train_config,
        rng,
        |net, stats| {
            Checkpoint {
                station: station.to_string(),
                feature_columns: config.feature_columns.clone(),
                target_column: config.target_column.clone(),
                date_column: config.date_column.clone(),
                cutter: cutter.clone(),
                scaler,
                network: net.clone(),
                epoch: stats.epoch,
                test_loss: stats.test_loss,
            }
            .save_json(&checkpoint_path)?;
            debug!(station, epoch = stats.epoch, test_loss = stats.test_loss, "checkpoint written");
            Ok(())
        },
    )?;
    if report.best_epoch == 0 {
        return Err(FlowError::NoFiniteLoss { epochs: config.epochs });
    }
    info!(
        station,
        best_epoch = report.best_epoch,
        best_test_loss = report.best_test_loss,
        "training finished"
    );

    // Predict with the best weights, not the last ones.
    let mut best = Checkpoint::load_json(&checkpoint_path)?;
    let train_pred = best.scaler.inverse_all(&predict(&mut best.network, &train.inputs));
    let test_pred = best.scaler.inverse_all(&predict(&mut best.network, &test.inputs));

    plot_predictions(
        &layout.plot_path(model, station),
        &PredictionPlot { observed: &observed, train_fit: &train_pred, test_forecast: &test_pred },
        &config.plot,
    )?;

    let test_observed = &observed[train_len..];
    let test_dates = &dates[train_len..];
    let metrics = ErrorMetrics::compute(&test_pred, test_observed)?;
    write_metrics(&layout.metrics_path(model, station), &metrics)?;
    write_series(&layout.truth_path(station), test_dates, test_observed)?;
    write_series(&layout.forecast_path(model, station), test_dates, &test_pred)?;

    info!(
        station,
        mae = metrics.mae,
        rmse = metrics.rmse,
        nse = metrics.nse,
        kge = metrics.kge,
        "test forecast scored"
    );

    Ok(StationRun {
        station: station.to_string(),
        train_rows: train.len(),
        test_rows: test.len(),
        best_epoch: report.best_epoch,
        best_test_loss: report.best_test_loss,
        metrics,
        checkpoint: checkpoint_path,
    })
}

/// A checkpoint left by an earlier run must not stand in for this one.
fn remove_stale(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "removed previous checkpoint");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(FlowError::io(path, e)),
    }
}

/// Runs every configured station in order with one seeded RNG.
///
/// A failing station is logged and skipped. The call fails only when no
/// station succeeds; the first error is returned in that case.
pub fn run_all(config: &ExperimentConfig) -> Result<Vec<StationRun>> {
    config.validate()?;
    if config.stations.is_empty() {
        return Err(FlowError::Config("no stations configured".into()));
    }

    let layout = OutputLayout::new(&config.out_dir);
    layout.create_dirs()?;
    let mut rng = StdRng::seed_from_u64(config.seed);

    let mut runs = Vec::new();
    let mut first_error = None;
    for station in &config.stations {
        match run_station(config, station, &layout, &mut rng) {
            Ok(run) => runs.push(run),
            Err(e) => {
                error!(station = %station, error = %e, "station failed");
                first_error.get_or_insert(e);
            }
        }
    }

    if runs.is_empty() {
        if let Some(e) = first_error {
            return Err(e);
        }
    }

    let summary: Vec<(String, ErrorMetrics)> =
        runs.iter().map(|r| (r.station.clone(), r.metrics)).collect();
    write_summary(&layout.summary_path(), &summary)?;
    info!(succeeded = runs.len(), total = config.stations.len(), "run complete");

    Ok(runs)
}

// ---------------------------------------------------------------------------
// Inference
// ---------------------------------------------------------------------------

/// Applies a saved checkpoint to a new station CSV and writes
/// `date,discharge` predictions to `output`.
///
/// When the file also carries the target column, the forecast is scored on
/// the rows with an observation and the metrics are returned.
pub fn predict_file(checkpoint: &Path, input: &Path, output: &Path) -> Result<Option<ErrorMetrics>> {
    let mut ckpt = Checkpoint::load_json(checkpoint)?;
    let mut frame = StationFrame::from_csv_path(input)?;
    info!(station = %ckpt.station, rows = frame.len(), epoch = ckpt.epoch, "applying checkpoint");

    ckpt.cutter.transform(&mut frame)?;
    let inputs = feature_rows(&frame, &ckpt.feature_columns)?;
    let predicted = ckpt.scaler.inverse_all(&predict(&mut ckpt.network, &inputs));

    let dates = if frame.has_column(&ckpt.date_column) {
        frame.dates(&ckpt.date_column)?
    } else {
        (0..frame.len()).map(|i| i.to_string()).collect()
    };
    write_series(output, &dates, &predicted)?;

    if !frame.has_column(&ckpt.target_column) {
        return Ok(None);
    }
    let (pred, obs): (Vec<f64>, Vec<f64>) = predicted
        .iter()
        .zip(frame.column(&ckpt.target_column)?)
        .filter(|(_, o)| o.is_finite())
        .map(|(p, o)| (*p, *o))
        .unzip();
    if pred.is_empty() {
        return Ok(None);
    }
    Ok(Some(ErrorMetrics::compute(&pred, &obs)?))
}
