use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};

use crate::error::{FlowError, Result};
use crate::network::spec::NetworkSpec;
use crate::optim::OptimizerKind;
use crate::preprocess::cutter::BinStrategy;
use crate::report::plot::PlotConfig;

/// All knobs of a discharge experiment. Every field has a default, so `{}`
/// is a valid config file and reproduces the reference three-station run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Directory holding one `<station>.csv` per station.
    pub data_dir: PathBuf,
    /// Root under which `fig_res/`, `error_value/`, `pred_value/` and
    /// `models/` are created.
    pub out_dir: PathBuf,
    pub stations: Vec<String>,
    pub date_column: String,
    pub target_column: String,
    pub feature_columns: Vec<String>,

    pub bins: usize,
    /// Sentinel value marking a missing covariate reading.
    pub missing: f64,
    pub bin_strategy: BinStrategy,
    /// Fit bin edges on the training rows only instead of the whole file.
    pub fit_cutter_on_train_only: bool,

    pub train_fraction: f64,
    pub batch_size: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub optimizer: OptimizerKind,
    pub seed: u64,
    pub network: NetworkSpec,
    pub plot: PlotConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        let feature_columns: Vec<String> =
            ["prcp", "RH", "tmax", "tmin", "vp"].iter().map(|s| s.to_string()).collect();
        ExperimentConfig {
            data_dir: PathBuf::from("./datas"),
            out_dir: PathBuf::from("."),
            stations: ["61800400", "61801700", "67066000"].iter().map(|s| s.to_string()).collect(),
            date_column: "date".to_string(),
            target_column: "discharge".to_string(),
            network: NetworkSpec::default_discharge_mlp(feature_columns.len()),
            feature_columns,
            bins: 6,
            missing: 32700.0,
            bin_strategy: BinStrategy::Quantile,
            fit_cutter_on_train_only: false,
            train_fraction: 0.75,
            batch_size: 128,
            epochs: 200,
            learning_rate: 0.01,
            optimizer: OptimizerKind::Adam,
            seed: 991217,
            plot: PlotConfig::default(),
        }
    }
}

impl ExperimentConfig {
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(FlowError::Config(msg));

        if !(self.train_fraction > 0.0 && self.train_fraction < 1.0) {
            return fail(format!("train_fraction {} must lie in (0, 1)", self.train_fraction));
        }
        if self.bins == 0 {
            return fail("bins must be at least 1".into());
        }
        if self.batch_size == 0 {
            return fail("batch_size must be at least 1".into());
        }
        if self.epochs == 0 {
            return fail("epochs must be at least 1".into());
        }
        if !(self.learning_rate > 0.0) {
            return fail(format!("learning_rate {} must be positive", self.learning_rate));
        }
        if self.feature_columns.is_empty() {
            return fail("feature_columns is empty".into());
        }
        self.network.validate()?;
        if self.network.input_size() != self.feature_columns.len() {
            return fail(format!(
                "network takes {} inputs but {} feature columns are configured",
                self.network.input_size(),
                self.feature_columns.len()
            ));
        }
        if self.network.output_size() != 1 {
            return fail(format!("network must have one output, has {}", self.network.output_size()));
        }
        Ok(())
    }

    /// Serializes the config to a pretty-printed JSON file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path).map_err(|e| FlowError::io(path, e))?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Loads and validates a config file.
    pub fn load_json(path: &Path) -> Result<ExperimentConfig> {
        let file = std::fs::File::open(path).map_err(|e| FlowError::io(path, e))?;
        let reader = std::io::BufReader::new(file);
        let config: ExperimentConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }
}
