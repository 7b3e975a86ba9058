use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use flowcast::{logging, predict_file, run_all, ExperimentConfig, Result};

/// Train and apply per-station river discharge regressors.
#[derive(Debug, Parser)]
#[command(name = "flowcast", version, about)]
struct Cli {
    /// JSON experiment config; built-in defaults are used when omitted.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Default log filter (overridden by RUST_LOG).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Train, evaluate and report every configured station.
    Train {
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Station id to run; repeat for several. Replaces the configured list.
        #[arg(long = "station", value_name = "ID")]
        stations: Vec<String>,
        #[arg(long)]
        epochs: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Apply a saved checkpoint to a station CSV.
    Predict {
        #[arg(long)]
        checkpoint: PathBuf,
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Write the default experiment config as JSON.
    InitConfig {
        #[arg(long, default_value = "flowcast.json")]
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<ExperimentConfig> {
    match path {
        Some(p) => ExperimentConfig::load_json(p),
        None => Ok(ExperimentConfig::default()),
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Train { data_dir, out_dir, stations, epochs, seed } => {
            let mut config = load_config(cli.config.as_ref())?;
            if let Some(dir) = data_dir {
                config.data_dir = dir;
            }
            if let Some(dir) = out_dir {
                config.out_dir = dir;
            }
            if !stations.is_empty() {
                config.stations = stations;
            }
            if let Some(n) = epochs {
                config.epochs = n;
            }
            if let Some(s) = seed {
                config.seed = s;
            }

            let runs = run_all(&config)?;
            for r in &runs {
                info!(
                    station = %r.station,
                    best_epoch = r.best_epoch,
                    rmse = r.metrics.rmse,
                    nse = r.metrics.nse,
                    "station done"
                );
            }
            Ok(())
        }
        Command::Predict { checkpoint, input, output } => {
            if let Some(metrics) = predict_file(&checkpoint, &input, &output)? {
                info!(mae = metrics.mae, rmse = metrics.rmse, nse = metrics.nse, "forecast scored");
            }
            info!(path = %output.display(), "predictions written");
            Ok(())
        }
        Command::InitConfig { output } => {
            load_config(cli.config.as_ref())?.save_json(&output)?;
            info!(path = %output.display(), "config written");
            Ok(())
        }
    }
}
