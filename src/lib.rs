pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod loss;
pub mod optim;
pub mod train;
pub mod data;
pub mod preprocess;
pub mod eval;
pub mod report;
pub mod checkpoint;
pub mod config;
pub mod pipeline;
pub mod error;
pub mod logging;

// Convenience re-exports
pub use math::matrix::Matrix;
pub use activation::activation::ActivationFunction;
pub use layers::dense::Layer;
pub use network::{Network, NetworkSpec, LayerSpec};
pub use loss::LossType;
pub use optim::{Adam, Optimizer, OptimizerKind, Sgd};
pub use train::{train_loop, TrainConfig, TrainReport};
pub use data::{BatchLoader, Dataset, StationFrame};
pub use preprocess::{BinStrategy, Cutter, TargetScaler};
pub use eval::ErrorMetrics;
pub use checkpoint::Checkpoint;
pub use config::ExperimentConfig;
pub use pipeline::{predict_file, run_all, run_station, OutputLayout, StationRun};
pub use error::{FlowError, Result};
