pub mod csv_out;
pub mod plot;

pub use plot::{PlotConfig, PredictionPlot};
