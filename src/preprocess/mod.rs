pub mod cutter;
pub mod scaler;

pub use cutter::{BinStrategy, Cutter};
pub use scaler::TargetScaler;
