pub mod frame;
pub mod dataset;
pub mod loader;

pub use frame::StationFrame;
pub use dataset::{chronological_split, feature_rows, Dataset};
pub use loader::BatchLoader;
