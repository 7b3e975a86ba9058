use serde::{Serialize, Deserialize};

/// Selects which regression loss the training loop uses.
///
/// - `Mse`  : Mean-squared error.
/// - `Mae`  : Mean absolute error.
/// - `Huber`: Huber loss (δ=1.0); quadratic near zero, linear in the tails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossType {
    #[default]
    Mse,
    Mae,
    Huber,
}
