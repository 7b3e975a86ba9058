pub mod sgd;
pub mod adam;

pub use sgd::Sgd;
pub use adam::Adam;

use serde::{Serialize, Deserialize};

use crate::{math::matrix::Matrix, layers::dense::Layer};

/// Applies one parameter update to a layer from its averaged gradients.
///
/// `layer_index` lets stateful optimizers keep per-layer moments.
pub trait Optimizer {
    fn step(&mut self, layer_index: usize, layer: &mut Layer, weights_grad: Matrix, biases_grad: Matrix);
}

/// Serializable optimizer choice for the experiment config.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    Sgd,
    #[default]
    Adam,
}

impl OptimizerKind {
    pub fn build(self, learning_rate: f64) -> Box<dyn Optimizer> {
        match self {
            OptimizerKind::Sgd => Box::new(Sgd::new(learning_rate)),
            OptimizerKind::Adam => Box::new(Adam::new(learning_rate)),
        }
    }
}
