use std::path::Path;

use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::error::{FlowError, Result};
use crate::layers::dense::Layer;
use crate::math::matrix::Matrix;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub layers: Vec<Layer>,
}

impl Network {
    pub fn new(layers: Vec<Layer>) -> Network {
        Network { layers }
    }

    pub fn input_size(&self) -> usize {
        self.layers.first().map_or(0, |l| l.input_size())
    }

    pub fn output_size(&self) -> usize {
        self.layers.last().map_or(0, |l| l.size)
    }

    /// Evaluation-mode forward pass (dropout disabled).
    pub fn forward(&mut self, input: Vec<f64>) -> Vec<f64> {
        let mut current = input;
        for layer in &mut self.layers {
            current = layer.feed_from(current);
        }
        current
    }

    /// Training-mode forward pass; stores activations and dropout masks in
    /// each layer for `backward`.
    pub fn forward_train<R: Rng + ?Sized>(&mut self, input: Vec<f64>, rng: &mut R) -> Vec<f64> {
        let mut current = input;
        for layer in &mut self.layers {
            current = layer.feed_from_train(current, rng);
        }
        current
    }

    /// Backpropagates `output_grad` (∂L/∂output) through the activations
    /// recorded by the last forward pass. Returns one (weights_grad,
    /// biases_grad) pair per layer, in layer order.
    pub fn backward(&self, input: &[f64], output_grad: Vec<f64>) -> Vec<(Matrix, Matrix)> {
        let mut grads = vec![(Matrix::default(), Matrix::default()); self.layers.len()];
        let mut delta = Matrix::row(output_grad);

        for i in (0..self.layers.len()).rev() {
            let input_for_layer = if i == 0 {
                Matrix::row(input.to_vec())
            } else {
                self.layers[i - 1].neurons.clone()
            };

            let (w_grad, b_grad) = self.layers[i].compute_gradients(delta, &input_for_layer);

            // Propagate δ_i through weights to get ∂L/∂a_{i-1}
            delta = b_grad.clone() * self.layers[i].weights.transpose();

            grads[i] = (w_grad, b_grad);
        }

        grads
    }

    /// Serializes the network weights to a pretty-printed JSON file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path).map_err(|e| FlowError::io(path, e))?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a network from a JSON file previously written by `save_json`.
    pub fn load_json(path: &Path) -> Result<Network> {
        let file = std::fs::File::open(path).map_err(|e| FlowError::io(path, e))?;
        let reader = std::io::BufReader::new(file);
        let mut network: Network = serde_json::from_reader(reader)?;
        network.reset_buffers();
        Ok(network)
    }

    /// Re-creates the transient per-layer buffers skipped by serde.
    pub(crate) fn reset_buffers(&mut self) {
        for layer in &mut self.layers {
            layer.neurons = Matrix::zeros(1, layer.size);
        }
    }
}
