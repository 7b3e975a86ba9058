use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::{math::matrix::Matrix, activation::activation::ActivationFunction};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer{
    pub size: usize,
    pub weights: Matrix,
    pub biases: Matrix,
    pub activator: ActivationFunction,
    /// Probability of zeroing each output during training (inverted dropout).
    #[serde(default)]
    pub dropout: f64,
    /// Output of the last forward pass, after dropout.
    #[serde(skip)]
    pub neurons: Matrix,
    #[serde(skip)]
    pre_neurons: Matrix,  // pre-activation values (z = Wx + b) needed for correct derivative
    #[serde(skip)]
    mask: Option<Matrix>, // per-output keep scale (0 or 1/(1-p)) from the last training pass
}

impl Layer {
    pub fn new(size: usize, weights: Matrix, biases: Matrix, activation: ActivationFunction, dropout: f64) -> Layer {
        assert_eq!(weights.cols, size, "weights must have `size` columns");
        assert_eq!((biases.rows, biases.cols), (1, size), "biases must be 1 x size");
        assert!((0.0..1.0).contains(&dropout), "dropout must be in [0, 1)");

        Layer {
            size,
            weights,
            biases,
            activator: activation,
            dropout,
            neurons: Matrix::zeros(1, size),
            pre_neurons: Matrix::zeros(1, size),
            mask: None,
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.rows
    }

    /// Evaluation-mode forward pass: no dropout.
    pub fn feed_from(&mut self, input: Vec<f64>) -> Vec<f64> {
        let a = self.activate(input);
        self.mask = None;
        self.neurons = a.clone();
        a.data[0].clone()
    }

    /// Training-mode forward pass. Each output survives with probability
    /// `1 - dropout` and is rescaled by `1 / (1 - dropout)`.
    pub fn feed_from_train<R: Rng + ?Sized>(&mut self, input: Vec<f64>, rng: &mut R) -> Vec<f64> {
        let a = self.activate(input);
        if self.dropout > 0.0 {
            let keep = 1.0 - self.dropout;
            let mask = Matrix::row(
                (0..self.size)
                    .map(|_| if rng.gen::<f64>() < keep { 1.0 / keep } else { 0.0 })
                    .collect(),
            );
            let dropped = a.hadamard(&mask);
            self.mask = Some(mask);
            self.neurons = dropped;
        } else {
            self.mask = None;
            self.neurons = a;
        }
        self.neurons.data[0].clone()
    }

    fn activate(&mut self, input: Vec<f64>) -> Matrix {
        let z = Matrix::row(input) * self.weights.clone() + self.biases.clone();
        let a = z.map(|x| self.activator.function(x));
        self.pre_neurons = z;
        a
    }

    /// Computes gradient adjustments. Returns (weights_grad, layer_delta);
    /// the bias gradient equals `layer_delta`.
    /// `next_layer_delta` is ∂L/∂a for this layer (error in activation space).
    pub fn compute_gradients(
        &self,
        next_layer_delta: Matrix,
        inputs: &Matrix,
    ) -> (Matrix, Matrix) {
        let upstream = match &self.mask {
            Some(mask) => next_layer_delta.hadamard(mask),
            None => next_layer_delta,
        };
        // Use pre-activation z so that derivative(z) = σ'(z) is computed correctly
        let act_derivative = self.pre_neurons.map(|x| self.activator.derivative(x));
        // δ = error ⊙ σ'(z)
        let layer_delta = upstream.hadamard(&act_derivative);

        let weights_adjustment = inputs.transpose() * layer_delta.clone();

        (weights_adjustment, layer_delta)
    }

    /// Subtracts `scale * step` from the weights and biases.
    pub fn apply_gradients(&mut self, weights_step: Matrix, biases_step: Matrix, scale: f64) {
        self.weights = self.weights.clone() - weights_step.map(|x| x * scale);
        self.biases = self.biases.clone() - biases_step.map(|x| x * scale);
    }
}
