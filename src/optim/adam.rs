use crate::{math::matrix::Matrix, layers::dense::Layer, optim::Optimizer};

/// First and second moment estimates for one parameter tensor.
#[derive(Debug, Clone)]
struct Moments {
    m: Matrix,
    v: Matrix,
}

impl Moments {
    fn zeros_like(shape: &Matrix) -> Moments {
        Moments {
            m: Matrix::zeros(shape.rows, shape.cols),
            v: Matrix::zeros(shape.rows, shape.cols),
        }
    }

    /// Updates the moments with `grad` and returns the bias-corrected
    /// direction m̂ / (sqrt(v̂) + ε).
    fn update(&mut self, grad: &Matrix, adam: &Adam, t: i32) -> Matrix {
        let (b1, b2) = (adam.beta1, adam.beta2);
        self.m = self.m.map(|x| x * b1) + grad.map(|g| g * (1.0 - b1));
        self.v = self.v.map(|x| x * b2) + grad.map(|g| g * g * (1.0 - b2));

        let m_corr = 1.0 - b1.powi(t);
        let v_corr = 1.0 - b2.powi(t);

        let mut step = Matrix::zeros(grad.rows, grad.cols);
        for i in 0..grad.rows {
            for j in 0..grad.cols {
                let m_hat = self.m.data[i][j] / m_corr;
                let v_hat = self.v.data[i][j] / v_corr;
                step.data[i][j] = m_hat / (v_hat.sqrt() + adam.epsilon);
            }
        }
        step
    }
}

#[derive(Debug, Clone)]
struct LayerState {
    t: i32,
    weights: Moments,
    biases: Moments,
}

/// Adam (Kingma & Ba) with bias correction and no weight decay.
pub struct Adam {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    state: Vec<Option<LayerState>>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Adam {
        Adam::with_betas(learning_rate, 0.9, 0.999, 1e-8)
    }

    pub fn with_betas(learning_rate: f64, beta1: f64, beta2: f64, epsilon: f64) -> Adam {
        Adam { learning_rate, beta1, beta2, epsilon, state: Vec::new() }
    }
}

impl Optimizer for Adam {
    fn step(&mut self, layer_index: usize, layer: &mut Layer, weights_grad: Matrix, biases_grad: Matrix) {
        if self.state.len() <= layer_index {
            self.state.resize(layer_index + 1, None);
        }
        let mut state = self.state[layer_index].take().unwrap_or_else(|| LayerState {
            t: 0,
            weights: Moments::zeros_like(&layer.weights),
            biases: Moments::zeros_like(&layer.biases),
        });

        state.t += 1;
        let w_step = state.weights.update(&weights_grad, self, state.t);
        let b_step = state.biases.update(&biases_grad, self, state.t);
        layer.apply_gradients(w_step, b_step, self.learning_rate);

        self.state[layer_index] = Some(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::activation::ActivationFunction;

    fn scalar_layer(w: f64) -> Layer {
        Layer::new(1, Matrix::row(vec![w]), Matrix::row(vec![0.0]), ActivationFunction::Identity, 0.0)
    }

    #[test]
    fn first_step_moves_by_learning_rate() {
        // With bias correction, the first Adam step is lr * g / (|g| + ε).
        let mut adam = Adam::new(0.01);
        let mut layer = scalar_layer(1.0);
        adam.step(0, &mut layer, Matrix::row(vec![4.0]), Matrix::row(vec![-2.0]));
        assert!((layer.weights.data[0][0] - 0.99).abs() < 1e-9);
        assert!((layer.biases.data[0][0] - 0.01).abs() < 1e-9);
    }

    #[test]
    fn minimises_a_quadratic() {
        // f(w) = (w - 3)², gradient 2(w - 3).
        let mut adam = Adam::new(0.1);
        let mut layer = scalar_layer(0.0);
        for _ in 0..500 {
            let w = layer.weights.data[0][0];
            adam.step(0, &mut layer, Matrix::row(vec![2.0 * (w - 3.0)]), Matrix::row(vec![0.0]));
        }
        assert!((layer.weights.data[0][0] - 3.0).abs() < 0.05);
    }

    #[test]
    fn layers_keep_separate_state() {
        let mut adam = Adam::new(0.01);
        let mut a = scalar_layer(0.0);
        let mut b = scalar_layer(0.0);
        adam.step(1, &mut b, Matrix::row(vec![1.0]), Matrix::row(vec![0.0]));
        adam.step(0, &mut a, Matrix::row(vec![1.0]), Matrix::row(vec![0.0]));
        assert!((a.weights.data[0][0] - b.weights.data[0][0]).abs() < 1e-12);
    }
}
