use rand::Rng;

use crate::data::dataset::Dataset;
use crate::data::loader::BatchLoader;
use crate::loss::{self, loss_type::LossType};
use crate::math::matrix::Matrix;
use crate::network::network::Network;
use crate::optim::Optimizer;

/// Runs one full epoch of mini-batch training over `data`.
/// Gradients are averaged over each batch before the optimizer step.
/// Returns the mean loss over all samples.
pub fn run_one_epoch<R: Rng + ?Sized>(
    network: &mut Network,
    data: &Dataset,
    loader: &BatchLoader,
    optimizer: &mut dyn Optimizer,
    loss_type: LossType,
    rng: &mut R,
) -> f64 {
    let mut total_loss = 0.0;
    let order = loader.order(rng);

    for batch in loader.batches(&order) {
        // Zero-initialize accumulated gradient storage.
        let mut acc_grads: Vec<(Matrix, Matrix)> = network.layers.iter()
            .map(|layer| (
                Matrix::zeros(layer.weights.rows, layer.weights.cols),
                Matrix::zeros(layer.biases.rows, layer.biases.cols),
            ))
            .collect();

        for &idx in batch {
            let input = &data.inputs[idx];
            let expected = [data.targets[idx]];

            let output = network.forward_train(input.clone(), rng);
            total_loss += loss::loss(loss_type, &output, &expected);

            let error = loss::derivative(loss_type, &output, &expected);
            for (acc, (w_grad, b_grad)) in acc_grads.iter_mut().zip(network.backward(input, error)) {
                acc.0 = acc.0.clone() + w_grad;
                acc.1 = acc.1.clone() + b_grad;
            }
        }

        // Average and apply.
        let inv_batch = 1.0 / batch.len() as f64;
        for (i, (w_acc, b_acc)) in acc_grads.into_iter().enumerate() {
            let w_avg = w_acc.map(|x| x * inv_batch);
            let b_avg = b_acc.map(|x| x * inv_batch);
            optimizer.step(i, &mut network.layers[i], w_avg, b_avg);
        }
    }

    total_loss / data.len() as f64
}

/// Mean loss over a full dataset in eval mode (no dropout, no updates).
/// An empty dataset has no loss and yields NaN.
pub fn evaluate_loss(network: &mut Network, data: &Dataset, loss_type: LossType) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    let total: f64 = data.inputs.iter().zip(data.targets.iter())
        .map(|(input, target)| {
            let output = network.forward(input.clone());
            loss::loss(loss_type, &output, &[*target])
        })
        .sum();
    total / data.len() as f64
}

/// First output of the network for every row of `inputs`, in eval mode.
pub fn predict(network: &mut Network, inputs: &[Vec<f64>]) -> Vec<f64> {
    inputs.iter()
        .map(|input| network.forward(input.clone()).first().copied().unwrap_or(f64::NAN))
        .collect()
}
