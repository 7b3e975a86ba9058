use crate::loss::loss_type::LossType;

/// Configuration for a `train_loop` run.
///
/// # Fields
/// - `epochs`    : total number of full passes over the training data
/// - `batch_size`: samples per mini-batch; use `1` for online updates
/// - `loss_type` : which loss function to use
/// - `shuffle`   : reshuffle the training rows every epoch
#[derive(Debug, Clone, Copy)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub loss_type: LossType,
    pub shuffle: bool,
}

impl TrainConfig {
    /// Creates a `TrainConfig` that shuffles the training rows.
    pub fn new(epochs: usize, batch_size: usize, loss_type: LossType) -> Self {
        TrainConfig {
            epochs,
            batch_size,
            loss_type,
            shuffle: true,
        }
    }
}
