use std::time::Instant;

use rand::Rng;
use tracing::info;

use crate::data::dataset::Dataset;
use crate::data::loader::BatchLoader;
use crate::error::{FlowError, Result};
use crate::network::network::Network;
use crate::optim::Optimizer;
use crate::train::epoch_stats::EpochStats;
use crate::train::train_config::TrainConfig;
use crate::train::trainer::{evaluate_loss, run_one_epoch};

/// Outcome of a `train_loop` run.
#[derive(Debug, Clone)]
pub struct TrainReport {
    pub history: Vec<EpochStats>,
    /// Epoch whose weights produced `best_test_loss`.
    pub best_epoch: usize,
    pub best_test_loss: f64,
}

/// Trains `network` for `config.epochs` epochs, evaluating on `test` after
/// each one.
///
/// `on_improve` is called with the current weights every time the test loss
/// reaches a new strict minimum; it is where callers write checkpoints. An
/// error from the callback aborts training.
///
/// Fails up front when `train` is empty or `batch_size == 0`. A test loss
/// that is never finite leaves `best_epoch` at 0.
pub fn train_loop<R, F>(
    network: &mut Network,
    train: &Dataset,
    test: &Dataset,
    optimizer: &mut dyn Optimizer,
    config: &TrainConfig,
    rng: &mut R,
    mut on_improve: F,
) -> Result<TrainReport>
where
    R: Rng + ?Sized,
    F: FnMut(&Network, &EpochStats) -> Result<()>,
{
    if train.is_empty() {
        return Err(FlowError::EmptyPartition { train: 0, test: test.len() });
    }
    let loader = BatchLoader::new(train.len(), config.batch_size, config.shuffle)?;

    let mut history = Vec::with_capacity(config.epochs);
    let mut best_epoch = 0;
    let mut best_test_loss = f64::INFINITY;

    for epoch in 1..=config.epochs {
        let t_start = Instant::now();

        let train_loss = run_one_epoch(network, train, &loader, optimizer, config.loss_type, rng);
        let test_loss = evaluate_loss(network, test, config.loss_type);

        let improved = test_loss < best_test_loss;
        let stats = EpochStats {
            epoch,
            total_epochs: config.epochs,
            train_loss,
            test_loss,
            improved,
            elapsed_ms: t_start.elapsed().as_millis() as u64,
        };

        if improved {
            best_test_loss = test_loss;
            best_epoch = epoch;
            on_improve(network, &stats)?;
        }

        info!(
            epoch,
            train_mean_loss = train_loss,
            test_mean_loss = test_loss,
            improved,
            "epoch {}/{}",
            epoch,
            config.epochs
        );
        history.push(stats);
    }

    Ok(TrainReport { history, best_epoch, best_test_loss })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loss::loss_type::LossType;
    use crate::network::spec::NetworkSpec;
    use crate::optim::Adam;
    use rand::{rngs::StdRng, SeedableRng};

    fn data(range: std::ops::Range<usize>) -> Dataset {
        let inputs: Vec<Vec<f64>> = range.map(|i| vec![(i % 6) as f64, (i % 4) as f64]).collect();
        let targets = inputs.iter().map(|x| 0.3 * x[0] - 0.2 * x[1]).collect();
        Dataset { inputs, targets }
    }

    #[test]
    fn improvements_are_strict_and_reported() {
        let mut rng = StdRng::seed_from_u64(991217);
        let mut net = NetworkSpec::default_discharge_mlp(2).build(&mut rng).unwrap();
        let (train, test) = (data(0..60), data(60..80));
        let mut adam = Adam::new(0.01);
        let config = TrainConfig::new(20, 16, LossType::Mse);

        let mut seen = Vec::new();
        let report = train_loop(&mut net, &train, &test, &mut adam, &config, &mut rng, |_, stats| {
            seen.push((stats.epoch, stats.test_loss));
            Ok(())
        })
        .unwrap();

        assert_eq!(report.history.len(), 20);
        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|w| w[1].1 < w[0].1));
        let (last_epoch, last_loss) = *seen.last().unwrap();
        assert_eq!(report.best_epoch, last_epoch);
        assert_eq!(report.best_test_loss, last_loss);
        let min = report.history.iter().map(|s| s.test_loss).fold(f64::INFINITY, f64::min);
        assert_eq!(report.best_test_loss, min);
    }

    #[test]
    fn callback_error_stops_training() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut net = NetworkSpec::default_discharge_mlp(2).build(&mut rng).unwrap();
        let (train, test) = (data(0..10), data(10..14));
        let mut adam = Adam::new(0.01);
        let config = TrainConfig::new(5, 4, LossType::Mse);

        let result = train_loop(&mut net, &train, &test, &mut adam, &config, &mut rng, |_, _| {
            Err(crate::error::FlowError::Config("stop".into()))
        });
        assert!(result.is_err());
    }

    #[test]
    fn empty_training_set_is_an_error() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut net = NetworkSpec::default_discharge_mlp(2).build(&mut rng).unwrap();
        let mut adam = Adam::new(0.01);
        let config = TrainConfig::new(3, 4, LossType::Mse);
        let empty = Dataset { inputs: Vec::new(), targets: Vec::new() };

        let err = train_loop(&mut net, &empty, &data(0..4), &mut adam, &config, &mut rng, |_, _| Ok(()))
            .unwrap_err();
        assert!(matches!(err, FlowError::EmptyPartition { train: 0, test: 4 }));
    }

    #[test]
    fn zero_batch_size_is_an_error() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut net = NetworkSpec::default_discharge_mlp(2).build(&mut rng).unwrap();
        let mut adam = Adam::new(0.01);
        let config = TrainConfig::new(3, 0, LossType::Mse);

        let result = train_loop(&mut net, &data(0..8), &data(8..10), &mut adam, &config, &mut rng, |_, _| Ok(()));
        assert!(matches!(result, Err(FlowError::Config(_))));
    }

    #[test]
    fn empty_test_set_never_improves() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut net = NetworkSpec::default_discharge_mlp(2).build(&mut rng).unwrap();
        let mut adam = Adam::new(0.01);
        let config = TrainConfig::new(3, 4, LossType::Mse);
        let empty = Dataset { inputs: Vec::new(), targets: Vec::new() };

        let mut calls = 0;
        let report = train_loop(&mut net, &data(0..8), &empty, &mut adam, &config, &mut rng, |_, _| {
            calls += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(calls, 0);
        assert_eq!(report.best_epoch, 0);
        assert!(report.history.iter().all(|s| s.test_loss.is_nan()));
    }
}
