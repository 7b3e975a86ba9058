pub mod mse;
pub mod mae;
pub mod huber;
pub mod loss_type;

pub use mse::MseLoss;
pub use mae::MaeLoss;
pub use huber::HuberLoss;
pub use loss_type::LossType;

/// Scalar loss for one sample: dispatches on `LossType`.
pub fn loss(loss_type: LossType, predicted: &[f64], expected: &[f64]) -> f64 {
    match loss_type {
        LossType::Mse   => MseLoss::loss(predicted, expected),
        LossType::Mae   => MaeLoss::loss(predicted, expected),
        LossType::Huber => HuberLoss::loss(predicted, expected),
    }
}

/// Per-output gradient for one sample: dispatches on `LossType`.
pub fn derivative(loss_type: LossType, predicted: &[f64], expected: &[f64]) -> Vec<f64> {
    match loss_type {
        LossType::Mse   => MseLoss::derivative(predicted, expected),
        LossType::Mae   => MaeLoss::derivative(predicted, expected),
        LossType::Huber => HuberLoss::derivative(predicted, expected),
    }
}
