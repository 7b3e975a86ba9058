use serde::{Serialize, Deserialize};

use crate::error::{FlowError, Result};

/// Goodness-of-fit of a discharge forecast against observations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorMetrics {
    pub mae: f64,
    pub mse: f64,
    pub rmse: f64,
    /// Percent; rows with a zero observation are skipped.
    pub mape: f64,
    pub r2: f64,
    /// Nash–Sutcliffe efficiency. Same formula as `r2`, kept under the
    /// hydrology name.
    pub nse: f64,
    /// Kling–Gupta efficiency.
    pub kge: f64,
}

impl ErrorMetrics {
    pub const HEADER: [&'static str; 7] = ["MAE", "MSE", "RMSE", "MAPE", "R2", "NSE", "KGE"];

    pub fn compute(predicted: &[f64], observed: &[f64]) -> Result<ErrorMetrics> {
        if predicted.len() != observed.len() {
            return Err(FlowError::Shape(format!(
                "{} predictions vs {} observations",
                predicted.len(),
                observed.len()
            )));
        }
        if predicted.is_empty() {
            return Err(FlowError::Shape("no samples to score".into()));
        }

        let n = predicted.len() as f64;
        let pairs = || predicted.iter().zip(observed.iter());

        let mae = pairs().map(|(p, o)| (p - o).abs()).sum::<f64>() / n;
        let ss_res = pairs().map(|(p, o)| (p - o).powi(2)).sum::<f64>();
        let mse = ss_res / n;

        let (ape_sum, ape_n) = pairs()
            .filter(|(_, o)| **o != 0.0)
            .fold((0.0, 0usize), |(s, c), (p, o)| (s + ((p - o) / o).abs(), c + 1));
        let mape = if ape_n == 0 { f64::NAN } else { 100.0 * ape_sum / ape_n as f64 };

        let obs_mean = mean(observed);
        let ss_tot = observed.iter().map(|o| (o - obs_mean).powi(2)).sum::<f64>();
        let r2 = if ss_tot == 0.0 { f64::NAN } else { 1.0 - ss_res / ss_tot };

        Ok(ErrorMetrics {
            mae,
            mse,
            rmse: mse.sqrt(),
            mape,
            r2,
            nse: r2,
            kge: kge(predicted, observed),
        })
    }

    /// Values in `HEADER` order.
    pub fn values(&self) -> [f64; 7] {
        [self.mae, self.mse, self.rmse, self.mape, self.r2, self.nse, self.kge]
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64], mean: f64) -> f64 {
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

/// KGE = 1 − sqrt((r − 1)² + (α − 1)² + (β − 1)²), with α the ratio of
/// standard deviations and β the ratio of means. NaN when either series is
/// constant or the observed mean is zero.
fn kge(predicted: &[f64], observed: &[f64]) -> f64 {
    let (mp, mo) = (mean(predicted), mean(observed));
    let (sp, so) = (std_dev(predicted, mp), std_dev(observed, mo));
    if sp == 0.0 || so == 0.0 || mo == 0.0 {
        return f64::NAN;
    }
    let cov = predicted.iter().zip(observed.iter())
        .map(|(p, o)| (p - mp) * (o - mo))
        .sum::<f64>() / predicted.len() as f64;
    let r = cov / (sp * so);
    let alpha = sp / so;
    let beta = mp / mo;
    1.0 - ((r - 1.0).powi(2) + (alpha - 1.0).powi(2) + (beta - 1.0).powi(2)).sqrt()
}
