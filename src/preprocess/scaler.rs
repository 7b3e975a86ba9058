use serde::{Serialize, Deserialize};
use tracing::warn;

use crate::error::{FlowError, Result};

/// Standardises the regression target: `(y - mean) / std`.
///
/// Fitted on the training rows only, then applied to both partitions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetScaler {
    pub mean: f64,
    pub std: f64,
}

impl TargetScaler {
    /// Mean and population standard deviation of `values`.
    pub fn fit(values: &[f64]) -> Result<TargetScaler> {
        if values.is_empty() {
            return Err(FlowError::Shape("cannot fit a scaler on zero values".into()));
        }
        if let Some(row) = values.iter().position(|v| !v.is_finite()) {
            return Err(FlowError::Shape(format!("non-finite target value at row {row}")));
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let mut std = var.sqrt();
        if std == 0.0 {
            warn!(mean, "target is constant on the training rows; using std = 1");
            std = 1.0;
        }

        Ok(TargetScaler { mean, std })
    }

    pub fn transform(&self, value: f64) -> f64 {
        (value - self.mean) / self.std
    }

    pub fn inverse(&self, value: f64) -> f64 {
        value * self.std + self.mean
    }

    pub fn transform_all(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| self.transform(*v)).collect()
    }

    pub fn inverse_all(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| self.inverse(*v)).collect()
    }
}
