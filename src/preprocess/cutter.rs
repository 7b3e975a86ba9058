use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::data::frame::StationFrame;
use crate::error::{FlowError, Result};

/// How bin edges are placed over a column's observed values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinStrategy {
    /// Equal-frequency bins from linearly interpolated quantiles.
    #[default]
    Quantile,
    /// Equal-width bins between the column minimum and maximum.
    Uniform,
}

/// Discretises continuous columns into integer bin codes.
///
/// `fit` learns edges per column from the non-missing values; `transform`
/// replaces every value in place with its bin code `0..k`. Missing values
/// (the `missing` sentinel or NaN) get the dedicated code `k`, one past the
/// last real bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cutter {
    pub columns: Vec<String>,
    pub bins: usize,
    pub missing: f64,
    #[serde(default)]
    pub strategy: BinStrategy,
    #[serde(default)]
    edges: BTreeMap<String, Vec<f64>>,
}

impl Cutter {
    pub fn new(columns: Vec<String>, bins: usize, missing: f64) -> Cutter {
        Cutter {
            columns,
            bins,
            missing,
            strategy: BinStrategy::default(),
            edges: BTreeMap::new(),
        }
    }

    pub fn with_strategy(mut self, strategy: BinStrategy) -> Cutter {
        self.strategy = strategy;
        self
    }

    pub fn is_missing(&self, value: f64) -> bool {
        value.is_nan() || value == self.missing
    }

    /// Learns bin edges for every configured column of `frame`.
    pub fn fit(&mut self, frame: &StationFrame) -> Result<()> {
        if self.bins == 0 {
            return Err(FlowError::Config("cutter needs at least one bin".into()));
        }

        let mut edges = BTreeMap::new();
        for name in &self.columns {
            let mut observed: Vec<f64> = frame
                .column(name)?
                .iter()
                .copied()
                .filter(|v| !self.is_missing(*v))
                .collect();
            observed.sort_by(f64::total_cmp);

            let col_edges = match self.strategy {
                BinStrategy::Quantile => quantile_edges(&observed, self.bins),
                BinStrategy::Uniform => uniform_edges(&observed, self.bins),
            };
            debug!(column = %name, bins = col_edges.len().saturating_sub(1), edges = ?col_edges, "fitted bins");
            edges.insert(name.clone(), col_edges);
        }

        self.edges = edges;
        Ok(())
    }

    /// Replaces every configured column of `frame` with its bin codes.
    pub fn transform(&self, frame: &mut StationFrame) -> Result<()> {
        for name in &self.columns {
            let edges = self
                .edges
                .get(name)
                .ok_or_else(|| FlowError::NotFitted(name.clone()))?;
            for value in frame.column_mut(name)?.iter_mut() {
                *value = self.code(edges, *value) as f64;
            }
        }
        Ok(())
    }

    pub fn fit_transform(&mut self, frame: &mut StationFrame) -> Result<()> {
        self.fit(frame)?;
        self.transform(frame)
    }

    /// Number of real bins learned for `column` (the missing code is this value).
    pub fn n_bins(&self, column: &str) -> Option<usize> {
        self.edges.get(column).map(|e| e.len().saturating_sub(1))
    }

    pub fn edges(&self, column: &str) -> Option<&[f64]> {
        self.edges.get(column).map(Vec::as_slice)
    }

    /// Bins are right-inclusive; values outside the fitted range clamp to the
    /// first or last bin.
    fn code(&self, edges: &[f64], value: f64) -> usize {
        let k = edges.len().saturating_sub(1);
        if k == 0 || self.is_missing(value) {
            return k;
        }
        edges[1..k].partition_point(|e| *e < value)
    }
}

/// Edges at the `i / bins` quantiles of sorted `values`, duplicates dropped.
fn quantile_edges(sorted: &[f64], bins: usize) -> Vec<f64> {
    if sorted.is_empty() {
        return Vec::new();
    }
    let raw = (0..=bins).map(|i| quantile(sorted, i as f64 / bins as f64)).collect();
    finish_edges(raw)
}

fn uniform_edges(sorted: &[f64], bins: usize) -> Vec<f64> {
    let (Some(&lo), Some(&hi)) = (sorted.first(), sorted.last()) else {
        return Vec::new();
    };
    let width = (hi - lo) / bins as f64;
    let raw = (0..=bins)
        .map(|i| if i == bins { hi } else { lo + width * i as f64 })
        .collect();
    finish_edges(raw)
}

/// Drops repeated edges; a column with a single distinct value keeps one bin.
fn finish_edges(mut edges: Vec<f64>) -> Vec<f64> {
    edges.dedup();
    if edges.len() == 1 {
        edges.push(edges[0]);
    }
    edges
}

/// Linear-interpolation quantile of an ascending slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}
