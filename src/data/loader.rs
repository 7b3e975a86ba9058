use std::slice::Chunks;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::error::{FlowError, Result};

/// Index-level mini-batching over a dataset of `len` samples.
#[derive(Debug, Clone, Copy)]
pub struct BatchLoader {
    pub len: usize,
    pub batch_size: usize,
    pub shuffle: bool,
}

impl BatchLoader {
    pub fn new(len: usize, batch_size: usize, shuffle: bool) -> Result<BatchLoader> {
        if batch_size == 0 {
            return Err(FlowError::Config("batch_size must be at least 1".into()));
        }
        Ok(BatchLoader { len, batch_size, shuffle })
    }

    /// Sample order for one pass: a fresh permutation when shuffling,
    /// otherwise `0..len`.
    pub fn order<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.len).collect();
        if self.shuffle {
            indices.shuffle(rng);
        }
        indices
    }

    /// Consecutive batches of `order`; the last one may be short.
    pub fn batches<'a>(&self, order: &'a [usize]) -> Chunks<'a, usize> {
        order.chunks(self.batch_size)
    }

    pub fn n_batches(&self) -> usize {
        self.len.div_ceil(self.batch_size)
    }
}
