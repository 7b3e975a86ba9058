pub struct MaeLoss;

impl MaeLoss {
    /// Scalar MAE: mean(|predicted - expected|)
    pub fn loss(predicted: &[f64], expected: &[f64]) -> f64 {
        let n = predicted.len() as f64;
        predicted.iter().zip(expected.iter())
            .map(|(p, y)| (p - y).abs())
            .sum::<f64>() / n
    }

    /// Per-output subgradient: sign(p - y) / n, and 0 where p == y.
    pub fn derivative(predicted: &[f64], expected: &[f64]) -> Vec<f64> {
        let n = predicted.len() as f64;
        predicted.iter().zip(expected.iter())
            .map(|(p, y)| match p.partial_cmp(y) {
                Some(std::cmp::Ordering::Greater) => 1.0 / n,
                Some(std::cmp::Ordering::Less) => -1.0 / n,
                _ => 0.0,
            })
            .collect()
    }
}
