use crate::data::frame::StationFrame;
use crate::error::{FlowError, Result};
use crate::preprocess::scaler::TargetScaler;

/// Feature rows paired with standardised targets.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub inputs: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

impl Dataset {
    /// Builds a dataset from `frame`, standardising `target` with `scaler`.
    pub fn from_frame(
        frame: &StationFrame,
        features: &[String],
        target: &str,
        scaler: &TargetScaler,
    ) -> Result<Dataset> {
        let inputs = feature_rows(frame, features)?;
        let raw = frame.column(target)?;
        if let Some(row) = raw.iter().position(|v| v.is_nan()) {
            return Err(FlowError::MissingTarget { column: target.to_string(), row });
        }
        Ok(Dataset { inputs, targets: scaler.transform_all(raw) })
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.inputs.first().map_or(0, Vec::len)
    }
}

/// Row-major view of the `features` columns of `frame`.
pub fn feature_rows(frame: &StationFrame, features: &[String]) -> Result<Vec<Vec<f64>>> {
    let columns = features
        .iter()
        .map(|name| frame.column(name))
        .collect::<Result<Vec<_>>>()?;
    Ok((0..frame.len())
        .map(|row| columns.iter().map(|col| col[row]).collect())
        .collect())
}

/// Number of leading rows that go to training: `floor(n * fraction)`.
/// Both partitions must be non-empty.
pub fn chronological_split(n: usize, fraction: f64) -> Result<usize> {
    let train = (n as f64 * fraction).floor() as usize;
    let train = train.min(n);
    let test = n - train;
    if train == 0 || test == 0 {
        return Err(FlowError::EmptyPartition { train, test });
    }
    Ok(train)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> StationFrame {
        StationFrame::from_csv_str(
            "s",
            "date,discharge,a,b\n\
             2001-01-01,10,1,2\n\
             2001-01-02,20,3,4\n\
             2001-01-03,30,5,6\n",
        )
        .unwrap()
    }

    #[test]
    fn rows_follow_feature_order() {
        let rows = feature_rows(&frame(), &["b".into(), "a".into()]).unwrap();
        assert_eq!(rows, vec![vec![2.0, 1.0], vec![4.0, 3.0], vec![6.0, 5.0]]);
    }

    #[test]
    fn targets_are_standardised() {
        let scaler = TargetScaler { mean: 20.0, std: 10.0 };
        let ds = Dataset::from_frame(&frame(), &["a".into()], "discharge", &scaler).unwrap();
        assert_eq!(ds.targets, vec![-1.0, 0.0, 1.0]);
        assert_eq!(ds.n_features(), 1);
    }

    #[test]
    fn nan_target_is_reported_with_row() {
        let f = StationFrame::from_csv_str("s", "discharge,a\n1,1\n,2\n").unwrap();
        let scaler = TargetScaler { mean: 0.0, std: 1.0 };
        let err = Dataset::from_frame(&f, &["a".into()], "discharge", &scaler).unwrap_err();
        assert!(matches!(err, FlowError::MissingTarget { row: 1, .. }));
    }

    #[test]
    fn split_floors_the_training_share() {
        assert_eq!(chronological_split(10, 0.75).unwrap(), 7);
        assert_eq!(chronological_split(4, 0.75).unwrap(), 3);
        assert!(matches!(chronological_split(1, 0.75), Err(FlowError::EmptyPartition { .. })));
        assert!(chronological_split(2, 0.4).is_err());
    }
}
