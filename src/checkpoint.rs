use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::error::{FlowError, Result};
use crate::network::network::Network;
use crate::preprocess::{cutter::Cutter, scaler::TargetScaler};

/// Everything needed to reproduce a station's predictions: the trained
/// weights plus the preprocessing fitted alongside them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub station: String,
    pub feature_columns: Vec<String>,
    pub target_column: String,
    pub date_column: String,
    pub cutter: Cutter,
    pub scaler: TargetScaler,
    pub network: Network,
    /// Epoch at which these weights were saved.
    pub epoch: usize,
    pub test_loss: f64,
}

impl Checkpoint {
    /// Serializes the checkpoint to a pretty-printed JSON file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path).map_err(|e| FlowError::io(path, e))?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a checkpoint previously written by `save_json`.
    pub fn load_json(path: &Path) -> Result<Checkpoint> {
        let file = std::fs::File::open(path).map_err(|e| FlowError::io(path, e))?;
        let reader = std::io::BufReader::new(file);
        let mut checkpoint: Checkpoint = serde_json::from_reader(reader)?;
        checkpoint.network.reset_buffers();
        if checkpoint.network.input_size() != checkpoint.feature_columns.len() {
            return Err(FlowError::Shape(format!(
                "checkpoint network takes {} inputs but lists {} feature columns",
                checkpoint.network.input_size(),
                checkpoint.feature_columns.len()
            )));
        }
        Ok(checkpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::spec::NetworkSpec;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn roundtrip_preserves_predictions() {
        let mut rng = StdRng::seed_from_u64(4);
        let network = NetworkSpec::default_discharge_mlp(2).build(&mut rng).unwrap();
        let ckpt = Checkpoint {
            station: "s1".into(),
            feature_columns: vec!["a".into(), "b".into()],
            target_column: "discharge".into(),
            date_column: "date".into(),
            cutter: Cutter::new(vec!["a".into(), "b".into()], 6, 32700.0),
            scaler: TargetScaler { mean: 1.0, std: 2.0 },
            network,
            epoch: 3,
            test_loss: 0.25,
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ckpt.json");
        ckpt.save_json(&path).unwrap();

        let mut back = Checkpoint::load_json(&path).unwrap();
        let mut orig = ckpt.network.clone();
        assert_eq!(back.epoch, 3);
        assert_eq!(back.network.forward(vec![0.5, 1.5]), orig.forward(vec![0.5, 1.5]));
    }

    #[test]
    fn feature_count_must_match_network() {
        let mut rng = StdRng::seed_from_u64(4);
        let ckpt = Checkpoint {
            station: "s1".into(),
            feature_columns: vec!["a".into()],
            target_column: "discharge".into(),
            date_column: "date".into(),
            cutter: Cutter::new(vec!["a".into()], 6, 32700.0),
            scaler: TargetScaler { mean: 0.0, std: 1.0 },
            network: NetworkSpec::default_discharge_mlp(2).build(&mut rng).unwrap(),
            epoch: 1,
            test_loss: 1.0,
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        ckpt.save_json(&path).unwrap();
        assert!(matches!(Checkpoint::load_json(&path), Err(FlowError::Shape(_))));
    }
}
