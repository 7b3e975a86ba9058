use std::path::Path;

use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::activation::activation::ActivationFunction;
use crate::error::{FlowError, Result};
use crate::layers::dense::Layer;
use crate::loss::loss_type::LossType;
use crate::math::matrix::Matrix;
use crate::network::network::Network;

/// How a layer's weights and biases are drawn at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightInit {
    /// U(-1/sqrt(fan_in), 1/sqrt(fan_in)) for weights and biases.
    #[default]
    Uniform,
    /// N(0, 1/fan_in) weights, zero biases.
    Xavier,
    /// N(0, 2/fan_in) weights, zero biases.
    He,
}

/// Describes one layer in a network specification.
///
/// Fields:
/// - `size`      : number of neurons in this layer
/// - `input_size`: number of neurons feeding into this layer (i.e. the output
///                  size of the previous layer, or the raw input dimension for
///                  the first layer)
/// - `activation`: activation function applied after the linear transform
/// - `dropout`   : drop probability applied to this layer's output while training
/// - `init`      : weight initialisation scheme
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerSpec {
    pub size: usize,
    pub input_size: usize,
    pub activation: ActivationFunction,
    #[serde(default)]
    pub dropout: f64,
    #[serde(default)]
    pub init: WeightInit,
}

impl LayerSpec {
    fn build<R: Rng + ?Sized>(&self, rng: &mut R) -> Layer {
        let fan_in = self.input_size;
        let (weights, biases) = match self.init {
            WeightInit::Uniform => {
                let bound = 1.0 / (fan_in as f64).sqrt();
                (
                    Matrix::uniform(fan_in, self.size, bound, rng),
                    Matrix::uniform(1, self.size, bound, rng),
                )
            }
            WeightInit::Xavier => (Matrix::xavier(fan_in, self.size, rng), Matrix::zeros(1, self.size)),
            WeightInit::He => (Matrix::he(fan_in, self.size, rng), Matrix::zeros(1, self.size)),
        };
        Layer::new(self.size, weights, biases, self.activation.clone(), self.dropout)
    }
}

/// A fully serializable description of a network architecture plus its
/// training loss type.
///
/// `NetworkSpec` lives inside the experiment config, independently of the
/// trained weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSpec {
    /// Human-readable name, used in log lines.
    pub name: String,
    /// Ordered list of layer descriptions (input → output).
    pub layers: Vec<LayerSpec>,
    /// Loss function to pair with this network during training.
    pub loss: LossType,
}

impl NetworkSpec {
    /// `n_features → 8 (Tanh, dropout 0.2) → 1 (Identity)`, trained with MSE.
    pub fn default_discharge_mlp(n_features: usize) -> NetworkSpec {
        NetworkSpec {
            name: "bp".to_string(),
            layers: vec![
                LayerSpec {
                    size: 8,
                    input_size: n_features,
                    activation: ActivationFunction::Tanh,
                    dropout: 0.2,
                    init: WeightInit::Uniform,
                },
                LayerSpec {
                    size: 1,
                    input_size: 8,
                    activation: ActivationFunction::Identity,
                    dropout: 0.0,
                    init: WeightInit::Uniform,
                },
            ],
            loss: LossType::Mse,
        }
    }

    pub fn input_size(&self) -> usize {
        self.layers.first().map_or(0, |l| l.input_size)
    }

    pub fn output_size(&self) -> usize {
        self.layers.last().map_or(0, |l| l.size)
    }

    /// Checks that consecutive layers chain and every dropout is in [0, 1).
    pub fn validate(&self) -> Result<()> {
        if self.layers.is_empty() {
            return Err(FlowError::Config(format!("network '{}' has no layers", self.name)));
        }
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.size == 0 || layer.input_size == 0 {
                return Err(FlowError::Config(format!("layer {i} has a zero dimension")));
            }
            if !(0.0..1.0).contains(&layer.dropout) {
                return Err(FlowError::Config(format!(
                    "layer {i} dropout {} is outside [0, 1)",
                    layer.dropout
                )));
            }
            if i > 0 && self.layers[i - 1].size != layer.input_size {
                return Err(FlowError::Config(format!(
                    "layer {i} expects {} inputs but layer {} produces {}",
                    layer.input_size,
                    i - 1,
                    self.layers[i - 1].size
                )));
            }
        }
        Ok(())
    }

    /// Instantiates freshly initialised weights for this architecture.
    pub fn build<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Network> {
        self.validate()?;
        Ok(Network::new(self.layers.iter().map(|spec| spec.build(rng)).collect()))
    }

    /// Serializes the spec to a pretty-printed JSON file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path).map_err(|e| FlowError::io(path, e))?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a `NetworkSpec` from a JSON file.
    pub fn load_json(path: &Path) -> Result<NetworkSpec> {
        let file = std::fs::File::open(path).map_err(|e| FlowError::io(path, e))?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn default_mlp_builds_with_uniform_bounds() {
        let spec = NetworkSpec::default_discharge_mlp(5);
        let mut rng = StdRng::seed_from_u64(991217);
        let net = spec.build(&mut rng).unwrap();
        assert_eq!(net.input_size(), 5);
        assert_eq!(net.output_size(), 1);
        assert_eq!(net.layers[0].dropout, 0.2);
        let bound = 1.0 / 5f64.sqrt();
        assert!(net.layers[0].weights.data.iter().flatten().all(|w| w.abs() <= bound));
    }

    #[test]
    fn broken_chain_is_rejected() {
        let mut spec = NetworkSpec::default_discharge_mlp(5);
        spec.layers[1].input_size = 4;
        assert!(matches!(spec.validate(), Err(FlowError::Config(_))));
    }

    #[test]
    fn dropout_of_one_is_rejected() {
        let mut spec = NetworkSpec::default_discharge_mlp(5);
        spec.layers[0].dropout = 1.0;
        assert!(spec.validate().is_err());
    }

    #[test]
    fn missing_optional_fields_take_defaults() {
        let json = r#"{
            "name": "tiny",
            "layers": [{"size": 1, "input_size": 2, "activation": "Identity"}],
            "loss": "mae"
        }"#;
        let spec: NetworkSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.layers[0].dropout, 0.0);
        assert_eq!(spec.layers[0].init, WeightInit::Uniform);
        assert_eq!(spec.loss, LossType::Mae);
    }
}
