//! Cnn2In: two-branch CNN/LSTM model for the exchange bot.
//!
//! Each primary input (for example candles and order book depth) is
//! normalized per feature, convolved along time, reshaped so the conv
//! filters become the sequence axis, and summarized by an LSTM. The two
//! branch sequences are concatenated feature-wise and read by a stacked
//! LSTM head.

use burn::module::Ignored;
use burn::nn::{lstm::Lstm, Linear};
use burn::prelude::*;
use mas_core::{Activation, CoreError, InputShape, Result};
use serde::{Deserialize, Serialize};

use super::blocks::{dense, last_step, lstm, ConvBlock, FeatureNorm2d};
use crate::summary::{ArchitectureBuilder, ModelArchitecture};

/// Conv filters of each branch.
pub const CNN2IN_FILTERS: usize = 16;
/// Conv kernel length along time.
pub const CNN2IN_KERNEL: usize = 3;
/// LSTM width of each branch.
pub const CNN2IN_BRANCH_UNITS: usize = 64;
/// Widths of the stacked LSTM head.
pub const CNN2IN_HEAD_UNITS: [usize; 2] = [96, 32];

/// Configuration for the [`Cnn2In`] model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cnn2InConfig {
    /// Shape `(timesteps, features)` of `input_a`.
    pub shape_a: InputShape,
    /// Shape `(timesteps, features)` of `input_b`.
    pub shape_b: InputShape,
    /// Number of output classes.
    pub nb_output: usize,
    /// Activation of the output layer.
    #[serde(default)]
    pub activation: Activation,
}

impl Default for Cnn2InConfig {
    fn default() -> Self {
        Self {
            shape_a: InputShape::new(50, 9),
            shape_b: InputShape::new(50, 4),
            nb_output: 3,
            activation: Activation::Softmax,
        }
    }
}

impl Cnn2InConfig {
    /// Create a new config with a softmax output.
    pub fn new(shape_a: impl Into<InputShape>, shape_b: impl Into<InputShape>, nb_output: usize) -> Self {
        Self {
            shape_a: shape_a.into(),
            shape_b: shape_b.into(),
            nb_output,
            activation: Activation::default(),
        }
    }

    /// Set the output activation.
    #[must_use]
    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    /// Check the shape invariants.
    ///
    /// # Errors
    ///
    /// [`CoreError::TimestepMismatch`] when the primary inputs differ in
    /// timesteps, [`CoreError::InvalidShape`] for empty shapes or no outputs.
    pub fn validate(&self) -> Result<()> {
        if self.shape_a.timesteps() != self.shape_b.timesteps() {
            return Err(CoreError::TimestepMismatch {
                a: self.shape_a.timesteps(),
                b: self.shape_b.timesteps(),
            });
        }
        self.shape_a.ensure_non_empty("shape_a")?;
        self.shape_b.ensure_non_empty("shape_b")?;
        if self.nb_output == 0 {
            return Err(CoreError::InvalidShape("nb_output must be positive".into()));
        }
        Ok(())
    }

    /// Describe the layer graph without allocating weights.
    pub fn architecture(&self) -> Result<ModelArchitecture> {
        self.validate()?;
        Ok(self.describe())
    }

    fn describe(&self) -> ModelArchitecture {
        let mut arch = ArchitectureBuilder::new("cnn_model_2in");

        let mut branches = Vec::with_capacity(2);
        for (suffix, shape) in [("a", self.shape_a), ("b", self.shape_b)] {
            let x = arch.input(&format!("input_{suffix}"), shape.channels_first());
            let x = arch.batch_norm(&format!("batch_norm_{suffix}"), &x);
            let x = arch.conv2d(&format!("conv2d_{suffix}"), &x, CNN2IN_FILTERS, CNN2IN_KERNEL);
            let x = arch.reshape(
                &format!("reshape_{suffix}"),
                &x,
                vec![CNN2IN_FILTERS, shape.flat_len()],
            );
            branches.push(arch.lstm(&format!("lstm_{suffix}"), &x, CNN2IN_BRANCH_UNITS, true));
        }

        let x = arch.concatenate("concatenate", &[&branches[0], &branches[1]], 1);
        let x = arch.lstm("lstm_1", &x, CNN2IN_HEAD_UNITS[0], true);
        let x = arch.lstm("lstm_2", &x, CNN2IN_HEAD_UNITS[1], false);
        let x = arch.dense("output", &x, self.nb_output);
        arch.finish(&x, self.activation)
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<Cnn2In<B>> {
        Cnn2In::new(self.clone(), device)
    }
}

/// One primary branch: norm, conv, reshape, LSTM.
#[derive(Module, Debug)]
struct Branch<B: Backend> {
    norm: FeatureNorm2d<B>,
    conv: ConvBlock<B>,
    lstm: Lstm<B>,
}

impl<B: Backend> Branch<B> {
    fn new(shape: InputShape, device: &B::Device) -> Self {
        Self {
            norm: FeatureNorm2d::new(shape.features(), device),
            conv: ConvBlock::new(1, CNN2IN_FILTERS, CNN2IN_KERNEL, device),
            lstm: lstm(shape.flat_len(), CNN2IN_BRANCH_UNITS, device),
        }
    }

    /// `(B, 1, T, F) -> (B, 16, 64)`.
    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 3> {
        let x = self.conv.forward(self.norm.forward(x));
        let [batch, filters, timesteps, features] = x.dims();
        let x = x.reshape([batch, filters, timesteps * features]);
        let (seq, _) = self.lstm.forward(x, None);
        seq
    }
}

/// Two-input CNN/LSTM model.
///
/// # Architecture
///
/// ```text
/// input_a (B, 1, T, Fa)             input_b (B, 1, T, Fb)
///   BatchNorm (per feature)           BatchNorm (per feature)
///   Conv2d 16 (3x1) + ReLU            Conv2d 16 (3x1) + ReLU
///   Reshape (B, 16, T*Fa)             Reshape (B, 16, T*Fb)
///   LSTM 64 -> (B, 16, 64)            LSTM 64 -> (B, 16, 64)
///                 \                  /
///                  Concat -> (B, 16, 128)
///                  LSTM 96 -> (B, 16, 96)
///                  LSTM 32 -> (B, 32)
///                  Dense nb_output + activation
/// ```
///
/// # Example
///
/// ```rust,ignore
/// use mas_models::cnn_model_2in;
///
/// let model = cnn_model_2in::<NdArray>((50, 9), (50, 4), 3, Activation::Softmax, &device)?;
/// let probs = model.forward(candles, depth);
/// // probs shape: [batch, 3]
/// ```
#[derive(Module, Debug)]
pub struct Cnn2In<B: Backend> {
    branch_a: Branch<B>,
    branch_b: Branch<B>,
    lstm_1: Lstm<B>,
    lstm_2: Lstm<B>,
    output: Linear<B>,
    config: Ignored<Cnn2InConfig>,
}

impl<B: Backend> Cnn2In<B> {
    /// Create a new model.
    ///
    /// # Errors
    ///
    /// Fails before any layer is built when the config is invalid.
    pub fn new(config: Cnn2InConfig, device: &B::Device) -> Result<Self> {
        config.validate()?;
        tracing::debug!(
            "Building cnn_model_2in: shape_a={}, shape_b={}, nb_output={}, activation={}",
            config.shape_a,
            config.shape_b,
            config.nb_output,
            config.activation
        );

        let branch_units = 2 * CNN2IN_BRANCH_UNITS;
        Ok(Self {
            branch_a: Branch::new(config.shape_a, device),
            branch_b: Branch::new(config.shape_b, device),
            lstm_1: lstm(branch_units, CNN2IN_HEAD_UNITS[0], device),
            lstm_2: lstm(CNN2IN_HEAD_UNITS[0], CNN2IN_HEAD_UNITS[1], device),
            output: dense(CNN2IN_HEAD_UNITS[1], config.nb_output, device),
            config: Ignored(config),
        })
    }

    /// The config this model was built from.
    pub fn config(&self) -> &Cnn2InConfig {
        &self.config
    }

    /// Describe the layer graph of this model.
    pub fn architecture(&self) -> ModelArchitecture {
        self.config.describe()
    }

    /// Forward pass returning pre-activation outputs.
    pub fn forward_logits(&self, input_a: Tensor<B, 4>, input_b: Tensor<B, 4>) -> Tensor<B, 2> {
        let a = self.branch_a.forward(input_a);
        let b = self.branch_b.forward(input_b);

        let x = Tensor::cat(vec![a, b], 2);
        let (x, _) = self.lstm_1.forward(x, None);
        let (x, _) = self.lstm_2.forward(x, None);
        self.output.forward(last_step(x))
    }

    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// * `input_a` - `(batch, 1, timesteps, features_a)`
    /// * `input_b` - `(batch, 1, timesteps, features_b)`
    ///
    /// # Returns
    ///
    /// `(batch, nb_output)` after the configured activation.
    pub fn forward(&self, input_a: Tensor<B, 4>, input_b: Tensor<B, 4>) -> Tensor<B, 2> {
        self.config
            .activation
            .apply(self.forward_logits(input_a, input_b))
    }
}

/// Build a [`Cnn2In`] model.
///
/// `shape_a` and `shape_b` are `(timesteps, features)` and must share their
/// timestep count.
pub fn cnn_model_2in<B: Backend>(
    shape_a: impl Into<InputShape>,
    shape_b: impl Into<InputShape>,
    nb_output: usize,
    activation: Activation,
    device: &B::Device,
) -> Result<Cnn2In<B>> {
    Cnn2InConfig::new(shape_a, shape_b, nb_output)
        .with_activation(activation)
        .init(device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::LayerKind;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_cnn2in_config_default() {
        let config = Cnn2InConfig::default();
        assert_eq!(config.shape_a, InputShape::new(50, 9));
        assert_eq!(config.shape_b, InputShape::new(50, 4));
        assert_eq!(config.nb_output, 3);
        assert_eq!(config.activation, Activation::Softmax);
    }

    #[test]
    fn test_cnn2in_rejects_timestep_mismatch() {
        let config = Cnn2InConfig::new((50, 9), (40, 4), 3);
        assert!(matches!(
            config.validate(),
            Err(CoreError::TimestepMismatch { a: 50, b: 40 })
        ));
        let device = Default::default();
        assert!(config.init::<TestBackend>(&device).is_err());
    }

    #[test]
    fn test_cnn2in_rejects_empty_shapes() {
        assert!(matches!(
            Cnn2InConfig::new((50, 0), (50, 4), 3).validate(),
            Err(CoreError::InvalidShape(_))
        ));
        assert!(matches!(
            Cnn2InConfig::new((50, 9), (50, 4), 0).validate(),
            Err(CoreError::InvalidShape(_))
        ));
    }

    #[test]
    fn test_cnn2in_architecture() {
        let arch = Cnn2InConfig::new((50, 9), (50, 4), 3).architecture().unwrap();

        assert_eq!(arch.inputs.len(), 2);
        assert_eq!(arch.input("input_a").unwrap().shape.to_string(), "(None, 1, 50, 9)");
        assert_eq!(arch.input("input_b").unwrap().shape.to_string(), "(None, 1, 50, 4)");
        assert_eq!(arch.output_shape().to_string(), "(None, 3)");

        assert_eq!(arch.layer("reshape_a").unwrap().output_shape.dims(), &[16, 450]);
        assert_eq!(arch.layer("concatenate").unwrap().output_shape.dims(), &[16, 128]);
        assert_eq!(arch.layer("lstm_1").unwrap().output_shape.dims(), &[16, 96]);
        assert_eq!(arch.layer("lstm_2").unwrap().output_shape.dims(), &[32]);
        assert_eq!(arch.layer("output").unwrap().kind, LayerKind::Dense);
    }

    #[test]
    fn test_cnn2in_activation_only_changes_output() {
        let softmax = Cnn2InConfig::new((50, 9), (50, 4), 3).architecture().unwrap();
        let sigmoid = Cnn2InConfig::new((50, 9), (50, 4), 3)
            .with_activation(Activation::Sigmoid)
            .architecture()
            .unwrap();

        assert_eq!(softmax.layers, sigmoid.layers);
        assert_eq!(softmax.activation, Activation::Softmax);
        assert_eq!(sigmoid.activation, Activation::Sigmoid);
    }

    #[test]
    fn test_cnn2in_forward() {
        let device = Default::default();
        let model = cnn_model_2in::<TestBackend>((12, 3), (12, 2), 4, Activation::Softmax, &device)
            .unwrap();

        let a = Tensor::<TestBackend, 4>::ones([2, 1, 12, 3], &device);
        let b = Tensor::<TestBackend, 4>::ones([2, 1, 12, 2], &device);
        let out = model.forward(a, b);
        assert_eq!(out.dims(), [2, 4]);

        let sums: Vec<f32> = out.sum_dim(1).into_data().to_vec().unwrap();
        for sum in sums {
            assert!((sum - 1.0).abs() < 1e-4);
        }
    }
}
