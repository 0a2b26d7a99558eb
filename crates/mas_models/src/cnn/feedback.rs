//! Cnn2InFeedback: two-branch CNN/LSTM model with a feedback input.
//!
//! Extends the two-input design with a deeper convolutional stack on
//! `input_a`, a recurrent branch on the flattened `input_b`, and a third
//! `input_feedback` carrying an auxiliary signal such as the previous
//! prediction of the bot.

use burn::module::Ignored;
use burn::nn::{
    lstm::Lstm,
    pool::{MaxPool2d, MaxPool2dConfig},
    Dropout, DropoutConfig, Linear, Relu,
};
use burn::prelude::*;
use mas_core::{Activation, CoreError, InputShape, Result, TensorShape};
use serde::{Deserialize, Serialize};

use super::blocks::{dense, last_step, lstm, ConvBlock, FeatureNorm1d, FeatureNorm2d};
use crate::summary::{ArchitectureBuilder, ModelArchitecture};

/// Conv filters of the `input_a` stack.
pub const FEEDBACK_FILTERS: [usize; 3] = [16, 32, 64];
/// Conv kernel lengths of the `input_a` stack.
pub const FEEDBACK_KERNELS: [usize; 3] = [5, 3, 3];
/// Time pooling window and stride.
pub const FEEDBACK_POOL: usize = 2;
/// Width of the dense layers closing the primary branches.
pub const FEEDBACK_BRANCH_UNITS: usize = 64;
/// Widths of the stacked LSTM head.
pub const FEEDBACK_HEAD_UNITS: [usize; 2] = [96, 32];
/// LSTM width of the feedback branch.
pub const FEEDBACK_FB_UNITS: usize = 32;
/// Width of the linear layer before the output.
pub const FEEDBACK_MERGE_UNITS: usize = 10;
/// Dropout rate used after every branch.
pub const FEEDBACK_DROPOUT: f64 = 0.2;

/// Configuration for the [`Cnn2InFeedback`] model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cnn2InFeedbackConfig {
    /// Shape `(timesteps, features)` of `input_a`.
    pub shape_a: InputShape,
    /// Shape `(timesteps, features)` of `input_b`.
    pub shape_b: InputShape,
    /// Width of the feedback vector.
    pub shape_fb: usize,
    /// Number of output classes.
    pub nb_output: usize,
    /// Activation of the output layer.
    #[serde(default)]
    pub activation: Activation,
}

impl Default for Cnn2InFeedbackConfig {
    fn default() -> Self {
        Self {
            shape_a: InputShape::new(50, 9),
            shape_b: InputShape::new(50, 4),
            shape_fb: 8,
            nb_output: 3,
            activation: Activation::Softmax,
        }
    }
}

impl Cnn2InFeedbackConfig {
    /// Create a new config with a softmax output.
    pub fn new(
        shape_a: impl Into<InputShape>,
        shape_b: impl Into<InputShape>,
        shape_fb: usize,
        nb_output: usize,
    ) -> Self {
        Self {
            shape_a: shape_a.into(),
            shape_b: shape_b.into(),
            shape_fb,
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

    /// Timesteps of `input_a` left after both poolings.
    fn pooled_timesteps(&self) -> usize {
        self.shape_a.timesteps() / (FEEDBACK_POOL * FEEDBACK_POOL)
    }

    /// Check the shape invariants.
    ///
    /// # Errors
    ///
    /// [`CoreError::TimestepMismatch`] when the primary inputs differ in
    /// timesteps, [`CoreError::InvalidShape`] for empty shapes, fewer than
    /// four timesteps (nothing survives the poolings) or no outputs.
    pub fn validate(&self) -> Result<()> {
        if self.shape_a.timesteps() != self.shape_b.timesteps() {
            return Err(CoreError::TimestepMismatch {
                a: self.shape_a.timesteps(),
                b: self.shape_b.timesteps(),
            });
        }
        self.shape_a.ensure_non_empty("shape_a")?;
        self.shape_b.ensure_non_empty("shape_b")?;
        if self.pooled_timesteps() == 0 {
            return Err(CoreError::InvalidShape(format!(
                "shape_a needs at least {} timesteps, got {}",
                FEEDBACK_POOL * FEEDBACK_POOL,
                self.shape_a.timesteps()
            )));
        }
        if self.shape_fb == 0 {
            return Err(CoreError::InvalidShape("shape_fb must be positive".into()));
        }
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
        let mut arch = ArchitectureBuilder::new("cnn_model_2in_with_feedback");
        let [f1, f2, f3] = FEEDBACK_FILTERS;
        let [k1, k2, k3] = FEEDBACK_KERNELS;

        let a = arch.input("input_a", self.shape_a.channels_first());
        let a = arch.batch_norm("batch_norm_a", &a);
        let a = arch.conv2d("conv2d_a1", &a, f1, k1);
        let a = arch.conv2d("conv2d_a2", &a, f2, k2);
        let a = arch.max_pool2d("max_pool_a1", &a, FEEDBACK_POOL);
        let a = arch.conv2d("conv2d_a3", &a, f3, k3);
        let a = arch.max_pool2d("max_pool_a2", &a, FEEDBACK_POOL);
        let a = arch.reshape(
            "reshape_a",
            &a,
            vec![f3, self.pooled_timesteps() * self.shape_a.features()],
        );
        let a = arch.dense("dense_a", &a, FEEDBACK_BRANCH_UNITS);
        let a = arch.dropout("dropout_a", &a);

        let b = arch.input("input_b", self.shape_b.channels_first());
        let b = arch.batch_norm("batch_norm_b", &b);
        let b = arch.reshape("reshape_b", &b, vec![1, self.shape_b.flat_len()]);
        let b = arch.lstm("lstm_b", &b, FEEDBACK_BRANCH_UNITS, true);
        let b = arch.dense("dense_b", &b, FEEDBACK_BRANCH_UNITS);
        let b = arch.dropout("dropout_b", &b);

        let x = arch.concatenate("concatenate_ab", &[&a, &b], 0);
        let x = arch.lstm("lstm_1", &x, FEEDBACK_HEAD_UNITS[0], true);
        let x = arch.lstm("lstm_2", &x, FEEDBACK_HEAD_UNITS[1], false);
        let x = arch.dropout("dropout_x", &x);

        let fb = arch.input("input_feedback", TensorShape::new(vec![1, self.shape_fb]));
        let fb = arch.batch_norm("batch_norm_feedback", &fb);
        let fb = arch.lstm("lstm_feedback", &fb, FEEDBACK_FB_UNITS, false);
        let fb = arch.dropout("dropout_feedback", &fb);

        let x = arch.concatenate("concatenate_feedback", &[&x, &fb], 0);
        let x = arch.dense("dense_merge", &x, FEEDBACK_MERGE_UNITS);
        let x = arch.dense("output", &x, self.nb_output);
        arch.finish(&x, self.activation)
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<Cnn2InFeedback<B>> {
        Cnn2InFeedback::new(self.clone(), device)
    }
}

/// Two-input CNN/LSTM model with a feedback branch.
///
/// # Architecture
///
/// ```text
/// input_a (B, 1, T, Fa)          input_b (B, 1, T, Fb)        input_feedback (B, 1, Ffb)
///   BatchNorm                      BatchNorm                    BatchNorm
///   Conv2d 16 (5x1) + ReLU         Reshape (B, 1, T*Fb)         LSTM 32 -> (B, 32)
///   Conv2d 32 (3x1) + ReLU         LSTM 64 -> (B, 1, 64)        Dropout
///   MaxPool (2x1)                  Dense 64 + ReLU                  |
///   Conv2d 64 (3x1) + ReLU         Dropout                          |
///   MaxPool (2x1)                     |                             |
///   Reshape (B, 64, T/4*Fa)           |                             |
///   Dense 64 + ReLU, Dropout          |                             |
///            \                       /                              |
///             Concat axis 1 -> (B, 65, 64)                          |
///             LSTM 96 -> LSTM 32 -> Dropout                         |
///                          \                                       /
///                           Concat -> (B, 64) -> Dense 10 -> Dense nb_output
/// ```
#[derive(Module, Debug)]
pub struct Cnn2InFeedback<B: Backend> {
    norm_a: FeatureNorm2d<B>,
    conv_a: Vec<ConvBlock<B>>,
    pool: MaxPool2d,
    dense_a: Linear<B>,
    norm_b: FeatureNorm2d<B>,
    lstm_b: Lstm<B>,
    dense_b: Linear<B>,
    lstm_1: Lstm<B>,
    lstm_2: Lstm<B>,
    norm_fb: FeatureNorm1d<B>,
    lstm_fb: Lstm<B>,
    dense_merge: Linear<B>,
    output: Linear<B>,
    dropout: Dropout,
    config: Ignored<Cnn2InFeedbackConfig>,
}

impl<B: Backend> Cnn2InFeedback<B> {
    /// Create a new model.
    ///
    /// # Errors
    ///
    /// Fails before any layer is built when the config is invalid.
    pub fn new(config: Cnn2InFeedbackConfig, device: &B::Device) -> Result<Self> {
        config.validate()?;
        tracing::debug!(
            "Building cnn_model_2in_with_feedback: shape_a={}, shape_b={}, shape_fb={}, nb_output={}, activation={}",
            config.shape_a,
            config.shape_b,
            config.shape_fb,
            config.nb_output,
            config.activation
        );

        let mut conv_a = Vec::with_capacity(FEEDBACK_FILTERS.len());
        let mut in_channels = 1;
        for (&filters, &kernel) in FEEDBACK_FILTERS.iter().zip(&FEEDBACK_KERNELS) {
            conv_a.push(ConvBlock::new(in_channels, filters, kernel, device));
            in_channels = filters;
        }

        let pool = MaxPool2dConfig::new([FEEDBACK_POOL, 1])
            .with_strides([FEEDBACK_POOL, 1])
            .init();
        let flat_a = config.pooled_timesteps() * config.shape_a.features();

        Ok(Self {
            norm_a: FeatureNorm2d::new(config.shape_a.features(), device),
            conv_a,
            pool,
            dense_a: dense(flat_a, FEEDBACK_BRANCH_UNITS, device),
            norm_b: FeatureNorm2d::new(config.shape_b.features(), device),
            lstm_b: lstm(config.shape_b.flat_len(), FEEDBACK_BRANCH_UNITS, device),
            dense_b: dense(FEEDBACK_BRANCH_UNITS, FEEDBACK_BRANCH_UNITS, device),
            lstm_1: lstm(FEEDBACK_BRANCH_UNITS, FEEDBACK_HEAD_UNITS[0], device),
            lstm_2: lstm(FEEDBACK_HEAD_UNITS[0], FEEDBACK_HEAD_UNITS[1], device),
            norm_fb: FeatureNorm1d::new(config.shape_fb, device),
            lstm_fb: lstm(config.shape_fb, FEEDBACK_FB_UNITS, device),
            dense_merge: dense(
                FEEDBACK_HEAD_UNITS[1] + FEEDBACK_FB_UNITS,
                FEEDBACK_MERGE_UNITS,
                device,
            ),
            output: dense(FEEDBACK_MERGE_UNITS, config.nb_output, device),
            dropout: DropoutConfig::new(FEEDBACK_DROPOUT).init(),
            config: Ignored(config),
        })
    }

    /// The config this model was built from.
    pub fn config(&self) -> &Cnn2InFeedbackConfig {
        &self.config
    }

    /// Describe the layer graph of this model.
    pub fn architecture(&self) -> ModelArchitecture {
        self.config.describe()
    }

    /// Convolutional branch: `(B, 1, T, Fa) -> (B, 64, 64)`.
    fn forward_a(&self, x: Tensor<B, 4>) -> Tensor<B, 3> {
        let mut x = self.norm_a.forward(x);
        for (i, block) in self.conv_a.iter().enumerate() {
            x = block.forward(x);
            // pool after the second and third convolutions
            if i > 0 {
                x = self.pool.forward(x);
            }
        }

        let [batch, filters, timesteps, features] = x.dims();
        let x = x.reshape([batch, filters, timesteps * features]);
        let x = Relu::new().forward(self.dense_a.forward(x));
        self.dropout.forward(x)
    }

    /// Recurrent branch: `(B, 1, T, Fb) -> (B, 1, 64)`.
    fn forward_b(&self, x: Tensor<B, 4>) -> Tensor<B, 3> {
        let x = self.norm_b.forward(x);
        let [batch, _, timesteps, features] = x.dims();
        let x = x.reshape([batch, 1, timesteps * features]);
        let (x, _) = self.lstm_b.forward(x, None);
        let x = Relu::new().forward(self.dense_b.forward(x));
        self.dropout.forward(x)
    }

    /// Feedback branch: `(B, 1, Ffb) -> (B, 32)`.
    fn forward_feedback(&self, x: Tensor<B, 3>) -> Tensor<B, 2> {
        let (x, _) = self.lstm_fb.forward(self.norm_fb.forward(x), None);
        self.dropout.forward(last_step(x))
    }

    /// Forward pass returning pre-activation outputs.
    pub fn forward_logits(
        &self,
        input_a: Tensor<B, 4>,
        input_b: Tensor<B, 4>,
        input_feedback: Tensor<B, 3>,
    ) -> Tensor<B, 2> {
        let a = self.forward_a(input_a);
        let b = self.forward_b(input_b);

        let x = Tensor::cat(vec![a, b], 1);
        let (x, _) = self.lstm_1.forward(x, None);
        let (x, _) = self.lstm_2.forward(x, None);
        let x = self.dropout.forward(last_step(x));

        let fb = self.forward_feedback(input_feedback);
        let x = Tensor::cat(vec![x, fb], 1);
        self.output.forward(self.dense_merge.forward(x))
    }

    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// * `input_a` - `(batch, 1, timesteps, features_a)`
    /// * `input_b` - `(batch, 1, timesteps, features_b)`
    /// * `input_feedback` - `(batch, 1, shape_fb)`
    ///
    /// # Returns
    ///
    /// `(batch, nb_output)` after the configured activation.
    pub fn forward(
        &self,
        input_a: Tensor<B, 4>,
        input_b: Tensor<B, 4>,
        input_feedback: Tensor<B, 3>,
    ) -> Tensor<B, 2> {
        self.config
            .activation
            .apply(self.forward_logits(input_a, input_b, input_feedback))
    }
}

/// Build a [`Cnn2InFeedback`] model.
///
/// `shape_a` and `shape_b` are `(timesteps, features)` and must share their
/// timestep count; `shape_fb` is the width of the feedback vector.
pub fn cnn_model_2in_with_feedback<B: Backend>(
    shape_a: impl Into<InputShape>,
    shape_b: impl Into<InputShape>,
    shape_fb: usize,
    nb_output: usize,
    activation: Activation,
    device: &B::Device,
) -> Result<Cnn2InFeedback<B>> {
    Cnn2InFeedbackConfig::new(shape_a, shape_b, shape_fb, nb_output)
        .with_activation(activation)
        .init(device)
}
