//! Building blocks shared by the market CNN architectures.

use burn::nn::{
    conv::{Conv2d, Conv2dConfig},
    lstm::{Lstm, LstmConfig},
    BatchNorm, BatchNormConfig, Initializer, Linear, LinearConfig, PaddingConfig2d, Relu,
};
use burn::prelude::*;

/// Glorot/Xavier uniform, used for every kernel in the zoo.
pub(crate) fn glorot_uniform() -> Initializer {
    Initializer::XavierUniform { gain: 1.0 }
}

/// Running-statistics update rate of every batch norm (Keras momentum 0.99).
pub const NORM_MOMENTUM: f64 = 0.01;

/// Variance epsilon of every batch norm, as in Keras.
pub const NORM_EPSILON: f64 = 1e-3;

fn batch_norm<B: Backend, const D: usize>(
    features: usize,
    device: &B::Device,
) -> BatchNorm<B, D> {
    BatchNormConfig::new(features)
        .with_momentum(NORM_MOMENTUM)
        .with_epsilon(NORM_EPSILON)
        .init(device)
}

/// Batch normalization over the feature (last) axis of a `(B, 1, T, F)` input.
///
/// Burn normalizes over axis 1, so the feature axis is swapped into place
/// and back around the norm.
#[derive(Module, Debug)]
pub struct FeatureNorm2d<B: Backend> {
    bn: BatchNorm<B, 2>,
}

impl<B: Backend> FeatureNorm2d<B> {
    /// Create a norm over `features` channels.
    pub fn new(features: usize, device: &B::Device) -> Self {
        Self {
            bn: batch_norm(features, device),
        }
    }

    /// `(B, C, T, F) -> (B, C, T, F)`.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(x.swap_dims(1, 3)).swap_dims(1, 3)
    }
}

/// Batch normalization over the last axis of a `(B, 1, F)` input.
#[derive(Module, Debug)]
pub struct FeatureNorm1d<B: Backend> {
    bn: BatchNorm<B, 1>,
}

impl<B: Backend> FeatureNorm1d<B> {
    /// Create a norm over `features` channels.
    pub fn new(features: usize, device: &B::Device) -> Self {
        Self {
            bn: batch_norm(features, device),
        }
    }

    /// `(B, C, F) -> (B, C, F)`.
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        self.bn.forward(x.swap_dims(1, 2)).swap_dims(1, 2)
    }
}

/// Channels-first 2D convolution along the time axis with ReLU.
///
/// The kernel is `(kernel_size, 1)` with same padding, so only the time axis
/// is mixed and both spatial sizes are preserved.
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv: Conv2d<B>,
}

impl<B: Backend> ConvBlock<B> {
    /// Create a conv block. `kernel_size` must be odd for same padding.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        device: &B::Device,
    ) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [kernel_size, 1])
            .with_padding(PaddingConfig2d::Same)
            .with_initializer(glorot_uniform())
            .init(device);
        Self { conv }
    }

    /// `(B, C_in, T, F) -> (B, C_out, T, F)`.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        Relu::new().forward(self.conv.forward(x))
    }
}

/// Create an LSTM with Glorot-initialized gates.
pub(crate) fn lstm<B: Backend>(d_input: usize, d_hidden: usize, device: &B::Device) -> Lstm<B> {
    LstmConfig::new(d_input, d_hidden, true)
        .with_initializer(glorot_uniform())
        .init(device)
}

/// Create a dense layer with a Glorot-initialized kernel.
pub(crate) fn dense<B: Backend>(d_input: usize, d_output: usize, device: &B::Device) -> Linear<B> {
    LinearConfig::new(d_input, d_output)
        .with_initializer(glorot_uniform())
        .init(device)
}

/// Take the last step of a `(B, L, H)` sequence: `(B, H)`.
pub(crate) fn last_step<B: Backend>(output: Tensor<B, 3>) -> Tensor<B, 2> {
    let [batch, seq_len, hidden] = output.dims();
    output
        .slice([0..batch, (seq_len - 1)..seq_len, 0..hidden])
        .reshape([batch, hidden])
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_feature_norm_2d_preserves_shape() {
        let device = Default::default();
        let norm = FeatureNorm2d::<TestBackend>::new(9, &device);
        let x = Tensor::<TestBackend, 4>::ones([2, 1, 50, 9], &device);
        assert_eq!(norm.forward(x).dims(), [2, 1, 50, 9]);
    }

    #[test]
    fn test_fresh_feature_norm_uses_keras_epsilon() {
        let device = Default::default();
        let norm = FeatureNorm2d::<TestBackend>::new(3, &device);
        let x = Tensor::<TestBackend, 4>::from_floats([[[[1.0, -2.0, 4.0]]]], &device);
        let out: Vec<f32> = norm.forward(x).into_data().to_vec().unwrap();

        let scale = 1.0 / (1.0 + NORM_EPSILON as f32).sqrt();
        for (actual, input) in out.iter().zip([1.0f32, -2.0, 4.0]) {
            assert!((actual - input * scale).abs() < 1e-6);
        }

        let norm = FeatureNorm1d::<TestBackend>::new(2, &device);
        let x = Tensor::<TestBackend, 3>::from_floats([[[10.0, -10.0]]], &device);
        let out: Vec<f32> = norm.forward(x).into_data().to_vec().unwrap();
        assert!((out[0] - 10.0 * scale).abs() < 1e-5);
        assert!((out[1] + 10.0 * scale).abs() < 1e-5);
    }

    #[test]
    fn test_feature_norm_1d_preserves_shape() {
        let device = Default::default();
        let norm = FeatureNorm1d::<TestBackend>::new(8, &device);
        let x = Tensor::<TestBackend, 3>::ones([3, 1, 8], &device);
        assert_eq!(norm.forward(x).dims(), [3, 1, 8]);
    }

    #[test]
    fn test_conv_block_same_padding() {
        let device = Default::default();
        let block = ConvBlock::<TestBackend>::new(1, 16, 5, &device);
        let x = Tensor::<TestBackend, 4>::ones([2, 1, 50, 4], &device);
        let out = block.forward(x);
        assert_eq!(out.dims(), [2, 16, 50, 4]);
        let min: f32 = out.min().into_scalar();
        assert!(min >= 0.0);
    }

    #[test]
    fn test_last_step() {
        let device = Default::default();
        let seq = Tensor::<TestBackend, 3>::from_floats(
            [[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]],
            &device,
        );
        let last: Vec<f32> = last_step(seq).into_data().to_vec().unwrap();
        assert_eq!(last, vec![5.0, 6.0]);
    }
}
