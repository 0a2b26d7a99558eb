//! Output activations for model heads.

use std::str::FromStr;

use burn::prelude::*;
use burn::tensor::activation;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Activation applied by the final dense layer of a model.
///
/// Names follow the Keras spelling, so JSON configs use `"softmax"`,
/// `"sigmoid"` and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    /// Softmax over the class axis (multi-class classification).
    #[default]
    Softmax,
    /// Element-wise logistic sigmoid.
    Sigmoid,
    /// Rectified linear unit.
    Relu,
    /// Hyperbolic tangent.
    Tanh,
    /// Softplus, `ln(1 + e^x)`.
    Softplus,
    /// Identity (raw regression output or logits).
    Linear,
}

impl Activation {
    /// All supported activations.
    pub const ALL: [Activation; 6] = [
        Self::Softmax,
        Self::Sigmoid,
        Self::Relu,
        Self::Tanh,
        Self::Softplus,
        Self::Linear,
    ];

    /// Keras name of the activation.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Softmax => "softmax",
            Self::Sigmoid => "sigmoid",
            Self::Relu => "relu",
            Self::Tanh => "tanh",
            Self::Softplus => "softplus",
            Self::Linear => "linear",
        }
    }

    /// Apply the activation to a `(batch, outputs)` tensor.
    pub fn apply<B: Backend>(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        match self {
            Self::Softmax => activation::softmax(x, 1),
            Self::Sigmoid => activation::sigmoid(x),
            Self::Relu => activation::relu(x),
            Self::Tanh => activation::tanh(x),
            Self::Softplus => activation::softplus(x, 1.0),
            Self::Linear => x,
        }
    }
}

impl std::fmt::Display for Activation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Activation {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|act| act.name() == lower)
            .ok_or_else(|| CoreError::UnknownActivation(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_default_is_softmax() {
        assert_eq!(Activation::default(), Activation::Softmax);
    }

    #[test]
    fn test_parse_names() {
        for act in Activation::ALL {
            assert_eq!(act.name().parse::<Activation>().unwrap(), act);
        }
        assert_eq!(" Sigmoid ".parse::<Activation>().unwrap(), Activation::Sigmoid);
        assert!(matches!(
            "swish".parse::<Activation>(),
            Err(CoreError::UnknownActivation(name)) if name == "swish"
        ));
    }

    #[test]
    fn test_serde_uses_keras_names() {
        let json = serde_json::to_string(&Activation::Tanh).unwrap();
        assert_eq!(json, "\"tanh\"");
        let act: Activation = serde_json::from_str("\"linear\"").unwrap();
        assert_eq!(act, Activation::Linear);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 2>::from_floats([[1.0, 2.0, 3.0], [0.0, 0.0, 0.0]], &device);
        let sums: Vec<f32> = Activation::Softmax
            .apply(x)
            .sum_dim(1)
            .into_data()
            .to_vec()
            .unwrap();
        for sum in sums {
            assert!((sum - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_linear_is_identity() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 2>::from_floats([[-1.5, 2.0]], &device);
        let out: Vec<f32> = Activation::Linear.apply(x).into_data().to_vec().unwrap();
        assert_eq!(out, vec![-1.5, 2.0]);
    }

    #[test]
    fn test_relu_clamps_negatives() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 2>::from_floats([[-1.0, 0.5]], &device);
        let out: Vec<f32> = Activation::Relu.apply(x).into_data().to_vec().unwrap();
        assert_eq!(out, vec![0.0, 0.5]);
    }
}
