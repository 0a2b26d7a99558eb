//! Input and tensor shape metadata.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Shape of one model input branch: `(timesteps, features)`.
///
/// `timesteps` is the length of the series (or the depth of an order book
/// snapshot), `features` the number of values recorded per step.
///
/// Serialized as a two element array so configs read `"shape_a": [50, 9]`.
///
/// # Example
///
/// ```rust
/// use mas_core::InputShape;
///
/// let shape = InputShape::from((50, 9));
/// assert_eq!(shape.timesteps(), 50);
/// assert_eq!(shape.features(), 9);
/// assert_eq!(shape.flat_len(), 450);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(usize, usize)", into = "(usize, usize)")]
pub struct InputShape {
    timesteps: usize,
    features: usize,
}

impl InputShape {
    /// Create a new input shape.
    #[must_use]
    pub const fn new(timesteps: usize, features: usize) -> Self {
        Self {
            timesteps,
            features,
        }
    }

    /// Number of timesteps.
    #[must_use]
    pub const fn timesteps(&self) -> usize {
        self.timesteps
    }

    /// Number of features per timestep.
    #[must_use]
    pub const fn features(&self) -> usize {
        self.features
    }

    /// Number of scalars in one sample (`timesteps * features`).
    #[must_use]
    pub const fn flat_len(&self) -> usize {
        self.timesteps * self.features
    }

    /// Check if either dimension is zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.timesteps == 0 || self.features == 0
    }

    /// Channels-first tensor shape fed to the model: `(None, 1, T, F)`.
    #[must_use]
    pub fn channels_first(&self) -> TensorShape {
        TensorShape::new(vec![1, self.timesteps, self.features])
    }

    /// Return an error naming `what` if either dimension is zero.
    pub fn ensure_non_empty(&self, what: &str) -> Result<()> {
        if self.is_empty() {
            return Err(CoreError::InvalidShape(format!(
                "{what} must have non-zero timesteps and features, got {self}"
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for InputShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.timesteps, self.features)
    }
}

impl From<(usize, usize)> for InputShape {
    fn from((timesteps, features): (usize, usize)) -> Self {
        Self::new(timesteps, features)
    }
}

impl From<InputShape> for (usize, usize) {
    fn from(shape: InputShape) -> Self {
        (shape.timesteps, shape.features)
    }
}

/// Shape of a tensor with an unspecified leading batch axis.
///
/// Only the per-sample dimensions are stored; the batch axis is printed as
/// `None`, so `TensorShape::new(vec![16, 64])` displays as `(None, 16, 64)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TensorShape {
    dims: Vec<usize>,
}

impl TensorShape {
    /// Create a shape from its per-sample dimensions.
    #[must_use]
    pub fn new(dims: Vec<usize>) -> Self {
        Self { dims }
    }

    /// Per-sample dimensions, without the batch axis.
    #[must_use]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Rank including the batch axis.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.dims.len() + 1
    }

    /// Number of scalars in one sample.
    #[must_use]
    pub fn numel(&self) -> usize {
        self.dims.iter().product()
    }

    /// Size of the last axis, 0 for a scalar shape.
    #[must_use]
    pub fn last(&self) -> usize {
        self.dims.last().copied().unwrap_or(0)
    }

    /// Full dimensions for a concrete batch size.
    #[must_use]
    pub fn with_batch(&self, batch: usize) -> Vec<usize> {
        std::iter::once(batch).chain(self.dims.iter().copied()).collect()
    }

    /// Keras-style dimensions with `None` standing for the batch axis.
    #[must_use]
    pub fn to_options(&self) -> Vec<Option<usize>> {
        std::iter::once(None)
            .chain(self.dims.iter().copied().map(Some))
            .collect()
    }
}

impl std::fmt::Display for TensorShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(None")?;
        for dim in &self.dims {
            write!(f, ", {dim}")?;
        }
        write!(f, ")")
    }
}

impl From<Vec<usize>> for TensorShape {
    fn from(dims: Vec<usize>) -> Self {
        Self::new(dims)
    }
}
