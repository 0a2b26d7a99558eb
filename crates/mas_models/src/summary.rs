//! Architecture descriptions and Keras-style model summaries.
//!
//! A [`ModelArchitecture`] is the framework-independent view of a model:
//! named inputs, every layer with its output shape and parameter count,
//! and the output shape. It is what `save_model_arch` writes to disk and
//! what the CLI prints.

use mas_core::{Activation, TensorShape};
use serde::{Deserialize, Serialize};

/// Kind of a layer in an architecture description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerKind {
    /// Named model input.
    Input,
    /// Batch normalization.
    BatchNormalization,
    /// 2D convolution.
    Conv2d,
    /// 2D max pooling.
    MaxPool2d,
    /// Reshape without data movement.
    Reshape,
    /// Long short-term memory layer.
    Lstm,
    /// Fully connected layer.
    Dense,
    /// Dropout regularization.
    Dropout,
    /// Concatenation of several inbound layers.
    Concatenate,
}

impl std::fmt::Display for LayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Input => "InputLayer",
            Self::BatchNormalization => "BatchNormalization",
            Self::Conv2d => "Conv2D",
            Self::MaxPool2d => "MaxPooling2D",
            Self::Reshape => "Reshape",
            Self::Lstm => "LSTM",
            Self::Dense => "Dense",
            Self::Dropout => "Dropout",
            Self::Concatenate => "Concatenate",
        };
        f.write_str(name)
    }
}

/// One named model input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSpec {
    /// Input name, e.g. `input_a`.
    pub name: String,
    /// Shape with unspecified batch axis.
    pub shape: TensorShape,
}

/// One layer of an architecture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSummary {
    /// Unique layer name.
    pub name: String,
    /// Layer kind.
    pub kind: LayerKind,
    /// Output shape with unspecified batch axis.
    pub output_shape: TensorShape,
    /// Total number of scalars held by the layer.
    pub params: usize,
    /// Scalars updated by gradient descent.
    pub trainable_params: usize,
    /// Names of the layers feeding this one.
    pub inbound: Vec<String>,
}

impl LayerSummary {
    fn new(name: &str, kind: LayerKind, output_shape: TensorShape, inbound: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            kind,
            output_shape,
            params: 0,
            trainable_params: 0,
            inbound: inbound.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn with_params(mut self, params: usize, trainable_params: usize) -> Self {
        self.params = params;
        self.trainable_params = trainable_params;
        self
    }
}

/// Full description of a model graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArchitecture {
    /// Architecture name.
    pub name: String,
    /// Named inputs in call order.
    pub inputs: Vec<InputSpec>,
    /// Layers in topological order, inputs included.
    pub layers: Vec<LayerSummary>,
    /// Name of the output layer.
    pub output: String,
    /// Activation of the output layer.
    pub activation: Activation,
}

impl ModelArchitecture {
    /// Look up an input by name.
    pub fn input(&self, name: &str) -> Option<&InputSpec> {
        self.inputs.iter().find(|input| input.name == name)
    }

    /// Look up a layer by name.
    pub fn layer(&self, name: &str) -> Option<&LayerSummary> {
        self.layers.iter().find(|layer| layer.name == name)
    }

    /// Shape of the output layer.
    pub fn output_shape(&self) -> TensorShape {
        self.layer(&self.output)
            .map(|layer| layer.output_shape.clone())
            .unwrap_or_else(|| TensorShape::new(Vec::new()))
    }

    /// Total parameter count.
    pub fn total_params(&self) -> usize {
        self.layers.iter().map(|layer| layer.params).sum()
    }

    /// Trainable parameter count.
    pub fn trainable_params(&self) -> usize {
        self.layers.iter().map(|layer| layer.trainable_params).sum()
    }

    /// Non-trainable parameter count (batch norm running statistics).
    pub fn non_trainable_params(&self) -> usize {
        self.total_params() - self.trainable_params()
    }
}

impl std::fmt::Display for ModelArchitecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rule = "_".repeat(98);
        let double_rule = "=".repeat(98);

        writeln!(f, "Model: \"{}\"", self.name)?;
        writeln!(f, "{rule}")?;
        writeln!(
            f,
            "{:<34}{:<22}{:>10}  {}",
            "Layer (type)", "Output Shape", "Param #", "Connected to"
        )?;
        writeln!(f, "{double_rule}")?;
        for (i, layer) in self.layers.iter().enumerate() {
            let label = format!("{} ({})", layer.name, layer.kind);
            writeln!(
                f,
                "{:<34}{:<22}{:>10}  {}",
                label,
                layer.output_shape.to_string(),
                layer.params,
                layer.inbound.join(", ")
            )?;
            if i + 1 < self.layers.len() {
                writeln!(f, "{rule}")?;
            }
        }
        writeln!(f, "{double_rule}")?;
        writeln!(f, "Total params: {}", self.total_params())?;
        writeln!(f, "Trainable params: {}", self.trainable_params())?;
        writeln!(f, "Non-trainable params: {}", self.non_trainable_params())?;
        write!(f, "{rule}")
    }
}

/// Incremental builder used by the model configs to describe their graphs.
///
/// Parameter counts mirror the burn layers each config actually builds.
#[derive(Debug)]
pub(crate) struct ArchitectureBuilder {
    name: String,
    inputs: Vec<InputSpec>,
    layers: Vec<LayerSummary>,
}

impl ArchitectureBuilder {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            inputs: Vec::new(),
            layers: Vec::new(),
        }
    }

    fn shape_of(&self, name: &str) -> TensorShape {
        self.layers
            .iter()
            .rev()
            .find(|layer| layer.name == name)
            .map(|layer| layer.output_shape.clone())
            .unwrap_or_else(|| TensorShape::new(Vec::new()))
    }

    fn push(&mut self, layer: LayerSummary) -> String {
        let name = layer.name.clone();
        self.layers.push(layer);
        name
    }

    pub(crate) fn input(&mut self, name: &str, shape: TensorShape) -> String {
        self.inputs.push(InputSpec {
            name: name.to_string(),
            shape: shape.clone(),
        });
        self.push(LayerSummary::new(name, LayerKind::Input, shape, &[]))
    }

    /// Batch norm over the last axis: gamma and beta train, running mean and
    /// variance do not.
    pub(crate) fn batch_norm(&mut self, name: &str, from: &str) -> String {
        let shape = self.shape_of(from);
        let channels = shape.last();
        self.push(
            LayerSummary::new(name, LayerKind::BatchNormalization, shape, &[from])
                .with_params(4 * channels, 2 * channels),
        )
    }

    /// Channels-first conv with a `(kernel, 1)` kernel and same padding.
    pub(crate) fn conv2d(&mut self, name: &str, from: &str, filters: usize, kernel: usize) -> String {
        let input = self.shape_of(from);
        let dims = input.dims();
        let in_channels = dims[0];
        let shape = TensorShape::new(vec![filters, dims[1], dims[2]]);
        let params = in_channels * filters * kernel + filters;
        self.push(
            LayerSummary::new(name, LayerKind::Conv2d, shape, &[from]).with_params(params, params),
        )
    }

    /// Channels-first max pooling with a `(pool, 1)` window and stride.
    pub(crate) fn max_pool2d(&mut self, name: &str, from: &str, pool: usize) -> String {
        let input = self.shape_of(from);
        let dims = input.dims();
        let shape = TensorShape::new(vec![dims[0], dims[1] / pool, dims[2]]);
        self.push(LayerSummary::new(name, LayerKind::MaxPool2d, shape, &[from]))
    }

    pub(crate) fn reshape(&mut self, name: &str, from: &str, dims: Vec<usize>) -> String {
        self.push(LayerSummary::new(name, LayerKind::Reshape, TensorShape::new(dims), &[from]))
    }

    /// LSTM over axis 1. Burn keeps an input and a hidden bias per gate.
    pub(crate) fn lstm(&mut self, name: &str, from: &str, units: usize, return_sequences: bool) -> String {
        let input = self.shape_of(from);
        let d_input = input.last();
        let shape = if return_sequences {
            TensorShape::new(vec![input.dims()[0], units])
        } else {
            TensorShape::new(vec![units])
        };
        let params = 4 * (d_input * units + units + units * units + units);
        self.push(LayerSummary::new(name, LayerKind::Lstm, shape, &[from]).with_params(params, params))
    }

    /// Dense layer acting on the last axis.
    pub(crate) fn dense(&mut self, name: &str, from: &str, units: usize) -> String {
        let input = self.shape_of(from);
        let mut dims = input.dims().to_vec();
        let d_input = dims.pop().unwrap_or(0);
        dims.push(units);
        let params = d_input * units + units;
        self.push(
            LayerSummary::new(name, LayerKind::Dense, TensorShape::new(dims), &[from])
                .with_params(params, params),
        )
    }

    pub(crate) fn dropout(&mut self, name: &str, from: &str) -> String {
        let shape = self.shape_of(from);
        self.push(LayerSummary::new(name, LayerKind::Dropout, shape, &[from]))
    }

    /// Concatenate along a per-sample axis (0 is the first non-batch axis).
    pub(crate) fn concatenate(&mut self, name: &str, from: &[&str], axis: usize) -> String {
        let shapes: Vec<TensorShape> = from.iter().map(|name| self.shape_of(name)).collect();
        let mut dims = shapes
            .first()
            .map(|shape| shape.dims().to_vec())
            .unwrap_or_default();
        if axis < dims.len() {
            dims[axis] = shapes.iter().map(|shape| shape.dims()[axis]).sum();
        }
        self.push(LayerSummary::new(
            name,
            LayerKind::Concatenate,
            TensorShape::new(dims),
            from,
        ))
    }

    pub(crate) fn finish(self, output: &str, activation: Activation) -> ModelArchitecture {
        ModelArchitecture {
            name: self.name,
            inputs: self.inputs,
            layers: self.layers,
            output: output.to_string(),
            activation,
        }
    }
}
