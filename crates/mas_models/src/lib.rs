//! # mas_models
//!
//! Multi-input CNN/LSTM architectures for the market-analysis exchange bot.
//!
//! ## Models
//! - [`Cnn2In`] - two primary inputs, conv + LSTM branches, stacked LSTM head
//! - [`Cnn2InFeedback`] - deeper conv branch, recurrent branch and a feedback input
//!
//! Both are built from a config (or the [`cnn_model_2in`] and
//! [`cnn_model_2in_with_feedback`] factories) and describe their layer graph
//! through [`ModelArchitecture`], which can be printed as a summary or saved
//! with [`save_model_arch`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use mas_models::{cnn_model_2in, save_model_arch};
//!
//! let model = cnn_model_2in::<NdArray>((50, 9), (50, 4), 3, Activation::Softmax, &device)?;
//! save_model_arch(&model.architecture(), "models/cnn2in")?;
//! println!("{}", model.architecture());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checkpoint;
pub mod cnn;
pub mod registry;
pub mod summary;

pub use checkpoint::{
    load_model, load_model_arch, load_record, save_model, save_model_arch, CheckpointError,
    ModelCheckpoint,
};
pub use cnn::*;
pub use registry::{default_registry, MarketModel, ModelRegistry, RegistryError};
pub use summary::{InputSpec, LayerKind, LayerSummary, ModelArchitecture};
