//! # mas_core
//!
//! Core types shared by the market-analysis model zoo.
//!
//! This crate provides:
//! - [`InputShape`] for the `(timesteps, features)` description of an input branch
//! - [`TensorShape`] for batch-agnostic tensor shapes, printed as `(None, ...)`
//! - [`Activation`] for the output activation of a model head
//! - Error types shared by model construction
//!
//! ## Shape Convention
//!
//! Primary inputs are fed channels-first as `(B, 1, T, F)`:
//! - `B`: Batch size
//! - `1`: A single input channel
//! - `T`: Timesteps (or order book depth)
//! - `F`: Features per timestep
//!
//! ## Example
//!
//! ```rust
//! use mas_core::{Activation, InputShape};
//!
//! let shape = InputShape::new(50, 9);
//! assert_eq!(shape.channels_first().to_string(), "(None, 1, 50, 9)");
//! assert_eq!("softmax".parse::<Activation>().unwrap(), Activation::Softmax);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod activation;
mod error;
mod shape;

pub use activation::Activation;
pub use error::{CoreError, Result};
pub use shape::{InputShape, TensorShape};

