//! Model registry for dynamic model creation.
//!
//! The registry builds models by name from JSON configuration, which is
//! how the CLI selects an architecture.
//!
//! # Example
//!
//! ```rust,ignore
//! use mas_models::registry::default_registry;
//! use serde_json::json;
//!
//! let registry = default_registry::<NdArray>();
//! let config = json!({
//!     "shape_a": [50, 9],
//!     "shape_b": [50, 4],
//!     "nb_output": 3
//! });
//! let model = registry.create("cnn2in", &config, &device)?;
//! println!("{}", model.architecture());
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use burn::prelude::*;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::checkpoint::{self, save_model};
use crate::summary::ModelArchitecture;
use crate::{Cnn2In, Cnn2InConfig, Cnn2InFeedback, Cnn2InFeedbackConfig};

/// Error type for model registry operations.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Model not found in registry.
    #[error("Model '{0}' not found in registry")]
    ModelNotFound(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Model creation failed.
    #[error("Failed to create model: {0}")]
    CreationFailed(#[from] mas_core::CoreError),
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Object-safe view of a built model.
///
/// The inputs differ per architecture, so forward passes go through the
/// concrete types; this trait covers what every model shares.
pub trait MarketModel<B: Backend> {
    /// Registered name of the model.
    fn name(&self) -> &str;

    /// Layer graph of the model.
    fn architecture(&self) -> ModelArchitecture;

    /// Number of trainable parameters held by the model.
    fn num_params(&self) -> usize;

    /// Save weights to `<path>.mpk`.
    fn save_weights(&self, path: &Path) -> checkpoint::Result<()>;
}

/// Type alias for model constructor.
pub type ModelConstructor<B> =
    Arc<dyn Fn(&Value, &<B as Backend>::Device) -> Result<Box<dyn MarketModel<B>>> + Send + Sync>;

/// Registry for dynamically creating models by name.
pub struct ModelRegistry<B: Backend> {
    models: HashMap<String, ModelConstructor<B>>,
}

impl<B: Backend> Default for ModelRegistry<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> ModelRegistry<B> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            models: HashMap::new(),
        }
    }

    /// Register a model constructor under `name`.
    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(&Value, &<B as Backend>::Device) -> Result<Box<dyn MarketModel<B>>>
            + Send
            + Sync
            + 'static,
    {
        self.models.insert(name.to_string(), Arc::new(constructor));
    }

    /// Create a model by name from a JSON config.
    pub fn create(
        &self,
        name: &str,
        config: &Value,
        device: &<B as Backend>::Device,
    ) -> Result<Box<dyn MarketModel<B>>> {
        let constructor = self
            .models
            .get(name)
            .ok_or_else(|| RegistryError::ModelNotFound(name.to_string()))?;
        constructor(config, device)
    }

    /// List all registered model names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Check if a model is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }
}

/// Parse a config, treating `null` as the default config.
///
/// Missing fields are filled from the default as well, so `{"nb_output": 5}`
/// only overrides the output size.
pub fn parse_config<C>(config: &Value) -> Result<C>
where
    C: Default + serde::Serialize + DeserializeOwned,
{
    let mut merged = serde_json::to_value(C::default())
        .map_err(|e| RegistryError::InvalidConfig(e.to_string()))?;
    match (config, &mut merged) {
        (Value::Null, _) => {}
        (Value::Object(overrides), Value::Object(base)) => {
            for (key, value) in overrides {
                if !base.contains_key(key) {
                    return Err(RegistryError::InvalidConfig(format!("unknown field '{key}'")));
                }
                base.insert(key.clone(), value.clone());
            }
        }
        _ => {
            return Err(RegistryError::InvalidConfig(
                "config must be a JSON object".to_string(),
            ))
        }
    }
    serde_json::from_value(merged).map_err(|e| RegistryError::InvalidConfig(e.to_string()))
}

// ============================================================================
// MarketModel implementations for each model type
// ============================================================================

impl<B: Backend> MarketModel<B> for Cnn2In<B> {
    fn name(&self) -> &str {
        "cnn2in"
    }

    fn architecture(&self) -> ModelArchitecture {
        self.architecture()
    }

    fn num_params(&self) -> usize {
        Module::num_params(self)
    }

    fn save_weights(&self, path: &Path) -> checkpoint::Result<()> {
        save_model::<B, _>(self, path)
    }
}

impl<B: Backend> MarketModel<B> for Cnn2InFeedback<B> {
    fn name(&self) -> &str {
        "cnn2in_feedback"
    }

    fn architecture(&self) -> ModelArchitecture {
        self.architecture()
    }

    fn num_params(&self) -> usize {
        Module::num_params(self)
    }

    fn save_weights(&self, path: &Path) -> checkpoint::Result<()> {
        save_model::<B, _>(self, path)
    }
}

/// Create a registry with all built-in models.
pub fn default_registry<B: Backend>() -> ModelRegistry<B> {
    let mut registry = ModelRegistry::new();

    registry.register("cnn2in", |config, device| {
        let config: Cnn2InConfig = parse_config(config)?;
        Ok(Box::new(config.init::<B>(device)?) as Box<dyn MarketModel<B>>)
    });

    registry.register("cnn2in_feedback", |config, device| {
        let config: Cnn2InFeedbackConfig = parse_config(config)?;
        Ok(Box::new(config.init::<B>(device)?) as Box<dyn MarketModel<B>>)
    });

    registry
}
