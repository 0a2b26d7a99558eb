//! Architecture and weight persistence.
//!
//! Architectures are written as pretty JSON next to the path given
//! (`<path>.json`), weights through Burn's record system as named
//! MessagePack (`<path>.mpk`).
//!
//! # Example
//!
//! ```rust,ignore
//! use mas_models::checkpoint::{save_model_arch, save_model};
//!
//! let model = Cnn2InConfig::default().init::<NdArray>(&device)?;
//! save_model_arch(&model.architecture(), "models/cnn2in")?; // models/cnn2in.json
//! save_model(&model, "models/cnn2in")?;                     // models/cnn2in.mpk
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};

use crate::summary::ModelArchitecture;

/// Extension of architecture files.
pub const ARCH_EXTENSION: &str = "json";

/// Result type for checkpoint operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Checkpoint-related errors.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Error saving checkpoint.
    #[error("Failed to save checkpoint: {0}")]
    Save(String),

    /// Error loading checkpoint.
    #[error("Failed to load checkpoint: {0}")]
    Load(String),
}

fn recorder() -> NamedMpkFileRecorder<FullPrecisionSettings> {
    NamedMpkFileRecorder::<FullPrecisionSettings>::new()
}

/// `<path>.json`, unless the path already carries the extension.
fn arch_path(path: &Path) -> PathBuf {
    if path.extension().is_some_and(|ext| ext == ARCH_EXTENSION) {
        return path.to_path_buf();
    }
    let mut os: OsString = path.as_os_str().to_owned();
    os.push(".");
    os.push(ARCH_EXTENSION);
    PathBuf::from(os)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| CheckpointError::Save(e.to_string()))?;
    }
    Ok(())
}

/// Save a model architecture as JSON.
///
/// Writes `<path>.json` and returns the written path. Missing parent
/// directories are created.
pub fn save_model_arch(arch: &ModelArchitecture, path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = arch_path(path.as_ref());
    ensure_parent(&path)?;

    let json =
        serde_json::to_string_pretty(arch).map_err(|e| CheckpointError::Save(e.to_string()))?;
    std::fs::write(&path, json).map_err(|e| CheckpointError::Save(e.to_string()))?;

    tracing::info!("Saved architecture '{}' to {:?}", arch.name, path);
    Ok(path)
}

/// Load a model architecture written by [`save_model_arch`].
///
/// Accepts the same path given to `save_model_arch`, with or without the
/// `.json` extension.
pub fn load_model_arch(path: impl AsRef<Path>) -> Result<ModelArchitecture> {
    let path = arch_path(path.as_ref());
    let json =
        std::fs::read_to_string(&path).map_err(|e| CheckpointError::Load(e.to_string()))?;
    serde_json::from_str(&json).map_err(|e| CheckpointError::Load(e.to_string()))
}

/// Save model weights to `<path>.mpk`.
pub fn save_model<B, M>(model: &M, path: impl AsRef<Path>) -> Result<()>
where
    B: Backend,
    M: Module<B>,
{
    let path = path.as_ref();
    ensure_parent(path)?;

    model
        .clone()
        .save_file(path.to_path_buf(), &recorder())
        .map_err(|e| CheckpointError::Save(e.to_string()))?;

    tracing::info!("Saved {} parameters to {:?}", model.num_params(), path);
    Ok(())
}

/// Load weights from `<path>.mpk` into an existing model.
pub fn load_model<B, M>(model: M, path: impl AsRef<Path>, device: &B::Device) -> Result<M>
where
    B: Backend,
    M: Module<B>,
{
    model
        .load_file(path.as_ref().to_path_buf(), &recorder(), device)
        .map_err(|e| CheckpointError::Load(e.to_string()))
}

/// Load the weight record stored at `<path>.mpk`.
///
/// The record can be applied to a freshly built model with
/// [`Module::load_record`], e.g. after rebuilding it from a saved
/// architecture's config.
pub fn load_record<B, M>(path: impl AsRef<Path>, device: &B::Device) -> Result<M::Record>
where
    B: Backend,
    M: Module<B>,
{
    let path = path.as_ref();
    let record = Recorder::<B>::load::<M::Record>(&recorder(), path.to_path_buf(), device)
        .map_err(|e| CheckpointError::Load(e.to_string()))?;

    tracing::debug!("Loaded record from {:?}", path);
    Ok(record)
}

/// Extension trait for models to add checkpoint methods.
pub trait ModelCheckpoint<B: Backend>: Module<B> {
    /// Save the model weights.
    fn save_checkpoint(&self, path: impl AsRef<Path>) -> Result<()> {
        save_model::<B, Self>(self, path)
    }

    /// Load weights into a copy of this model.
    fn load_checkpoint(&self, path: impl AsRef<Path>, device: &B::Device) -> Result<Self>
    where
        Self: Sized,
    {
        load_model::<B, Self>(self.clone(), path, device)
    }
}

// Implement for all modules
impl<B: Backend, M: Module<B>> ModelCheckpoint<B> for M {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Cnn2In, Cnn2InConfig};
    use burn_ndarray::NdArray;

    #[test]
    fn test_arch_path() {
        assert_eq!(arch_path(Path::new("models/cnn2in")), PathBuf::from("models/cnn2in.json"));
        assert_eq!(arch_path(Path::new("cnn2in.json")), PathBuf::from("cnn2in.json"));
        assert_eq!(arch_path(Path::new("v1.2/model")), PathBuf::from("v1.2/model.json"));
    }

    #[test]
    fn test_save_and_load_arch() {
        let dir = tempfile::tempdir().unwrap();
        let arch = Cnn2InConfig::default().architecture().unwrap();

        let written = save_model_arch(&arch, dir.path().join("nested").join("cnn2in")).unwrap();
        assert!(written.ends_with("nested/cnn2in.json"));
        assert!(written.exists());

        let restored = load_model_arch(dir.path().join("nested").join("cnn2in")).unwrap();
        assert_eq!(restored, arch);
    }

    #[test]
    fn test_load_missing_record() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_record::<NdArray<f32>, Cnn2In<NdArray<f32>>>(
            dir.path().join("missing"),
            &Default::default(),
        );
        assert!(matches!(result, Err(CheckpointError::Load(_))));
    }

    #[test]
    fn test_load_missing_arch() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_model_arch(dir.path().join("missing")),
            Err(CheckpointError::Load(_))
        ));
    }
}
