//! mas CLI: build, summarize and save the market-analysis models.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use burn_ndarray::{NdArray, NdArrayDevice};
use mas_core::Activation;
use mas_models::registry::{default_registry, MarketModel};
use mas_models::save_model_arch;

/// Backend used to materialize weights.
type CliBackend = NdArray<f32>;

/// Models built by `mas build`, with their reference configs.
const REFERENCE_MODELS: [(&str, &str); 2] = [
    (
        "cnn2in",
        r#"{"shape_a": [50, 9], "shape_b": [50, 4], "nb_output": 3}"#,
    ),
    (
        "cnn2in_feedback",
        r#"{"shape_a": [50, 9], "shape_b": [50, 4], "shape_fb": 8, "nb_output": 3}"#,
    ),
];

#[derive(Parser)]
#[command(name = "mas")]
#[command(author, version)]
#[command(about = "Build, summarize and save market-analysis neural network architectures")]
#[command(long_about = "mas: multi-input CNN/LSTM models for the market-analysis exchange bot.

EXAMPLES:
  # Build both reference models, save their architectures and print summaries
  mas build --out ./models

  # Print the summary of a model with a custom config
  mas summary cnn2in --config '{\"shape_a\": [30, 9], \"shape_b\": [30, 4], \"nb_output\": 2}'

  # Save architecture and initial weights of the feedback model
  mas save cnn2in_feedback --out ./models/feedback --weights

AVAILABLE MODELS:
  cnn2in           - two inputs, conv + LSTM branches
  cnn2in_feedback  - two inputs plus a feedback input")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the reference models, save their architectures and print summaries
    Build {
        /// Output directory for architecture files
        #[arg(long, default_value = "./models", value_name = "DIR")]
        out: PathBuf,

        /// Also save freshly initialized weights
        #[arg(long, default_value = "false")]
        weights: bool,
    },
    /// Print the summary of a model
    Summary {
        /// Registered model name
        model: String,

        /// JSON config overriding the defaults
        #[arg(long, value_name = "JSON")]
        config: Option<String>,

        /// Output activation (softmax, sigmoid, relu, tanh, softplus, linear)
        #[arg(long, value_name = "NAME")]
        activation: Option<Activation>,
    },
    /// Save the architecture (and optionally weights) of a model
    Save {
        /// Registered model name
        model: String,

        /// Output path without extension
        #[arg(long, value_name = "PATH")]
        out: PathBuf,

        /// JSON config overriding the defaults
        #[arg(long, value_name = "JSON")]
        config: Option<String>,

        /// Output activation (softmax, sigmoid, relu, tanh, softplus, linear)
        #[arg(long, value_name = "NAME")]
        activation: Option<Activation>,

        /// Also save freshly initialized weights
        #[arg(long, default_value = "false")]
        weights: bool,
    },
    /// List available models
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    match cli.command {
        Commands::Build { out, weights } => handle_build(&out, weights),
        Commands::Summary {
            model,
            config,
            activation,
        } => handle_summary(&model, config.as_deref(), activation),
        Commands::Save {
            model,
            out,
            config,
            activation,
            weights,
        } => handle_save(&model, &out, config.as_deref(), activation, weights).map(|_| ()),
        Commands::List => handle_list(),
    }
}

/// Parse a `--config` argument and apply an `--activation` override.
fn build_config(config: Option<&str>, activation: Option<Activation>) -> Result<Value> {
    let mut value = match config {
        Some(json) => serde_json::from_str(json).context("Failed to parse --config as JSON")?,
        None => Value::Null,
    };

    if let Some(activation) = activation {
        if value.is_null() {
            value = Value::Object(Default::default());
        }
        match value.as_object_mut() {
            Some(map) => {
                map.insert("activation".to_string(), Value::from(activation.name()));
            }
            None => bail!("--config must be a JSON object"),
        }
    }

    Ok(value)
}

fn create_model(name: &str, config: &Value) -> Result<Box<dyn MarketModel<CliBackend>>> {
    let registry = default_registry::<CliBackend>();
    if !registry.contains(name) {
        bail!(
            "Unknown model: '{}'. Available models: {}",
            name,
            registry.list().join(", ")
        );
    }

    let device = NdArrayDevice::Cpu;
    registry
        .create(name, config, &device)
        .with_context(|| format!("Failed to build model '{}'", name))
}

/// Save the architecture to `<out>.json` and optionally weights to `<out>.mpk`.
fn save(model: &dyn MarketModel<CliBackend>, out: &Path, weights: bool) -> Result<PathBuf> {
    let arch = model.architecture();
    let path = save_model_arch(&arch, out)
        .with_context(|| format!("Failed to save architecture to {:?}", out))?;
    println!("Saved architecture: {}", path.display());

    if weights {
        model
            .save_weights(out)
            .with_context(|| format!("Failed to save weights to {:?}", out))?;
        println!("Saved weights:      {}.mpk", out.display());
    }

    Ok(path)
}

fn handle_build(out: &Path, weights: bool) -> Result<()> {
    std::fs::create_dir_all(out)
        .with_context(|| format!("Failed to create output directory {:?}", out))?;

    for (name, config) in REFERENCE_MODELS {
        let config: Value = serde_json::from_str(config)?;
        let model = create_model(name, &config)?;
        save(model.as_ref(), &out.join(name), weights)?;
        println!("{}\n", model.architecture());
    }

    Ok(())
}

fn handle_summary(model: &str, config: Option<&str>, activation: Option<Activation>) -> Result<()> {
    let config = build_config(config, activation)?;
    let model = create_model(model, &config)?;
    println!("{}", model.architecture());
    Ok(())
}

fn handle_save(
    model: &str,
    out: &Path,
    config: Option<&str>,
    activation: Option<Activation>,
    weights: bool,
) -> Result<PathBuf> {
    let config = build_config(config, activation)?;
    let model = create_model(model, &config)?;
    save(model.as_ref(), out, weights)
}

fn handle_list() -> Result<()> {
    let registry = default_registry::<CliBackend>();
    println!("Available models:");
    for name in registry.list() {
        println!("  {}", name);
    }
    Ok(())
}
