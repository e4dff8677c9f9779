//! aapso - transfer learning + AAPSO feature selection experiment runner
//!
//! Usage:
//!   aapso --data_directory ./flowers                 # defaults: 10 epochs, 30 agents, 20 iterations
//!   aapso --data_directory ./flowers --epochs 3 --backbone vgg16 --pretrained vgg16.safetensors
//!   aapso --config experiment.json --seed 42 --plot_dir ./plots
//!
//! Expects `<data_directory>/train/<class>/*` and `<data_directory>/val/<class>/*`.

use aapso::config::ExperimentConfig;
use aapso::experiment::run_experiment;
use aapso::transfer::BackboneKind;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod error;
mod output;

use error::{CliError, Result};

/// aapso - fine-tune a CNN, select its features with AAPSO, validate with k-NN
///
/// Flags override values from `--config`; unset flags keep the config (or
/// built-in) defaults.
#[derive(Parser, Debug)]
#[command(name = "aapso")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding train/ and val/ image folders [default: ./]
    #[arg(long = "data_directory", value_name = "DIR")]
    data_directory: Option<PathBuf>,

    /// Number of fine-tuning epochs [default: 10]
    #[arg(long)]
    epochs: Option<usize>,

    /// Training mini-batch size [default: 32]
    #[arg(long = "batch_size")]
    batch_size: Option<usize>,

    /// Initial Adam learning rate [default: 0.0001]
    #[arg(long = "learning_rate")]
    learning_rate: Option<f32>,

    /// Epochs between learning-rate decays (x0.1) [default: 5]
    #[arg(long = "stepLR")]
    step_lr: Option<usize>,

    /// JSON experiment configuration
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// AAPSO population size [default: 30]
    #[arg(long = "num_agents")]
    num_agents: Option<usize>,

    /// AAPSO iterations [default: 20]
    #[arg(long = "max_iter")]
    max_iter: Option<usize>,

    /// Seed for shuffling, initialization, search, and splits
    #[arg(long)]
    seed: Option<u64>,

    /// Side of the square network input [default: 224]
    #[arg(long = "image_size")]
    image_size: Option<u32>,

    /// Backbone architecture: vgg11, vgg16, tiny [default: tiny]
    #[arg(long)]
    backbone: Option<BackboneKind>,

    /// SafeTensors checkpoint with torchvision-named backbone weights
    #[arg(long, value_name = "FILE")]
    pretrained: Option<PathBuf>,

    /// Train only the classification head
    #[arg(long = "freeze_backbone")]
    freeze_backbone: bool,

    /// Write the confusion-matrix PNG into this directory
    #[arg(long = "plot_dir", value_name = "DIR")]
    plot_dir: Option<PathBuf>,

    /// Verbose output (debug logs)
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

/// `RUST_LOG` wins over `-v`/`-q`.
fn init_tracing(verbose: bool, quiet: bool) {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn resolve_config(cli: &Cli) -> Result<ExperimentConfig> {
    let mut config = match &cli.config {
        Some(path) if !path.is_file() => return Err(CliError::ConfigNotFound(path.clone())),
        Some(path) => ExperimentConfig::from_json_file(path)?,
        None => ExperimentConfig::default(),
    };

    if let Some(dir) = &cli.data_directory {
        config.data.data_directory = dir.clone();
    }
    if let Some(v) = cli.epochs {
        config.train.epochs = v;
    }
    if let Some(v) = cli.batch_size {
        config.data.batch_size = v;
    }
    if let Some(v) = cli.learning_rate {
        config.train.learning_rate = v;
    }
    if let Some(v) = cli.step_lr {
        config.train.step_lr = v;
    }
    if let Some(v) = cli.num_agents {
        config.swarm.num_agents = v;
    }
    if let Some(v) = cli.max_iter {
        config.swarm.max_iter = v;
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    if let Some(v) = cli.image_size {
        config.data.image_size = v;
    }
    if let Some(v) = cli.backbone {
        config.train.backbone = v;
    }
    if let Some(path) = &cli.pretrained {
        config.train.pretrained = Some(path.clone());
    }
    if cli.freeze_backbone {
        config.train.freeze_backbone = true;
    }
    if let Some(dir) = &cli.plot_dir {
        config.validation.plot_dir = Some(dir.clone());
    }

    config.validate()?;
    Ok(config)
}

fn run(cli: &Cli) -> Result<()> {
    let config = resolve_config(cli)?;
    tracing::debug!(?config, "resolved configuration");
    let report = run_experiment(&config)?;
    if !cli.quiet {
        output::print_report(&report);
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            e.exit_code()
        }
    }
}
