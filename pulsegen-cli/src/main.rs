use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand};
use pulsegen_rs::builder::{InitState, ReadoutOptions};
use pulsegen_rs::pulse::{PulseShape, WaveformCache};
use pulsegen_rs::{BuilderConfig, CircuitBuilder, OperationDict};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Resolve operation codes and render pulse waveforms")]
struct Cli {
    /// Log more; repeat for more detail. `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Args, Clone, Debug)]
struct BuilderArgs {
    /// Operation dictionary, as JSON.
    #[arg(long)]
    operations: PathBuf,
    /// Builder configuration, as JSON or YAML.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Clone, Debug)]
enum Command {
    /// Print the pulse-parameter records an operation resolves to.
    Resolve {
        #[command(flatten)]
        builder: BuilderArgs,
        op: String,
    },
    /// Print the duration of a list of operations in seconds, including the initialization.
    Duration {
        #[command(flatten)]
        builder: BuilderArgs,
        #[arg(short, long, default_value = "0")]
        init_state: String,
        #[arg(required = true)]
        ops: Vec<String>,
    },
    /// Render one channel of a segment as `time,value` CSV.
    Render {
        #[command(flatten)]
        builder: BuilderArgs,
        #[arg(long)]
        channel: String,
        #[arg(long, default_value_t = 2.4e9)]
        sample_rate: f64,
        #[arg(short, long, default_value = "0")]
        init_state: String,
        #[arg(required = true)]
        ops: Vec<String>,
    },
    /// List the pulse types and their default parameters.
    PulseTypes,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Command::Resolve { builder, op } => handle_resolve(&builder, &op),
        Command::Duration {
            builder,
            init_state,
            ops,
        } => handle_duration(&builder, &init_state, &ops),
        Command::Render {
            builder,
            channel,
            sample_rate,
            init_state,
            ops,
        } => handle_render(&builder, &channel, sample_rate, &init_state, &ops),
        Command::PulseTypes => handle_pulse_types(),
    }
}

fn load_operations(path: &Path) -> anyhow::Result<OperationDict> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open operation dictionary {}.", path.display()))?;
    OperationDict::from_reader(file)
        .with_context(|| format!("Failed to read operation dictionary {}.", path.display()))
}

impl BuilderArgs {
    fn load(&self) -> anyhow::Result<CircuitBuilder> {
        let operation_dict = load_operations(&self.operations)?;
        let config = match &self.config {
            Some(path) => BuilderConfig::from_path(path)
                .with_context(|| format!("Failed to load builder configuration {}.", path.display()))?,
            None => BuilderConfig::default(),
        };
        tracing::info!(
            operations = operation_dict.len(),
            "loaded operation dictionary"
        );
        Ok(CircuitBuilder::new(operation_dict, config))
    }
}

fn handle_resolve(builder: &BuilderArgs, op: &str) -> anyhow::Result<()> {
    let pulses = builder
        .load()?
        .get_pulses(op)
        .with_context(|| format!("Failed to resolve operation `{op}`."))?;
    println!("{}", serde_json::to_string_pretty(&pulses)?);
    Ok(())
}

fn handle_duration(builder: &BuilderArgs, init_state: &str, ops: &[String]) -> anyhow::Result<()> {
    let duration = builder
        .load()?
        .get_ops_duration(ops, None, None, &InitState::from(init_state))
        .context("Failed to compute the duration of the operations.")?;
    println!("{duration}");
    Ok(())
}

fn handle_render(
    builder: &BuilderArgs,
    channel: &str,
    sample_rate: f64,
    init_state: &str,
    ops: &[String],
) -> anyhow::Result<()> {
    let mut segment = builder
        .load()?
        .seg_from_ops(
            "Segment1",
            ops,
            None,
            None,
            &InitState::from(init_state),
            &ReadoutOptions::default(),
        )
        .context("Failed to build a segment from the operations.")?;
    segment
        .resolve_timing()
        .context("Failed to resolve the timing of the segment.")?;
    let mut cache = WaveformCache::new();
    let (start, samples) = segment
        .render(channel, sample_rate, &mut cache)
        .with_context(|| format!("Failed to render channel {channel}."))?;
    if samples.is_empty() {
        tracing::warn!(channel, "no pulse plays on this channel");
    }
    println!("time,value");
    for (index, value) in samples.iter().enumerate() {
        println!("{},{value}", start + index as f64 / sample_rate);
    }
    Ok(())
}

fn handle_pulse_types() -> anyhow::Result<()> {
    for pulse_type in PulseShape::PULSE_TYPES {
        let defaults = PulseShape::default_params(pulse_type)
            .with_context(|| format!("Failed to list the parameters of {pulse_type}."))?;
        println!("{pulse_type}: {}", serde_json::to_string(&defaults)?);
    }
    Ok(())
}
