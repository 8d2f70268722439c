//! colorizer CLI - add colors to black-and-white images.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use colorizer::model::{Device, ModelKind};
use colorizer::server::{self, DEFAULT_UPLOAD_LIMIT};
use colorizer::{image, Config, Pipeline};

/// Colorize grayscale images with a pretrained colorization network.
#[derive(Parser, Debug)]
#[command(name = "colorizer")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    model: ModelArgs,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the upload page.
    Serve {
        /// Address to listen on.
        #[arg(long, default_value = "127.0.0.1:8501", value_name = "ADDR")]
        addr: SocketAddr,

        /// Maximum upload size in bytes.
        #[arg(long, default_value_t = DEFAULT_UPLOAD_LIMIT, value_name = "BYTES")]
        upload_limit: usize,
    },

    /// Colorize a single image file.
    Run {
        /// Input image path.
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output PNG path.
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Also write the lightness-only rendition here.
        #[arg(long, value_name = "PATH")]
        grayscale: Option<PathBuf>,
    },
}

#[derive(ClapArgs, Debug)]
struct ModelArgs {
    /// Pretrained network: siggraph17 or eccv16.
    #[arg(long, default_value = "siggraph17", global = true, value_name = "NAME")]
    model: ModelKind,

    /// Load this ONNX file instead of the cached model.
    #[arg(long, global = true, value_name = "PATH")]
    model_path: Option<PathBuf>,

    /// Download the model from this URL if it is not cached.
    #[arg(long, global = true, value_name = "URL")]
    model_url: Option<String>,

    /// Execution device: auto, cpu, cuda or cuda:N.
    #[arg(long, default_value = "auto", global = true, value_name = "DEVICE")]
    device: Device,

    /// Number of colorized results kept in memory.
    #[arg(long, default_value = "32", global = true, value_name = "INT")]
    cache_capacity: usize,
}

impl ModelArgs {
    fn config(&self) -> Config {
        Config {
            model_kind: self.model,
            model_path: self.model_path.clone(),
            model_url: self.model_url.clone(),
            device: self.device,
            cache_capacity: self.cache_capacity,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("colorizer={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Err(err) = run(&args) {
        tracing::error!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run(args: &Args) -> Result<()> {
    // The model loads before anything is served; a failure here ends the process.
    let pipeline = Pipeline::new(args.model.config()).context("Failed to initialize pipeline")?;

    match &args.command {
        Command::Serve { addr, upload_limit } => {
            let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
            runtime
                .block_on(server::serve(Arc::new(pipeline), *addr, *upload_limit))
                .with_context(|| format!("Server on {addr} failed"))?;
        }
        Command::Run {
            input,
            output,
            grayscale,
        } => {
            if !input.exists() {
                anyhow::bail!("Input file does not exist: {}", input.display());
            }

            let normalized = pipeline
                .process(input, output)
                .context("Failed to process image")?;

            if let Some(path) = grayscale {
                let rendition = pipeline
                    .grayscale(&normalized)
                    .context("Failed to render grayscale comparison")?;
                image::save_png(&rendition, path).context("Failed to save grayscale image")?;
            }

            tracing::info!(
                "Successfully colorized {} -> {}",
                input.display(),
                output.display()
            );
        }
    }

    Ok(())
}
