//! acb CLI - build and edit App Container images

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;
mod util;

/// acb - layered App Container image builder
#[derive(Parser)]
#[command(name = "acb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Image store directory (default: ~/.acbuild)
    #[arg(long, global = true, env = "ACB_STORE")]
    store: Option<PathBuf>,

    /// Verbose logging on stderr
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty image
    New {
        /// Output archive
        #[arg(short, long)]
        output: PathBuf,
        /// Image name
        #[arg(short, long)]
        name: String,
        /// Replace the output file if it exists
        #[arg(long)]
        overwrite: bool,
    },
    /// Create an image that depends on the given layers
    Add {
        /// Output archive
        #[arg(short, long)]
        output: PathBuf,
        /// Image name
        #[arg(short, long)]
        name: String,
        /// Layer archives or stored image names, in dependency order
        #[arg(required = true)]
        inputs: Vec<String>,
    },
    /// Remove layers from an image's dependency tree
    Rm {
        /// Image archive or stored image name
        #[arg(short, long)]
        input: String,
        /// Output archive
        #[arg(short, long)]
        output: PathBuf,
        /// New name for the resulting image
        #[arg(short, long)]
        name: Option<String>,
        /// Names of the layers to remove
        #[arg(required = true)]
        layers: Vec<String>,
    },
    /// Flatten an image and its layers into a directory
    Render {
        /// Image archive or stored image name
        #[arg(short, long)]
        input: String,
        /// Destination directory (must be absent or empty)
        out_dir: PathBuf,
    },
    /// Show an image's dependency tree
    Deps {
        /// Image archive or stored image name
        input: String,
        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// Print an image's manifest
    CatManifest {
        /// Image archive or stored image name
        input: String,
    },
    /// Give an image a new name
    Rename {
        /// Image archive or stored image name
        #[arg(short, long)]
        input: String,
        /// Output archive
        #[arg(short, long)]
        output: PathBuf,
        /// New image name
        name: String,
        /// Replace the output file if it exists
        #[arg(long)]
        overwrite: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries command output
    let level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let store_path = util::store_path(cli.store)?;
    let store = acb_core::Store::open_or_init(&store_path)
        .with_context(|| format!("Failed to open image store at {}", store_path.display()))?;
    tracing::debug!(store = %store_path.display(), "opened store");

    match cli.command {
        Commands::New { output, name, overwrite } => cmd::new::run(&store, &output, &name, overwrite),
        Commands::Add { output, name, inputs } => cmd::add::run(&store, &output, &name, &inputs),
        Commands::Rm { input, output, name, layers } => {
            cmd::rm::run(&store, &input, &output, name.as_deref(), &layers)
        }
        Commands::Render { input, out_dir } => cmd::render::run(&store, &input, &out_dir),
        Commands::Deps { input, format } => cmd::deps::run(&store, &input, format),
        Commands::CatManifest { input } => cmd::cat_manifest::run(&store, &input),
        Commands::Rename { input, output, name, overwrite } => {
            cmd::rename::run(&store, &input, &output, &name, overwrite)
        }
    }
}
