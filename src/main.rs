use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, info};

use viirs_fetch::render::Polar2Grid;
use viirs_fetch::run_config::{run_config_toml, RunConfig};
use viirs_fetch::s3::Store;
use viirs_fetch::workflow::{self, RunOptions};

const DEFAULT_CONFIG: &str = "./inputs/run_config.toml";

/// Fetch VIIRS SDR granules for a time window and render them with polar2grid
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download the selected granules and shapefiles, then render
    Run {
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,

        /// Stop after downloading
        #[arg(long)]
        skip_render: bool,
    },
    /// Write the download plan as JSON without fetching anything
    Plan {
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },
    /// Write the default run configuration
    Template {
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        output: PathBuf,

        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins over the flags
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    debug!(?args, "CLI arguments parsed");

    let (config_path, options) = match args.command {
        Command::Template { output, force } => {
            RunConfig::from_template(&run_config_toml())?.write_new(&output, force)?;
            info!("Wrote default configuration to {}", output.display());
            return Ok(());
        }
        Command::Run {
            config,
            skip_render,
        } => (
            config,
            RunOptions {
                dry_run: false,
                skip_render,
            },
        ),
        Command::Plan { config } => (
            config,
            RunOptions {
                dry_run: true,
                skip_render: true,
            },
        ),
    };

    let config = RunConfig::read(&config_path)
        .with_context(|| format!("Unable to load {}", config_path.display()))?;

    let store = Store::as_anon(&config.region).await;
    let http = reqwest::Client::new();
    let renderer = Polar2Grid::new(
        config.render.clone(),
        config.output_file.clone(),
        config.shapefiles_dir.clone(),
    );

    workflow::run(&config, &store, &http, &renderer, options).await?;

    Ok(())
}
