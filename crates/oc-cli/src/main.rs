//! Ollama Consumer CLI - interactive shell and model benchmark.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod ansi;
mod app;
mod commands;
mod input;
mod logging;

use app::App;
use oc_core::Settings;

/// Ollama Consumer - chat with, manage and benchmark local Ollama models
#[derive(Parser)]
#[command(name = "ollama-consumer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Ollama server URL (default: $OLLAMA_HOST or http://localhost:11434)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Path to config.ini (default: $OC_CONFIG or ./config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Folder holding images/, texts/ and answers/ (default: ./content)
    #[arg(long, global = true)]
    content_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive chat shell (default)
    Chat,

    /// List installed models with parameters and capabilities
    Models {
        /// Include blacklisted models
        #[arg(short, long)]
        all: bool,
    },

    /// List configured presets
    Presets,

    /// Show server health, version and resident models
    Status,

    /// Unload a model from server memory
    Unload {
        /// Model name
        model: String,
    },

    /// Benchmark models with a fixed set of questions
    Bench(commands::bench::BenchArgs),
}

fn settings(cli: &Cli) -> Settings {
    let mut settings = Settings::from_env();
    if let Some(host) = &cli.host {
        settings.base_url = host.trim_end_matches('/').to_string();
    }
    if let Some(config) = &cli.config {
        settings.config_path = config.clone();
    }
    if let Some(dir) = &cli.content_dir {
        settings.content_dir = dir.clone();
    }
    settings
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    let app = App::new(settings(&cli));

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| miette::miette!("Failed to start async runtime: {}", e))?;

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Bench(args) => runtime.block_on(commands::bench::run(&app, args, cli.verbose)),
        command => {
            logging::init(cli.verbose);
            match command {
                Commands::Models { all } => runtime.block_on(commands::models::run(&app, all)),
                Commands::Presets => commands::presets::run(&app),
                Commands::Status => runtime.block_on(commands::status::run(&app)),
                Commands::Unload { model } => runtime.block_on(commands::unload::run(&app, &model)),
                Commands::Chat | Commands::Bench(_) => runtime.block_on(commands::chat::run(&app)),
            }
        }
    }
}
