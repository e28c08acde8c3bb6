#![allow(missing_docs)]

//! Inciguard CLI — analyze cosmetic ingredient lists from the terminal.
//!
//! Subcommands:
//! - `analyze` — resolve a full ingredient list into a product analysis
//! - `ingredient` — resolve a single ingredient
//! - `health` — provider, cache, and store health

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use inciguard::config::EngineConfig;
use inciguard::engine::{Engine, EngineError};
use inciguard::logging;

#[derive(Parser)]
#[command(name = "inciguard", about = "Cosmetic ingredient safety analysis", version)]
struct Cli {
    /// Log to a rotating JSON file in addition to stderr.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a comma-separated ingredient list.
    Analyze {
        /// Comma-separated ingredient list, e.g. "Aqua, Glycerin, Parfum".
        /// Omit when using --file.
        ingredients: Option<String>,

        /// Read the list from a file, one ingredient per line.
        #[arg(long)]
        file: Option<PathBuf>,

        /// User context biasing the verdict (e.g. "sensitive skin").
        #[arg(long, default_value = "general")]
        context: String,

        /// Product name echoed into the analysis.
        #[arg(long, default_value = "")]
        product: String,
    },

    /// Resolve a single ingredient.
    Ingredient {
        /// Raw ingredient token.
        token: String,
    },

    /// Show provider, cache, and store health.
    Health,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    let _log_handle = logging::init(
        cli.log_dir
            .as_deref()
            .map_or(logging::LogMode::Cli, logging::LogMode::Service),
    )?;

    // Validate input shape before any engine or database setup.
    if let Command::Analyze {
        ingredients, file, ..
    } = &cli.command
    {
        gather_tokens(ingredients.as_deref(), file.as_deref())?;
    }

    let mut config = EngineConfig::load()?;
    if config.store.db_path == "inciguard.db" {
        config.store.db_path = default_db_path();
    }

    let engine = Engine::new(config).await.map_err(surfaced)?;
    info!("engine ready");

    let code = match cli.command {
        Command::Analyze {
            ingredients,
            file,
            context,
            product,
        } => {
            let tokens = gather_tokens(ingredients.as_deref(), file.as_deref())?;
            match engine.resolve_ingredients(&tokens, &context, &product).await {
                Ok(analysis) => {
                    print_json(&analysis)?;
                    ExitCode::SUCCESS
                }
                Err(e) => report_engine_error(&e),
            }
        }
        Command::Ingredient { token } => match engine.get_ingredient(&token).await {
            Ok(record) => {
                print_json(&record)?;
                ExitCode::SUCCESS
            }
            Err(e) => report_engine_error(&e),
        },
        Command::Health => {
            let report = engine.health().await;
            print_json(&report)?;
            ExitCode::SUCCESS
        }
    };

    engine.shutdown().await;
    Ok(code)
}

/// Split a comma-separated argument or read one token per line from a file.
fn gather_tokens(inline: Option<&str>, file: Option<&std::path::Path>) -> Result<Vec<String>> {
    let raw = match (inline, file) {
        (Some(list), None) => list.split(',').map(str::to_owned).collect(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?
            .lines()
            .map(str::to_owned)
            .collect::<Vec<_>>(),
        (Some(_), Some(_)) => anyhow::bail!("pass either an ingredient list or --file, not both"),
        (None, None) => anyhow::bail!("pass an ingredient list or --file"),
    };
    Ok(raw)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{rendered}");
    Ok(())
}

/// Engine errors are reported as their stable code on stderr.
fn report_engine_error(error: &EngineError) -> ExitCode {
    eprintln!("{}: {error}", error.code());
    ExitCode::FAILURE
}

fn surfaced(error: EngineError) -> anyhow::Error {
    anyhow::anyhow!("{}: {error}", error.code())
}

/// Default database location under the platform data directory.
fn default_db_path() -> String {
    directories::ProjectDirs::from("dev", "inciguard", "inciguard")
        .map(|dirs| {
            let dir = dirs.data_dir();
            let _ = std::fs::create_dir_all(dir);
            dir.join("inciguard.db").to_string_lossy().into_owned()
        })
        .unwrap_or_else(|| "inciguard.db".to_owned())
}
