pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use hatchquote_core::config::{AppConfig, LoadOptions, LogFormat};

use commands::quote::QuoteArgs;

#[derive(Debug, Parser)]
#[command(
    name = "hatchquote",
    about = "Hatchquote pricing CLI",
    long_about = "Price revision-hatch configurations, inspect rule tables, effective config and the current exchange rate.",
    after_help = "Examples:\n  hatchquote quote --product 68f36177f6edd352f8920e1f --width 200 --height 270 --flaps 2\n  hatchquote tables\n  hatchquote rate"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to hatchquote.toml")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Validate and price one custom-size configuration")]
    Quote(QuoteArgs),
    #[command(about = "Dump the built-in perimeter tiers and two-flap surcharge ladders")]
    Tables {
        #[arg(long, help = "Limit output to one product id")]
        product: Option<String>,
    },
    #[command(about = "Inspect effective configuration values with source attribution and redaction")]
    Config,
    #[command(about = "Fetch the current exchange rate, falling back to the configured rate")]
    Rate,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions { config_path: cli.config.clone(), ..LoadOptions::default() };

    // A broken config is reported by the command itself; logging then uses defaults.
    let logging = AppConfig::load(options.clone()).unwrap_or_default();
    init_logging(&logging);

    let result = match &cli.command {
        Command::Quote(args) => commands::quote::run(args, options),
        Command::Tables { product } => commands::tables::run(product.as_deref()),
        Command::Config => commands::config::run(options),
        Command::Rate => commands::rate::run(options),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let installed = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if let Err(error) = installed {
        eprintln!("logging already initialised: {error}");
    }
}
