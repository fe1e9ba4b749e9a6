mod decode;
mod probe;
mod profile;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use decode::DecodeCommand;
use probe::ProbeCommand;
use profile::ProfileCommand;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    color: colorchoice_clap::Color,

    #[command(subcommand)]
    command: Commands,

    /// Output plain JSON without color and interactivity
    #[arg(short, long, global = true)]
    json: bool,

    /// Log more details to stderr, can be repeated
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Read retry policies and register plans from a JSON file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    Probe(ProbeCommand),
    Profile(ProfileCommand),
    Decode(DecodeCommand),
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

pub async fn execute() -> Result<()> {
    let cli = Cli::parse();

    cli.color.write_global();
    init_logging(cli.verbose);

    match &cli.command {
        Commands::Probe(cmd) => cmd.execute(&cli).await,
        Commands::Profile(cmd) => cmd.execute(&cli),
        Commands::Decode(cmd) => cmd.execute(&cli),
    }
}
