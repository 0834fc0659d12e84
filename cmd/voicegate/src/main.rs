//! voicegate - Voice passphrase and speaker verification.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod corpus;
mod server;

use commands::{ConfigCommand, ServeCommand, TemplatesCommand, VerifyCommand};

/// voicegate - grant access by spoken passphrase.
///
/// Captured utterances are compared against reference recordings laid
/// out as {dataset}/{passphrase}/{speaker}/{sample}. Access is granted
/// when the nearest passphrase (and optionally the nearest speaker) is
/// closer than the configured thresholds.
///
/// Configuration is stored in ~/.voicegate/config.yaml.
#[derive(Parser)]
#[command(name = "voicegate")]
#[command(about = "Voice passphrase and speaker verification")]
#[command(version)]
pub struct Cli {
    /// Config file (default is ~/.voicegate/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Output file (default: stdout)
    #[arg(short = 'o', long, global = true)]
    pub output: Option<String>,

    /// Output as JSON (for piping)
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage CLI configuration
    Config(ConfigCommand),
    /// Verify one recording against the enrolled templates
    Verify(VerifyCommand),
    /// Build the template store and list what was enrolled
    Templates(TemplatesCommand),
    /// Run the verification HTTP server
    Serve(ServeCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Config(cmd) => cmd.run(&cli).map(|_| ExitCode::SUCCESS),
        Commands::Verify(cmd) => cmd.run(&cli).await,
        Commands::Templates(cmd) => cmd.run(&cli).await.map(|_| ExitCode::SUCCESS),
        Commands::Serve(cmd) => cmd.run(&cli).await.map(|_| ExitCode::SUCCESS),
    }
}
