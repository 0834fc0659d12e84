//! Configuration management commands.

use clap::{Args, Subcommand};
use voicegate_cli::config::init_config;

use super::{get_config, get_output, print_success};
use crate::Cli;

/// Manage CLI configuration.
///
/// Configuration is stored in ~/.voicegate/config.yaml
#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Subcommand)]
enum ConfigSubcommand {
    /// Print the effective configuration
    #[command(alias = "view")]
    Show,
    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the configuration file path
    Path,
}

impl ConfigCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        match &self.command {
            ConfigSubcommand::Show => {
                let cfg = get_config(cli)?;
                get_output(cli).write(&cfg)
            }
            ConfigSubcommand::Init { force } => {
                let cfg = init_config(cli.config.as_deref(), *force)?;
                print_success(&format!("Config written to {}", cfg.path().display()));
                Ok(())
            }
            ConfigSubcommand::Path => {
                let cfg = get_config(cli)?;
                println!("{}", cfg.path().display());
                Ok(())
            }
        }
    }
}
