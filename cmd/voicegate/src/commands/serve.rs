//! HTTP server command.

use std::sync::Arc;

use clap::Args;

use super::{build_policy, get_config};
use crate::Cli;
use crate::server;

/// Run the verification HTTP server.
///
/// Templates are extracted once before the listener opens.
#[derive(Args)]
pub struct ServeCommand {
    /// Listen address (e.g. :8080 or 127.0.0.1:9000)
    #[arg(short, long, default_value = ":8080")]
    pub listen: String,
}

impl ServeCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let cfg = get_config(cli)?;
        let mode = cfg.mode;
        let policy = tokio::task::spawn_blocking(move || build_policy(&cfg)).await??;
        server::start_server(&self.listen, Arc::new(policy), mode).await
    }
}
