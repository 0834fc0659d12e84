//! Template store inspection.

use clap::Args;
use serde::Serialize;

use super::{build_store, get_config, get_output};
use crate::Cli;

/// Extract every enrolled template and list the results.
#[derive(Args)]
pub struct TemplatesCommand {}

#[derive(Debug, Serialize)]
struct TemplateRow {
    passphrase: String,
    speaker: String,
    frames: usize,
    path: String,
}

impl TemplatesCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let cfg = get_config(cli)?;
        let rows = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<TemplateRow>> {
            let (store, _) = build_store(&cfg)?;
            Ok(store
                .iter()
                .map(|t| TemplateRow {
                    passphrase: t.key().passphrase.clone(),
                    speaker: t.key().speaker.clone(),
                    frames: t.features().len(),
                    path: cfg.dataset.sample_path(t.key()).display().to_string(),
                })
                .collect())
        })
        .await??;

        get_output(cli).write(&rows)
    }
}
