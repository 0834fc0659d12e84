//! Single-recording verification.

use std::process::ExitCode;

use clap::Args;
use serde::Serialize;
use voicegate_audio::read_wav;
use voicegate_voiceprint::{DecisionResult, Mode};

use super::{build_policy, get_config, get_output};
use crate::Cli;

/// Verify a WAV recording.
///
/// Exits 0 when access is granted, 1 when denied and 2 when the
/// recording or the template store could not be processed.
#[derive(Args)]
pub struct VerifyCommand {
    /// WAV file to verify
    pub input: String,

    /// Decision mode: passphrase or passphrase_and_speaker
    #[arg(short, long)]
    pub mode: Option<Mode>,

    /// Override the passphrase distance threshold
    #[arg(long)]
    pub sentence_threshold: Option<f64>,

    /// Override the speaker distance threshold
    #[arg(long)]
    pub person_threshold: Option<f64>,
}

/// Shown instead of a decision when verification fails.
#[derive(Debug, Serialize)]
pub struct Denial {
    pub accepted: bool,
    pub error: String,
}

impl Denial {
    pub fn new(err: &anyhow::Error) -> Self {
        Self {
            accepted: false,
            error: format!("{err:#}"),
        }
    }
}

impl VerifyCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<ExitCode> {
        let output = get_output(cli);
        match self.verify(cli).await {
            Ok(result) => {
                output.write(&result)?;
                Ok(if result.accepted {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::from(1)
                })
            }
            Err(err) => {
                tracing::error!(error = %err, "verification failed");
                output.write(&Denial::new(&err))?;
                Ok(ExitCode::from(2))
            }
        }
    }

    async fn verify(&self, cli: &Cli) -> anyhow::Result<DecisionResult> {
        let mut cfg = get_config(cli)?;
        if let Some(t) = self.sentence_threshold {
            cfg.policy.sentence_threshold = t;
        }
        if let Some(t) = self.person_threshold {
            cfg.policy.person_threshold = t;
        }
        let mode = self.mode.unwrap_or(cfg.mode);
        let input = self.input.clone();

        let result = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
            let policy = build_policy(&cfg)?;
            let signal = read_wav(&input)
                .map_err(|e| anyhow::anyhow!("read {input}: {e}"))?;
            Ok(policy.decide(&signal, mode)?)
        })
        .await??;

        Ok(result)
    }
}
