//! Utility functions for CLI commands.

use voicegate_cli::{Config, Output, OutputFormat, load_config};
use voicegate_voiceprint::{DecisionPolicy, FastDtw, MfccExtractor, TemplateStore};

use crate::Cli;
use crate::corpus::DirectorySource;

/// Gets the global configuration.
pub fn get_config(cli: &Cli) -> anyhow::Result<Config> {
    load_config(cli.config.as_deref())
}

/// Creates the output writer selected by the global flags.
pub fn get_output(cli: &Cli) -> Output {
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Yaml
    };
    Output::new(format, cli.output.clone())
}

/// Builds the template store from the configured dataset.
pub fn build_store(cfg: &Config) -> anyhow::Result<(TemplateStore, MfccExtractor)> {
    cfg.validate()?;
    let extractor = MfccExtractor::new(cfg.features.clone())?;
    let source = DirectorySource::new(cfg.dataset.clone());
    let store = TemplateStore::build(cfg.enrollment.clone(), &source, &extractor)?;
    Ok((store, extractor))
}

/// Builds a ready decision policy. Blocks until every template is
/// extracted.
pub fn build_policy(cfg: &Config) -> anyhow::Result<DecisionPolicy> {
    let (store, extractor) = build_store(cfg)?;
    let dtw = FastDtw::new(cfg.dtw.clone())?;
    Ok(DecisionPolicy::new(store, extractor, dtw, cfg.policy.clone())?)
}

/// Prints a success message.
pub fn print_success(msg: &str) {
    eprintln!("✓ {}", msg);
}
