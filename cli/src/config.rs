//! Configuration management for CLI tools.
//!
//! Configuration is stored in ~/.voicegate/config.yaml unless a path is
//! given explicitly. A missing file means all defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use voicegate_voiceprint::{DtwConfig, Enrollment, MfccConfig, Mode, PolicyConfig, TemplateKey};

/// Default base configuration directory name.
pub const DEFAULT_BASE_DIR: &str = ".voicegate";
/// Default configuration filename.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// CLI configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the reference recordings live.
    pub dataset: DatasetConfig,

    /// Passphrases and speakers that must be enrolled.
    pub enrollment: Enrollment,

    /// Decision thresholds.
    pub policy: PolicyConfig,

    /// Mode used when a request does not name one.
    pub mode: Mode,

    /// Feature extraction parameters.
    pub features: MfccConfig,

    /// Time warping parameters.
    pub dtw: DtwConfig,

    /// Path to the config file (not serialized).
    #[serde(skip)]
    config_path: PathBuf,
}

/// Reference recording layout: `{root}/{passphrase}/{speaker}/{sample}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub root: PathBuf,
    pub sample: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("dataset"),
            sample: "sample1.wav".to_string(),
        }
    }
}

impl DatasetConfig {
    /// Path of the reference recording for `key`.
    pub fn sample_path(&self, key: &TemplateKey) -> PathBuf {
        self.root.join(&key.passphrase).join(&key.speaker).join(&self.sample)
    }
}

impl Config {
    /// Gets the default config directory.
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(DEFAULT_BASE_DIR))
    }

    /// Gets the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        Self::default_config_dir().map(|dir| dir.join(DEFAULT_CONFIG_FILE))
    }

    /// Returns the config file path.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Saves the configuration to its file, creating parent directories.
    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(&self.config_path, content)?;
        Ok(())
    }

    /// Checks every section, so a bad file fails at startup rather than
    /// on the first request.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.enrollment.validate()?;
        self.policy.validate()?;
        self.features.validate()?;
        if self.dtw.radius == 0 {
            anyhow::bail!("dtw.radius must be at least 1");
        }
        if self.dataset.sample.is_empty() {
            anyhow::bail!("dataset.sample is empty");
        }
        if !self.enrollment.speakers.contains(&self.policy.baseline_speaker) {
            anyhow::bail!(
                "policy.baseline_speaker {:?} is not an enrolled speaker",
                self.policy.baseline_speaker
            );
        }
        Ok(())
    }
}

fn resolve_path(custom_path: Option<&str>) -> anyhow::Result<PathBuf> {
    match custom_path {
        Some(p) => Ok(PathBuf::from(p)),
        None => Config::default_config_path()
            .ok_or_else(|| anyhow::anyhow!("cannot determine config path")),
    }
}

/// Loads configuration from `custom_path` or the default location.
///
/// A missing file yields the defaults; nothing is written.
pub fn load_config(custom_path: Option<&str>) -> anyhow::Result<Config> {
    let config_path = resolve_path(custom_path)?;

    let mut cfg = if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        serde_yaml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("parse {}: {e}", config_path.display()))?
    } else {
        Config::default()
    };

    cfg.config_path = config_path;
    Ok(cfg)
}

/// Writes a default configuration file, refusing to overwrite unless
/// `force` is set.
pub fn init_config(custom_path: Option<&str>, force: bool) -> anyhow::Result<Config> {
    let config_path = resolve_path(custom_path)?;
    if config_path.exists() && !force {
        anyhow::bail!("{} already exists", config_path.display());
    }
    let cfg = Config {
        config_path,
        ..Config::default()
    };
    cfg.save()?;
    Ok(cfg)
}
