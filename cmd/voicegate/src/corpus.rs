//! Reference recordings on disk.

use std::io;

use voicegate_audio::{AudioError, AudioSignal, read_wav};
use voicegate_cli::DatasetConfig;
use voicegate_voiceprint::{TemplateKey, TemplateSource, VoiceprintError};

/// Reads `{root}/{passphrase}/{speaker}/{sample}` WAV files.
pub struct DirectorySource {
    dataset: DatasetConfig,
}

impl DirectorySource {
    pub fn new(dataset: DatasetConfig) -> Self {
        Self { dataset }
    }
}

impl TemplateSource for DirectorySource {
    fn fetch(&self, key: &TemplateKey) -> Result<Option<AudioSignal>, VoiceprintError> {
        let path = self.dataset.sample_path(key);
        match read_wav(&path) {
            Ok(signal) => {
                tracing::debug!(template = %key, path = %path.display(), "loaded reference recording");
                Ok(Some(signal))
            }
            Err(AudioError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
