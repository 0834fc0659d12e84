use thiserror::Error;

use voicegate_audio::AudioError;

/// Errors returned by voiceprint operations.
///
/// None of these are retried internally: each one means the input was
/// malformed or the template store is incomplete.
#[derive(Debug, Error)]
pub enum VoiceprintError {
    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("comparison failed: {0}")]
    Comparison(String),

    #[error("missing template for passphrase {passphrase:?}, speaker {speaker:?}")]
    MissingTemplate { passphrase: String, speaker: String },

    #[error("unknown template: passphrase {passphrase:?}, speaker {speaker:?}")]
    UnknownTemplate { passphrase: String, speaker: String },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Audio(#[from] AudioError),
}
