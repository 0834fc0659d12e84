//! Passphrase and speaker verification by comparing utterances against
//! enrolled reference recordings.
//!
//! # Architecture
//!
//! A decision runs in three stages:
//!
//! 1. [`MfccExtractor::extract`]: [`AudioSignal`] -> [`FeatureSequence`]
//!    (100 MFCCs per 512-sample hop at 22050 Hz)
//! 2. [`FastDtw`]: time-warped distance between the query and each
//!    template held in the [`TemplateStore`]
//! 3. [`DecisionPolicy::decide`]: nearest passphrase, then optionally
//!    nearest speaker, each checked against a static threshold
//!
//! ```text
//! query --mfcc--> q --dtw vs baseline/{phrase}--> best phrase --< 10000?--> grant (Passphrase)
//!                                                      |
//!                                                      +--dtw vs {phrase}/*--> best speaker --< 8500?--> grant + speaker
//! ```
//!
//! # Feature Extraction
//!
//! The [`mfcc`] module follows the librosa defaults:
//! - Periodic Hann window, centred frames (n_fft 2048, hop 512)
//! - 128 Slaney mel filters
//! - power to dB with an 80 dB floor
//! - Orthonormal DCT-II
//!
//! [`AudioSignal`]: voicegate_audio::AudioSignal

mod dtw;
mod error;
pub mod mfcc;
mod policy;
mod similarity;
mod store;
mod voiceprint;

pub use dtw::{Alignment, DtwConfig, FastDtw};
pub use error::VoiceprintError;
pub use mfcc::{MfccConfig, MfccExtractor};
pub use policy::{DecisionPolicy, DecisionResult, Mode, PolicyConfig, passes};
pub use similarity::{SequenceDistance, argmin, score_all, score_all_parallel};
pub use store::{Enrollment, MemorySource, Template, TemplateSource, TemplateStore};
pub use voiceprint::{FeatureSequence, SimilarityScore, TemplateKey};
