//! Audio utilities for the voicegate matcher.
//!
//! This crate provides:
//!
//! - [`AudioSignal`]: immutable interleaved samples plus their sample rate
//! - `wav`: WAV decoding and encoding on top of `hound`
//! - `resampler`: whole-buffer sample rate conversion on top of `rubato`
//!
//! # Example
//!
//! ```rust
//! use voicegate_audio::AudioSignal;
//!
//! // 10ms of stereo silence at 16kHz
//! let signal = AudioSignal::new(vec![0.0; 320], 2, 16000).unwrap();
//! assert_eq!(signal.frames(), 160);
//! assert_eq!(signal.to_mono().len(), 160);
//! ```

mod error;
pub mod resampler;
mod signal;
pub mod wav;

pub use error::AudioError;
pub use resampler::resample;
pub use signal::{AudioSignal, MAX_SAMPLE_RATE, MIN_SAMPLE_RATE, check_sample_rate};
pub use wav::{decode_wav, encode_wav, read_wav};
