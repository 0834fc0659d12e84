use std::time::Duration;

use crate::AudioError;

/// Lowest sample rate a signal may declare, in Hz.
pub const MIN_SAMPLE_RATE: u32 = 4_000;
/// Highest sample rate a signal may declare, in Hz.
pub const MAX_SAMPLE_RATE: u32 = 192_000;

/// Rejects rates outside `[MIN_SAMPLE_RATE, MAX_SAMPLE_RATE]`.
pub fn check_sample_rate(sample_rate: u32) -> Result<(), AudioError> {
    if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate) {
        return Err(AudioError::InvalidFormat(format!(
            "sample rate {sample_rate} Hz outside [{MIN_SAMPLE_RATE}, {MAX_SAMPLE_RATE}] Hz"
        )));
    }
    Ok(())
}

/// Captured audio: interleaved samples normalised to `[-1, 1]` plus the
/// sample rate they were captured at.
///
/// A signal is immutable once built. Multi-channel signals are reduced to
/// mono with [`AudioSignal::to_mono`], which averages all channels of a
/// frame. Enrollment and query audio go through the same reduction.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSignal {
    samples: Vec<f32>,
    channels: u16,
    sample_rate: u32,
}

impl AudioSignal {
    /// Creates a signal from interleaved samples.
    ///
    /// The sample count must be a multiple of `channels`, and the rate must
    /// pass [`check_sample_rate`].
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Result<Self, AudioError> {
        if channels == 0 {
            return Err(AudioError::InvalidFormat("channel count must be positive".into()));
        }
        check_sample_rate(sample_rate)?;
        if samples.len() % channels as usize != 0 {
            return Err(AudioError::InvalidFormat(format!(
                "{} samples do not fill {} channels evenly",
                samples.len(),
                channels
            )));
        }
        Ok(Self {
            samples,
            channels,
            sample_rate,
        })
    }

    /// Creates a mono signal.
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Result<Self, AudioError> {
        Self::new(samples, 1, sample_rate)
    }

    /// Decodes PCM16 signed little-endian bytes. A trailing odd byte is ignored.
    pub fn from_pcm16_le(bytes: &[u8], channels: u16, sample_rate: u32) -> Result<Self, AudioError> {
        let samples = bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
            .collect();
        Self::new(samples, channels, sample_rate)
    }

    /// Interleaved samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Merges all channels into one by averaging each frame.
    pub fn to_mono(&self) -> Vec<f32> {
        if self.channels == 1 {
            return self.samples.clone();
        }
        let n = self.channels as usize;
        self.samples
            .chunks_exact(n)
            .map(|frame| frame.iter().sum::<f32>() / n as f32)
            .collect()
    }
}
