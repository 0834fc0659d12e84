//! Whole-buffer sample rate conversion.
//!
//! Uses rubato's FFT-based fixed in/out resampler, a pure Rust
//! implementation without any FFI dependencies.

use rubato::{FftFixedInOut, Resampler};

use crate::AudioError;
use crate::signal::check_sample_rate;

/// Number of input frames per rubato processing block.
const CHUNK_SIZE: usize = 1024;

/// Resamples mono samples from `from_rate` to `to_rate`.
///
/// Returns `ceil(len * to_rate / from_rate)` samples. The resampler's
/// output delay is trimmed so that the first output sample lines up with
/// the first input sample. Equal rates return a copy of the input. Both
/// rates must pass [`check_sample_rate`](crate::check_sample_rate).
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, AudioError> {
    check_sample_rate(from_rate)?;
    check_sample_rate(to_rate)?;
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut resampler =
        FftFixedInOut::<f32>::new(from_rate as usize, to_rate as usize, CHUNK_SIZE, 1)?;

    let expected = (samples.len() as u64 * to_rate as u64).div_ceil(from_rate as u64) as usize;
    let delay = resampler.output_delay();

    let mut out = Vec::with_capacity(expected + delay + CHUNK_SIZE);
    let mut chunk: Vec<f32> = Vec::with_capacity(resampler.input_frames_next());
    let mut pos = 0;

    // Keep feeding (zero-padded past the end) until the delayed tail is flushed.
    while out.len() < expected + delay {
        let need = resampler.input_frames_next();
        chunk.clear();
        chunk.resize(need, 0.0);
        if pos < samples.len() {
            let end = (pos + need).min(samples.len());
            chunk[..end - pos].copy_from_slice(&samples[pos..end]);
        }
        pos += need;

        let frames = resampler.process(&[chunk.as_slice()], None)?;
        out.extend_from_slice(&frames[0]);
    }

    out.drain(..delay);
    out.truncate(expected);
    Ok(out)
}
