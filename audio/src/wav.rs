//! WAV decoding and encoding.

use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::{AudioError, AudioSignal};

/// Reads a WAV file into an [`AudioSignal`].
pub fn read_wav(path: impl AsRef<Path>) -> Result<AudioSignal, AudioError> {
    let file = File::open(path.as_ref())?;
    decode_wav(BufReader::new(file))
}

/// Decodes WAV data into an [`AudioSignal`].
///
/// Integer PCM of any bit depth hound supports (8/16/24/32) and 32-bit
/// float are accepted. Integer samples are scaled to `[-1, 1]`.
pub fn decode_wav<R: Read>(reader: R) -> Result<AudioSignal, AudioError> {
    let mut reader = WavReader::new(reader)?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(AudioError::InvalidFormat(format!(
                    "unsupported bit depth {}",
                    spec.bits_per_sample
                )));
            }
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    AudioSignal::new(samples, spec.channels, spec.sample_rate)
}

/// Encodes a signal as 16-bit PCM WAV bytes. Samples are clamped to `[-1, 1]`.
pub fn encode_wav(signal: &AudioSignal) -> Result<Vec<u8>, AudioError> {
    let spec = WavSpec {
        channels: signal.channels(),
        sample_rate: signal.sample_rate(),
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for &s in signal.samples() {
            let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
            writer.write_sample(v)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}
