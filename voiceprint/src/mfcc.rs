use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use voicegate_audio::{AudioSignal, resample};

use crate::VoiceprintError;
use crate::voiceprint::FeatureSequence;

/// Floor applied to mel energies before taking the log.
const AMIN: f64 = 1e-10;

/// Configures MFCC feature extraction.
///
/// Defaults follow librosa's `feature.mfcc` with `n_mfcc = 100`: audio is
/// resampled to 22050 Hz, framed with a centred 2048-point periodic Hann
/// window every 512 samples, projected onto 128 Slaney mel bands, converted
/// to decibels with an 80 dB dynamic range, and reduced with an orthonormal
/// DCT-II. Enrollment and query extraction must share one configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MfccConfig {
    /// Analysis sample rate in Hz; input is resampled to it (default: 22050).
    pub sample_rate: u32,
    /// FFT and window length in samples, a power of two (default: 2048).
    pub n_fft: usize,
    /// Hop between frames in samples (default: 512).
    pub hop_length: usize,
    /// Number of mel bands (default: 128).
    pub num_mels: usize,
    /// Cepstral coefficients kept per frame (default: 100).
    pub num_coeffs: usize,
    /// Lowest mel band edge in Hz (default: 0).
    pub fmin: f64,
    /// Highest mel band edge in Hz, `None` = Nyquist (default: None).
    pub fmax: Option<f64>,
    /// Dynamic range below the loudest band, in dB (default: 80).
    pub top_db: Option<f64>,
    /// Pad `n_fft / 2` zeros on both sides so frames are centred (default: true).
    pub center: bool,
    /// Longest accepted input in seconds (default: 120).
    pub max_duration_secs: f64,
}

impl Default for MfccConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            n_fft: 2048,
            hop_length: 512,
            num_mels: 128,
            num_coeffs: 100,
            fmin: 0.0,
            fmax: None,
            top_db: Some(80.0),
            center: true,
            max_duration_secs: 120.0,
        }
    }
}

impl MfccConfig {
    /// Checks that the parameters describe a usable transform.
    pub fn validate(&self) -> Result<(), VoiceprintError> {
        let invalid = |msg: String| Err(VoiceprintError::InvalidConfig(msg));
        if self.sample_rate == 0 {
            return invalid("mfcc: sample_rate must be positive".into());
        }
        if self.n_fft < 4 || !self.n_fft.is_power_of_two() {
            return invalid(format!("mfcc: n_fft must be a power of two >= 4, got {}", self.n_fft));
        }
        if self.hop_length == 0 {
            return invalid("mfcc: hop_length must be positive".into());
        }
        if self.num_mels == 0 || self.num_coeffs == 0 {
            return invalid("mfcc: num_mels and num_coeffs must be positive".into());
        }
        if self.num_coeffs > self.num_mels {
            return invalid(format!(
                "mfcc: num_coeffs ({}) exceeds num_mels ({})",
                self.num_coeffs, self.num_mels
            ));
        }
        let nyquist = self.sample_rate as f64 / 2.0;
        let fmax = self.resolved_fmax();
        if self.fmin < 0.0 || fmax <= self.fmin || fmax > nyquist {
            return invalid(format!(
                "mfcc: band [{}, {}] Hz outside [0, {nyquist}] Hz",
                self.fmin, fmax
            ));
        }
        if matches!(self.top_db, Some(t) if t < 0.0) {
            return invalid("mfcc: top_db must be non-negative".into());
        }
        if !self.max_duration_secs.is_finite() || self.max_duration_secs <= 0.0 {
            return invalid("mfcc: max_duration_secs must be positive".into());
        }
        Ok(())
    }

    fn resolved_fmax(&self) -> f64 {
        self.fmax.unwrap_or(self.sample_rate as f64 / 2.0)
    }
}

/// Converts audio signals into MFCC [`FeatureSequence`]s.
///
/// Window, mel filterbank and DCT basis are computed once in
/// [`MfccExtractor::new`]; [`MfccExtractor::extract`] is a pure function of
/// its input.
#[derive(Debug, Clone)]
pub struct MfccExtractor {
    cfg: MfccConfig,
    window: Vec<f64>,
    spectrum: PowerSpectrum,
    filterbank: Vec<MelFilter>,
    dct: Vec<Vec<f64>>,
}

/// Non-zero span of one triangular mel filter over the FFT bins.
#[derive(Debug, Clone)]
struct MelFilter {
    start: usize,
    weights: Vec<f64>,
}

impl MfccExtractor {
    pub fn new(cfg: MfccConfig) -> Result<Self, VoiceprintError> {
        cfg.validate()?;
        let window = hann_window(cfg.n_fft);
        let spectrum = PowerSpectrum::new(cfg.n_fft);
        let filterbank = mel_filterbank(
            cfg.num_mels,
            cfg.n_fft,
            cfg.sample_rate,
            cfg.fmin,
            cfg.resolved_fmax(),
        );
        let dct = dct_basis(cfg.num_coeffs, cfg.num_mels);
        Ok(Self {
            cfg,
            window,
            spectrum,
            filterbank,
            dct,
        })
    }

    pub fn config(&self) -> &MfccConfig {
        &self.cfg
    }

    /// Extracts features from a captured signal.
    ///
    /// Channels are averaged and the result is resampled to the analysis
    /// rate before framing.
    pub fn extract(&self, signal: &AudioSignal) -> Result<FeatureSequence, VoiceprintError> {
        if signal.is_empty() {
            return Err(VoiceprintError::Extraction("signal is empty".into()));
        }
        let secs = signal.duration().as_secs_f64();
        if secs > self.cfg.max_duration_secs {
            return Err(VoiceprintError::Extraction(format!(
                "signal lasts {secs:.1}s, limit is {}s",
                self.cfg.max_duration_secs
            )));
        }
        let mono = signal.to_mono();
        let samples = resample(&mono, signal.sample_rate(), self.cfg.sample_rate)
            .map_err(|e| VoiceprintError::Extraction(e.to_string()))?;
        self.extract_samples(&samples)
    }

    /// Extracts features from mono samples already at the analysis rate.
    pub fn extract_samples(&self, samples: &[f32]) -> Result<FeatureSequence, VoiceprintError> {
        let cfg = &self.cfg;
        if samples.len() < cfg.n_fft {
            return Err(VoiceprintError::Extraction(format!(
                "signal has {} samples, need at least {} for one analysis window",
                samples.len(),
                cfg.n_fft
            )));
        }

        let pad = if cfg.center { cfg.n_fft / 2 } else { 0 };
        let num_frames = (samples.len() + 2 * pad - cfg.n_fft) / cfg.hop_length + 1;
        let half_fft = cfg.n_fft / 2 + 1;

        let mut windowed = vec![0.0f64; cfg.n_fft];
        let mut scratch = vec![(0.0f64, 0.0f64); cfg.n_fft / 2];
        let mut power = vec![0.0f64; half_fft];
        let mut mel_db = Vec::with_capacity(num_frames);
        let mut max_db = f64::NEG_INFINITY;

        for t in 0..num_frames {
            let start = t * cfg.hop_length;

            // Window the (zero-padded) frame.
            for i in 0..cfg.n_fft {
                let p = start + i;
                let s = if p >= pad && p - pad < samples.len() {
                    samples[p - pad] as f64
                } else {
                    0.0
                };
                windowed[i] = s * self.window[i];
            }

            self.spectrum.compute(&windowed, &mut scratch, &mut power);

            // Mel energies in dB.
            let frame: Vec<f64> = self
                .filterbank
                .iter()
                .map(|f| {
                    let energy: f64 = f
                        .weights
                        .iter()
                        .zip(&power[f.start..])
                        .map(|(w, p)| w * p)
                        .sum();
                    10.0 * energy.max(AMIN).log10()
                })
                .collect();
            max_db = frame.iter().fold(max_db, |m, &v| m.max(v));
            mel_db.push(frame);
        }

        // Dynamic range is relative to the loudest band of the whole utterance.
        let floor = self.cfg.top_db.map(|top| max_db - top);

        let frames = mel_db
            .into_iter()
            .map(|mut frame| {
                if let Some(floor) = floor {
                    for v in &mut frame {
                        if *v < floor {
                            *v = floor;
                        }
                    }
                }
                self.dct
                    .iter()
                    .map(|basis| basis.iter().zip(&frame).map(|(c, v)| c * v).sum::<f64>() as f32)
                    .collect()
            })
            .collect();

        FeatureSequence::new(frames)
    }
}

/// Periodic Hann window.
fn hann_window(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos())
        .collect()
}

// Slaney mel scale: linear below 1 kHz, logarithmic above.
const MEL_F_SP: f64 = 200.0 / 3.0;
const MEL_MIN_LOG_HZ: f64 = 1000.0;
const MEL_MIN_LOG_MEL: f64 = MEL_MIN_LOG_HZ / MEL_F_SP;

fn mel_log_step() -> f64 {
    6.4f64.ln() / 27.0
}

fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MEL_MIN_LOG_HZ {
        MEL_MIN_LOG_MEL + (hz / MEL_MIN_LOG_HZ).ln() / mel_log_step()
    } else {
        hz / MEL_F_SP
    }
}

fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MEL_MIN_LOG_MEL {
        MEL_MIN_LOG_HZ * (mel_log_step() * (mel - MEL_MIN_LOG_MEL)).exp()
    } else {
        MEL_F_SP * mel
    }
}

/// Triangular mel filters with Slaney area normalisation.
fn mel_filterbank(
    num_mels: usize,
    n_fft: usize,
    sample_rate: u32,
    fmin: f64,
    fmax: f64,
) -> Vec<MelFilter> {
    let half_fft = n_fft / 2 + 1;
    let fft_freqs: Vec<f64> = (0..half_fft)
        .map(|k| k as f64 * sample_rate as f64 / n_fft as f64)
        .collect();

    let mel_min = hz_to_mel(fmin);
    let mel_max = hz_to_mel(fmax);
    let edges: Vec<f64> = (0..num_mels + 2)
        .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f64 / (num_mels + 1) as f64))
        .collect();

    (0..num_mels)
        .map(|m| {
            let (left, center, right) = (edges[m], edges[m + 1], edges[m + 2]);
            let enorm = 2.0 / (right - left);
            let weights: Vec<f64> = fft_freqs
                .iter()
                .map(|&f| {
                    let rising = (f - left) / (center - left);
                    let falling = (right - f) / (right - center);
                    rising.min(falling).max(0.0) * enorm
                })
                .collect();

            let start = weights.iter().position(|&w| w > 0.0).unwrap_or(0);
            let end = weights.iter().rposition(|&w| w > 0.0).map_or(start, |e| e + 1);
            MelFilter {
                start,
                weights: weights[start..end].to_vec(),
            }
        })
        .collect()
}

/// Orthonormal DCT-II basis, `[num_coeffs][num_mels]`.
fn dct_basis(num_coeffs: usize, num_mels: usize) -> Vec<Vec<f64>> {
    let n = num_mels as f64;
    (0..num_coeffs)
        .map(|k| {
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            (0..num_mels)
                .map(|i| scale * (PI * k as f64 * (2 * i + 1) as f64 / (2.0 * n)).cos())
                .collect()
        })
        .collect()
}

type Complex = (f64, f64);

fn cmul(a: Complex, b: Complex) -> Complex {
    (a.0 * b.0 - a.1 * b.1, a.0 * b.1 + a.1 * b.0)
}

/// Power spectrum of real frames of one fixed power-of-two length `n`.
///
/// The frame is packed into `n / 2` complex values (even samples as real
/// parts, odd samples as imaginary parts), transformed with a radix-2 FFT
/// over precomputed twiddles, and then split into the `n / 2 + 1`
/// non-negative frequency bins of the real transform.
#[derive(Debug, Clone)]
struct PowerSpectrum {
    half: usize,
    bitrev: Vec<usize>,
    /// `exp(-2πi j / half)` for `j < half / 2`.
    twiddles: Vec<Complex>,
    /// `exp(-2πi k / n)` for `k <= half`.
    split: Vec<Complex>,
}

impl PowerSpectrum {
    /// `n` must be a power of two and at least 4.
    fn new(n: usize) -> Self {
        let half = n / 2;
        let bits = half.trailing_zeros();
        let bitrev = (0..half)
            .map(|i| i.reverse_bits() >> (usize::BITS - bits))
            .collect();
        let unit = |k: usize, m: usize| {
            let angle = -2.0 * PI * k as f64 / m as f64;
            (angle.cos(), angle.sin())
        };
        Self {
            half,
            bitrev,
            twiddles: (0..half / 2).map(|j| unit(j, half)).collect(),
            split: (0..=half).map(|k| unit(k, n)).collect(),
        }
    }

    /// Writes `|X[k]|^2` for `k in 0..=n/2` into `power`.
    /// `scratch` holds `n / 2` values and is overwritten.
    fn compute(&self, frame: &[f64], scratch: &mut [Complex], power: &mut [f64]) {
        let half = self.half;
        for (z, &j) in scratch.iter_mut().zip(&self.bitrev) {
            *z = (frame[2 * j], frame[2 * j + 1]);
        }

        let mut len = 2;
        while len <= half {
            let step = half / len;
            for block in scratch.chunks_exact_mut(len) {
                let (lo, hi) = block.split_at_mut(len / 2);
                for (k, (a, b)) in lo.iter_mut().zip(hi.iter_mut()).enumerate() {
                    let t = cmul(self.twiddles[k * step], *b);
                    *b = (a.0 - t.0, a.1 - t.1);
                    *a = (a.0 + t.0, a.1 + t.1);
                }
            }
            len <<= 1;
        }

        for (k, p) in power.iter_mut().enumerate().take(half + 1) {
            let z = scratch[k % half];
            let m = scratch[(half - k) % half];
            let zc = (m.0, -m.1);
            let even = ((z.0 + zc.0) / 2.0, (z.1 + zc.1) / 2.0);
            // (z - zc) / 2i
            let odd = ((z.1 - zc.1) / 2.0, -(z.0 - zc.0) / 2.0);
            let t = cmul(self.split[k], odd);
            let x = (even.0 + t.0, even.1 + t.1);
            *p = x.0 * x.0 + x.1 * x.1;
        }
    }
}
