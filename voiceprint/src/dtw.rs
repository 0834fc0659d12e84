//! FastDTW: approximate dynamic time warping in near-linear time.
//!
//! # Algorithm
//!
//! Both sequences are coarsened by averaging adjacent frame pairs, aligned
//! recursively, and the coarse warp path is projected back to full
//! resolution. The projected path, widened by `radius` cells, bounds the
//! search window of the full-resolution DTW. Sequences shorter than
//! `radius + 2` frames fall back to exact DTW.
//!
//! Local cost is the Euclidean distance between coefficient vectors. When
//! several predecessors have equal cost the step is chosen in the order
//! (i-1, j), (i, j-1), (i-1, j-1).
//!
//! The search window depends on which sequence is coarsened into which
//! rows, so `distance(a, b)` may differ from `distance(b, a)`.

use serde::{Deserialize, Serialize};

use crate::VoiceprintError;
use crate::similarity::SequenceDistance;
use crate::voiceprint::FeatureSequence;

/// Configures [`FastDtw`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DtwConfig {
    /// Cells added on each side of the projected path (default: 1, minimum: 1).
    pub radius: usize,
}

impl Default for DtwConfig {
    fn default() -> Self {
        Self { radius: 1 }
    }
}

/// Result of aligning two sequences.
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    /// Accumulated local cost along the warp path.
    pub distance: f64,
    /// Matched `(index in a, index in b)` pairs from `(0, 0)` to the last frames.
    pub path: Vec<(usize, usize)>,
}

/// Bounded-radius approximate DTW.
#[derive(Debug, Clone)]
pub struct FastDtw {
    radius: usize,
}

impl FastDtw {
    pub fn new(cfg: DtwConfig) -> Result<Self, VoiceprintError> {
        if cfg.radius == 0 {
            return Err(VoiceprintError::InvalidConfig("dtw: radius must be at least 1".into()));
        }
        Ok(Self { radius: cfg.radius })
    }

    pub fn radius(&self) -> usize {
        self.radius
    }

    /// Aligns `a` against `b` and returns the cost and warp path.
    pub fn align(&self, a: &FeatureSequence, b: &FeatureSequence) -> Result<Alignment, VoiceprintError> {
        if a.is_empty() || b.is_empty() {
            return Err(VoiceprintError::Comparison(format!(
                "cannot align empty sequence ({} vs {} frames)",
                a.len(),
                b.len()
            )));
        }
        if a.dim() != b.dim() {
            return Err(VoiceprintError::Comparison(format!(
                "dimension mismatch: {} vs {} coefficients",
                a.dim(),
                b.dim()
            )));
        }

        let alignment = fast_dtw(a.frames(), b.frames(), self.radius);
        if !alignment.distance.is_finite() {
            return Err(VoiceprintError::Comparison(
                "search window does not reach the final frame pair".into(),
            ));
        }
        Ok(alignment)
    }
}

impl Default for FastDtw {
    fn default() -> Self {
        Self { radius: DtwConfig::default().radius }
    }
}

impl SequenceDistance for FastDtw {
    fn distance(&self, a: &FeatureSequence, b: &FeatureSequence) -> Result<f64, VoiceprintError> {
        self.align(a, b).map(|al| al.distance)
    }
}

fn fast_dtw(x: &[Vec<f32>], y: &[Vec<f32>], radius: usize) -> Alignment {
    let min_size = radius + 2;
    if x.len() < min_size || y.len() < min_size {
        return dtw(x, y, &Window::full(x.len(), y.len()));
    }

    let coarse = fast_dtw(&reduce_by_half(x), &reduce_by_half(y), radius);
    let window = Window::expand(&coarse.path, x.len(), y.len(), radius);
    dtw(x, y, &window)
}

/// Averages adjacent frame pairs. A trailing odd frame is dropped.
fn reduce_by_half(x: &[Vec<f32>]) -> Vec<Vec<f32>> {
    x.chunks_exact(2)
        .map(|pair| pair[0].iter().zip(&pair[1]).map(|(a, b)| (a + b) / 2.0).collect())
        .collect()
}

fn euclidean(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&p, &q)| {
            let d = p as f64 - q as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Per-row column span `[lo, hi)` that the DTW is allowed to visit.
/// Each row's span is contiguous and spans never move left row over row.
struct Window {
    rows: Vec<(usize, usize)>,
}

impl Window {
    fn full(len_x: usize, len_y: usize) -> Self {
        Self {
            rows: vec![(0, len_y); len_x],
        }
    }

    /// Projects a coarse path to full resolution, widened by `radius`.
    fn expand(path: &[(usize, usize)], len_x: usize, len_y: usize, radius: usize) -> Self {
        let mut rows = vec![(usize::MAX, 0usize); len_x];
        let r = radius as isize;

        for &(ci, cj) in path {
            let col_lo = 2 * cj.saturating_sub(radius);
            let col_hi = (2 * (cj + radius) + 1).min(len_y - 1);
            if col_lo > col_hi {
                continue;
            }
            for a in -r..=r {
                let row = ci as isize + a;
                if row < 0 {
                    continue;
                }
                for fine in [2 * row as usize, 2 * row as usize + 1] {
                    if fine >= len_x {
                        continue;
                    }
                    let span = &mut rows[fine];
                    span.0 = span.0.min(col_lo);
                    span.1 = span.1.max(col_hi + 1);
                }
            }
        }

        for span in &mut rows {
            if span.0 == usize::MAX {
                *span = (0, 0);
            }
        }
        Self { rows }
    }
}

#[derive(Clone, Copy)]
enum Step {
    Up,
    Left,
    Diag,
}

/// DTW restricted to `window`.
fn dtw(x: &[Vec<f32>], y: &[Vec<f32>], window: &Window) -> Alignment {
    let n = x.len();
    let mut cost: Vec<Vec<f64>> = Vec::with_capacity(n);
    let mut steps: Vec<Vec<Step>> = Vec::with_capacity(n);

    // Accumulated cost of cell (i, j) in rows already computed; (-1, -1) is the origin.
    let at = |cost: &[Vec<f64>], i: isize, j: isize| -> f64 {
        if i < 0 && j < 0 {
            return 0.0;
        }
        if i < 0 || j < 0 {
            return f64::INFINITY;
        }
        let (lo, hi) = window.rows[i as usize];
        let j = j as usize;
        if j < lo || j >= hi {
            f64::INFINITY
        } else {
            cost[i as usize][j - lo]
        }
    };

    for i in 0..n {
        let (lo, hi) = window.rows[i];
        let mut row = Vec::with_capacity(hi.saturating_sub(lo));
        let mut row_steps = Vec::with_capacity(hi.saturating_sub(lo));

        for j in lo..hi {
            let d = euclidean(&x[i], &y[j]);
            let up = at(&cost, i as isize - 1, j as isize);
            let left = if j > lo { row[j - lo - 1] } else { f64::INFINITY };
            let diag = at(&cost, i as isize - 1, j as isize - 1);

            let (best, step) = if up <= left && up <= diag {
                (up, Step::Up)
            } else if left <= diag {
                (left, Step::Left)
            } else {
                (diag, Step::Diag)
            };
            row.push(best + d);
            row_steps.push(step);
        }

        cost.push(row);
        steps.push(row_steps);
    }

    let distance = at(&cost, n as isize - 1, y.len() as isize - 1);
    if !distance.is_finite() {
        return Alignment {
            distance,
            path: Vec::new(),
        };
    }

    let mut path = Vec::with_capacity(n + y.len());
    let (mut i, mut j) = (n as isize - 1, y.len() as isize - 1);
    while i >= 0 && j >= 0 {
        path.push((i as usize, j as usize));
        let lo = window.rows[i as usize].0;
        match steps[i as usize][j as usize - lo] {
            Step::Up => i -= 1,
            Step::Left => j -= 1,
            Step::Diag => {
                i -= 1;
                j -= 1;
            }
        }
    }
    path.reverse();

    Alignment { distance, path }
}
