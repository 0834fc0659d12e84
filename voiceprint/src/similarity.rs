use std::num::NonZeroUsize;
use std::thread;

use crate::VoiceprintError;
use crate::voiceprint::{FeatureSequence, SimilarityScore, TemplateKey};

/// Measures how far apart two feature sequences are.
///
/// Returns a non-negative distance, lower meaning more similar, with
/// `distance(a, a) == 0`. Implementations are not required to be
/// symmetric.
///
/// # Thread Safety
///
/// Implementations must be safe for concurrent use; scoring may fan out
/// across worker threads.
pub trait SequenceDistance: Send + Sync {
    fn distance(&self, a: &FeatureSequence, b: &FeatureSequence) -> Result<f64, VoiceprintError>;
}

/// Scores `query` against every candidate, one score per candidate in
/// input order. The result is not sorted.
///
/// An empty `query` fails with [`VoiceprintError::Comparison`] even when
/// there are no candidates.
pub fn score_all<D: SequenceDistance + ?Sized>(
    engine: &D,
    query: &FeatureSequence,
    candidates: &[(TemplateKey, &FeatureSequence)],
) -> Result<Vec<SimilarityScore>, VoiceprintError> {
    check_query(query)?;
    candidates
        .iter()
        .map(|(key, template)| {
            Ok(SimilarityScore {
                key: key.clone(),
                distance: engine.distance(query, template)?,
            })
        })
        .collect()
}

/// Same contract as [`score_all`]. Candidates are split into contiguous
/// chunks, one per scoped worker, with at most
/// [`thread::available_parallelism`] workers. Results are gathered back in
/// input order.
pub fn score_all_parallel<D: SequenceDistance + ?Sized>(
    engine: &D,
    query: &FeatureSequence,
    candidates: &[(TemplateKey, &FeatureSequence)],
) -> Result<Vec<SimilarityScore>, VoiceprintError> {
    let workers = thread::available_parallelism().map_or(1, NonZeroUsize::get);
    score_in_chunks(engine, query, candidates, workers)
}

fn check_query(query: &FeatureSequence) -> Result<(), VoiceprintError> {
    if query.is_empty() {
        return Err(VoiceprintError::Comparison("query sequence is empty".into()));
    }
    Ok(())
}

fn score_in_chunks<D: SequenceDistance + ?Sized>(
    engine: &D,
    query: &FeatureSequence,
    candidates: &[(TemplateKey, &FeatureSequence)],
    workers: usize,
) -> Result<Vec<SimilarityScore>, VoiceprintError> {
    check_query(query)?;
    if candidates.is_empty() {
        return Ok(Vec::new());
    }
    let chunk = candidates.len().div_ceil(workers.max(1));

    thread::scope(|s| {
        let handles: Vec<_> = candidates
            .chunks(chunk)
            .map(|part| s.spawn(move || score_all(engine, query, part)))
            .collect();

        let mut out = Vec::with_capacity(candidates.len());
        for h in handles {
            let part = h
                .join()
                .map_err(|_| VoiceprintError::Comparison("scoring worker panicked".into()))??;
            out.extend(part);
        }
        Ok(out)
    })
}

/// Index of the smallest distance. Ties resolve to the earliest score.
pub fn argmin(scores: &[SimilarityScore]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, s) in scores.iter().enumerate() {
        match best {
            Some(b) if scores[b].distance <= s.distance => {}
            _ => best = Some(i),
        }
    }
    best
}
