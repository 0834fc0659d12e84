use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use voicegate_audio::AudioSignal;

use crate::VoiceprintError;
use crate::dtw::FastDtw;
use crate::mfcc::MfccExtractor;
use crate::similarity::{SequenceDistance, argmin, score_all, score_all_parallel};
use crate::store::TemplateStore;
use crate::voiceprint::{FeatureSequence, SimilarityScore, TemplateKey};

/// What a decision has to establish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// The utterance must match an enrolled passphrase. Speaker is ignored.
    #[default]
    Passphrase,
    /// The utterance must match an enrolled passphrase and an enrolled
    /// speaker of that passphrase.
    PassphraseAndSpeaker,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Passphrase => "passphrase",
            Mode::PassphraseAndSpeaker => "passphrase_and_speaker",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = VoiceprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "passphrase" | "phrase" => Ok(Mode::Passphrase),
            "passphrase_and_speaker" | "speaker" => Ok(Mode::PassphraseAndSpeaker),
            other => Err(VoiceprintError::InvalidConfig(format!("unknown mode {other:?}"))),
        }
    }
}

/// Static decision thresholds. Distances are absolute DTW costs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Stage 1 passes when the best passphrase distance is below this.
    pub sentence_threshold: f64,
    /// Stage 2 passes when the best speaker distance is below this.
    pub person_threshold: f64,
    /// Speaker whose templates represent each passphrase in stage 1.
    pub baseline_speaker: String,
    /// Score candidates on scoped worker threads.
    pub parallel: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            sentence_threshold: 10000.0,
            person_threshold: 8500.0,
            baseline_speaker: "mariamM".to_string(),
            parallel: false,
        }
    }
}

impl PolicyConfig {
    pub fn validate(&self) -> Result<(), VoiceprintError> {
        if !self.sentence_threshold.is_finite() || !self.person_threshold.is_finite() {
            return Err(VoiceprintError::InvalidConfig("thresholds must be finite".into()));
        }
        if self.baseline_speaker.is_empty() {
            return Err(VoiceprintError::InvalidConfig("baseline_speaker is empty".into()));
        }
        Ok(())
    }
}

/// Gate check: `distance` must be strictly below `threshold`.
pub fn passes(distance: f64, threshold: f64) -> bool {
    distance < threshold
}

/// Outcome of one authentication attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResult {
    pub accepted: bool,
    /// Best matching passphrase, set once the passphrase gate passes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,
    /// Identified speaker, set only when a speaker decision grants access.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    /// Every score computed, passphrase stage first.
    pub scores: Vec<SimilarityScore>,
    /// How many leading entries of `scores` belong to the passphrase stage.
    pub passphrase_candidates: usize,
}

impl DecisionResult {
    pub fn passphrase_scores(&self) -> &[SimilarityScore] {
        &self.scores[..self.passphrase_candidates.min(self.scores.len())]
    }

    pub fn speaker_scores(&self) -> &[SimilarityScore] {
        &self.scores[self.passphrase_candidates.min(self.scores.len())..]
    }
}

/// Two-stage accept/deny policy over a [`TemplateStore`].
///
/// Stage 1 scores the query against the baseline speaker's template for
/// every passphrase and keeps the nearest. If that distance passes the
/// sentence threshold, passphrase mode grants. Speaker mode then scores
/// the query against every speaker's template for the chosen passphrase
/// and grants only if the nearest passes the person threshold.
///
/// The policy holds no per-request state; `decide` takes `&self` and can
/// be called concurrently.
pub struct DecisionPolicy<D: SequenceDistance = FastDtw> {
    store: TemplateStore,
    extractor: MfccExtractor,
    distance: D,
    cfg: PolicyConfig,
}

impl<D: SequenceDistance> DecisionPolicy<D> {
    /// Fails with `InvalidConfig` on bad thresholds and with
    /// `UnknownTemplate` when the baseline speaker is not enrolled.
    pub fn new(
        store: TemplateStore,
        extractor: MfccExtractor,
        distance: D,
        cfg: PolicyConfig,
    ) -> Result<Self, VoiceprintError> {
        cfg.validate()?;
        if !store.contains_speaker(&cfg.baseline_speaker) {
            return Err(VoiceprintError::UnknownTemplate {
                passphrase: "*".to_string(),
                speaker: cfg.baseline_speaker,
            });
        }
        Ok(Self {
            store,
            extractor,
            distance,
            cfg,
        })
    }

    pub fn store(&self) -> &TemplateStore {
        &self.store
    }

    pub fn extractor(&self) -> &MfccExtractor {
        &self.extractor
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.cfg
    }

    /// Extracts features from `signal` and decides on them.
    pub fn decide(&self, signal: &AudioSignal, mode: Mode) -> Result<DecisionResult, VoiceprintError> {
        let query = self.extractor.extract(signal)?;
        self.decide_features(&query, mode)
    }

    /// Decides on precomputed query features.
    pub fn decide_features(
        &self,
        query: &FeatureSequence,
        mode: Mode,
    ) -> Result<DecisionResult, VoiceprintError> {
        let baseline = self.cfg.baseline_speaker.as_str();
        let candidates: Vec<(TemplateKey, &FeatureSequence)> = self
            .store
            .all_for_passphrase_across_speakers(baseline)?
            .into_iter()
            .map(|(p, f)| (TemplateKey::new(p, baseline), f))
            .collect();

        let mut scores = self.score(query, &candidates)?;
        let passphrase_candidates = scores.len();
        let best = argmin(&scores)
            .ok_or_else(|| VoiceprintError::Comparison("no passphrase candidates".into()))?;
        let best_passphrase = scores[best].key.passphrase.clone();
        let d_phrase = scores[best].distance;
        debug!(passphrase = %best_passphrase, distance = d_phrase, "passphrase stage");

        if !passes(d_phrase, self.cfg.sentence_threshold) {
            info!(%mode, distance = d_phrase, threshold = self.cfg.sentence_threshold, "denied at passphrase gate");
            return Ok(DecisionResult {
                accepted: false,
                passphrase: None,
                speaker: None,
                scores,
                passphrase_candidates,
            });
        }

        if mode == Mode::Passphrase {
            info!(%mode, passphrase = %best_passphrase, distance = d_phrase, "granted");
            return Ok(DecisionResult {
                accepted: true,
                passphrase: Some(best_passphrase),
                speaker: None,
                scores,
                passphrase_candidates,
            });
        }

        let candidates: Vec<(TemplateKey, &FeatureSequence)> = self
            .store
            .all_for_speaker_within_passphrase(&best_passphrase)?
            .into_iter()
            .map(|(s, f)| (TemplateKey::new(best_passphrase.as_str(), s), f))
            .collect();
        let speaker_scores = self.score(query, &candidates)?;
        let best = argmin(&speaker_scores)
            .ok_or_else(|| VoiceprintError::Comparison("no speaker candidates".into()))?;
        let best_speaker = speaker_scores[best].key.speaker.clone();
        let d_speaker = speaker_scores[best].distance;
        debug!(speaker = %best_speaker, distance = d_speaker, "speaker stage");
        scores.extend(speaker_scores);

        let accepted = passes(d_speaker, self.cfg.person_threshold);
        if accepted {
            info!(%mode, passphrase = %best_passphrase, speaker = %best_speaker, distance = d_speaker, "granted");
        } else {
            info!(%mode, distance = d_speaker, threshold = self.cfg.person_threshold, "denied at speaker gate");
        }

        Ok(DecisionResult {
            accepted,
            passphrase: Some(best_passphrase),
            speaker: accepted.then_some(best_speaker),
            scores,
            passphrase_candidates,
        })
    }

    fn score(
        &self,
        query: &FeatureSequence,
        candidates: &[(TemplateKey, &FeatureSequence)],
    ) -> Result<Vec<SimilarityScore>, VoiceprintError> {
        if self.cfg.parallel {
            score_all_parallel(&self.distance, query, candidates)
        } else {
            score_all(&self.distance, query, candidates)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mfcc::MfccConfig;
    use crate::store::{Enrollment, Template};
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// Template frames carry a marker; the scripted distance looks it up.
    struct Scripted {
        table: HashMap<u32, f64>,
    }

    impl SequenceDistance for Scripted {
        fn distance(&self, a: &FeatureSequence, b: &FeatureSequence) -> Result<f64, VoiceprintError> {
            if a.is_empty() || b.is_empty() {
                return Err(VoiceprintError::Comparison("empty".into()));
            }
            let marker = b.frames()[0][0] as u32;
            Ok(self.table.get(&marker).copied().unwrap_or(1e9))
        }
    }

    const PHRASES: [&str; 3] = ["open", "unlock", "give"];
    const SPEAKERS: [&str; 3] = ["ann", "base", "cy"];

    fn marker(p: usize, s: usize) -> u32 {
        (p * 10 + s) as u32
    }

    fn policy(distances: &[((usize, usize), f64)], cfg: PolicyConfig) -> DecisionPolicy<Scripted> {
        let enrollment = Enrollment {
            passphrases: PHRASES.map(String::from).to_vec(),
            speakers: SPEAKERS.map(String::from).to_vec(),
        };
        let mut templates = Vec::new();
        for (p, phrase) in PHRASES.iter().enumerate() {
            for (s, speaker) in SPEAKERS.iter().enumerate() {
                let f = FeatureSequence::new(vec![vec![marker(p, s) as f32]]).unwrap();
                templates.push(Template::new(TemplateKey::new(*phrase, *speaker), f));
            }
        }
        let store = TemplateStore::from_templates(enrollment, templates).unwrap();
        let table = distances
            .iter()
            .map(|&((p, s), d)| (marker(p, s), d))
            .collect();
        DecisionPolicy::new(
            store,
            MfccExtractor::new(MfccConfig::default()).unwrap(),
            Scripted { table },
            cfg,
        )
        .unwrap()
    }

    fn cfg() -> PolicyConfig {
        PolicyConfig {
            baseline_speaker: "base".into(),
            ..PolicyConfig::default()
        }
    }

    fn query() -> FeatureSequence {
        FeatureSequence::new(vec![vec![0.5]]).unwrap()
    }

    #[test]
    fn defaults() {
        let c = PolicyConfig::default();
        assert_eq!(c.sentence_threshold, 10000.0);
        assert_eq!(c.person_threshold, 8500.0);
        assert_eq!(c.baseline_speaker, "mariamM");
        assert!(!c.parallel);
        assert_eq!(Mode::default(), Mode::Passphrase);
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("passphrase".parse::<Mode>().unwrap(), Mode::Passphrase);
        assert_eq!(
            "passphrase_and_speaker".parse::<Mode>().unwrap(),
            Mode::PassphraseAndSpeaker
        );
        assert_eq!("speaker".parse::<Mode>().unwrap(), Mode::PassphraseAndSpeaker);
        assert!("both".parse::<Mode>().is_err());
        assert_eq!(Mode::PassphraseAndSpeaker.to_string(), "passphrase_and_speaker");
        let json = serde_json::to_string(&Mode::PassphraseAndSpeaker).unwrap();
        assert_eq!(json, "\"passphrase_and_speaker\"");
    }

    #[test]
    fn gate_is_strict() {
        assert!(passes(9999.0, 10000.0));
        assert!(!passes(10000.0, 10000.0));
        assert!(!passes(10001.0, 10000.0));
    }

    #[test]
    fn sentence_gate_boundary() {
        let p = policy(&[((0, 1), 9999.0), ((1, 1), 20000.0), ((2, 1), 30000.0)], cfg());
        let r = p.decide_features(&query(), Mode::Passphrase).unwrap();
        assert!(r.accepted);
        assert_eq!(r.passphrase.as_deref(), Some("open"));

        let p = policy(&[((0, 1), 10000.0), ((1, 1), 20000.0), ((2, 1), 30000.0)], cfg());
        let r = p.decide_features(&query(), Mode::Passphrase).unwrap();
        assert!(!r.accepted);
        assert_eq!(r.passphrase, None);
    }

    #[test]
    fn passphrase_mode_never_identifies() {
        let p = policy(
            &[((0, 1), 20000.0), ((1, 1), 1200.0), ((2, 1), 30000.0), ((1, 0), 1.0)],
            cfg(),
        );
        let r = p.decide_features(&query(), Mode::Passphrase).unwrap();
        assert!(r.accepted);
        assert_eq!(r.passphrase.as_deref(), Some("unlock"));
        assert_eq!(r.speaker, None);
        assert_eq!(r.scores.len(), 3);
        assert!(r.speaker_scores().is_empty());
    }

    #[test]
    fn stage_one_uses_baseline_speaker() {
        let p = policy(&[((0, 1), 500.0), ((1, 1), 600.0), ((2, 1), 700.0)], cfg());
        let r = p.decide_features(&query(), Mode::Passphrase).unwrap();
        for s in r.passphrase_scores() {
            assert_eq!(s.key.speaker, "base");
        }
        let phrases: Vec<&str> = r.scores.iter().map(|s| s.key.passphrase.as_str()).collect();
        assert_eq!(phrases, PHRASES);
    }

    /// Replays distances in call order, ignoring its inputs.
    struct Replay(Mutex<VecDeque<f64>>);

    impl SequenceDistance for Replay {
        fn distance(&self, _: &FeatureSequence, _: &FeatureSequence) -> Result<f64, VoiceprintError> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| VoiceprintError::Comparison("script exhausted".into()))
        }
    }

    fn replay(distances: &[f64]) -> DecisionPolicy<Replay> {
        let base = policy(&[], cfg());
        DecisionPolicy::new(
            base.store.clone(),
            base.extractor.clone(),
            Replay(Mutex::new(distances.iter().copied().collect())),
            cfg(),
        )
        .unwrap()
    }

    #[test]
    fn speaker_gate_denies() {
        // stage 1 picks "open" at 5000; every speaker then scores >= 9000
        let p = replay(&[5000.0, 20000.0, 30000.0, 9000.0, 9100.0, 9200.0]);
        let r = p.decide_features(&query(), Mode::PassphraseAndSpeaker).unwrap();
        assert!(!r.accepted);
        assert_eq!(r.speaker, None);
        assert_eq!(r.passphrase.as_deref(), Some("open"));
        assert_eq!(r.passphrase_scores().len(), 3);
        assert_eq!(r.speaker_scores().len(), 3);
        assert_eq!(r.speaker_scores()[0].distance, 9000.0);
    }

    #[test]
    fn speaker_gate_boundary() {
        let p = replay(&[5000.0, 20000.0, 30000.0, 8500.0, 9100.0, 9200.0]);
        let r = p.decide_features(&query(), Mode::PassphraseAndSpeaker).unwrap();
        assert!(!r.accepted);

        let p = replay(&[5000.0, 20000.0, 30000.0, 9100.0, 8499.0, 9200.0]);
        let r = p.decide_features(&query(), Mode::PassphraseAndSpeaker).unwrap();
        assert!(r.accepted);
        assert_eq!(r.speaker.as_deref(), Some("base"));
    }

    #[test]
    fn identifies_nearest_speaker() {
        let p = policy(
            &[
                ((0, 1), 20000.0),
                ((1, 1), 3000.0),
                ((2, 1), 30000.0),
                ((1, 0), 8000.0),
                ((1, 2), 1200.0),
            ],
            cfg(),
        );
        let r = p.decide_features(&query(), Mode::PassphraseAndSpeaker).unwrap();
        assert!(r.accepted);
        assert_eq!(r.passphrase.as_deref(), Some("unlock"));
        assert_eq!(r.speaker.as_deref(), Some("cy"));
        let speakers: Vec<&str> = r.speaker_scores().iter().map(|s| s.key.speaker.as_str()).collect();
        assert_eq!(speakers, SPEAKERS);
        for s in r.speaker_scores() {
            assert_eq!(s.key.passphrase, "unlock");
        }
    }

    #[test]
    fn denied_at_gate_a_skips_speaker_stage() {
        let p = policy(&[((0, 1), 15000.0), ((1, 1), 20000.0), ((2, 1), 30000.0)], cfg());
        let r = p.decide_features(&query(), Mode::PassphraseAndSpeaker).unwrap();
        assert!(!r.accepted);
        assert_eq!(r.scores.len(), 3);
        assert_eq!(r.passphrase_candidates, 3);
    }

    #[test]
    fn ties_pick_first_in_enumeration_order() {
        let p = policy(
            &[
                ((0, 1), 7000.0),
                ((1, 1), 5200.0),
                ((2, 1), 5200.0),
                ((1, 0), 4000.0),
                ((1, 2), 4000.0),
            ],
            cfg(),
        );
        let r = p.decide_features(&query(), Mode::PassphraseAndSpeaker).unwrap();
        assert_eq!(r.passphrase.as_deref(), Some("unlock"));
        assert_eq!(r.speaker.as_deref(), Some("ann"));
    }

    #[test]
    fn parallel_scoring_matches_sequential() {
        let distances = [
            ((0, 1), 7000.0),
            ((1, 1), 3000.0),
            ((2, 1), 5200.0),
            ((1, 0), 4000.0),
            ((1, 2), 100.0),
        ];
        let seq = policy(&distances, cfg());
        let mut c = cfg();
        c.parallel = true;
        let par = policy(&distances, c);
        let a = seq.decide_features(&query(), Mode::PassphraseAndSpeaker).unwrap();
        let b = par.decide_features(&query(), Mode::PassphraseAndSpeaker).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn errors_propagate() {
        let p = policy(&[((0, 1), 1.0)], cfg());
        let err = p
            .decide_features(&FeatureSequence::default(), Mode::Passphrase)
            .unwrap_err();
        assert!(matches!(err, VoiceprintError::Comparison(_)));

        let empty = AudioSignal::mono(Vec::new(), 22050).unwrap();
        let err = p.decide(&empty, Mode::Passphrase).unwrap_err();
        assert!(matches!(err, VoiceprintError::Extraction(_)));
    }

    #[test]
    fn unknown_baseline_rejected() {
        let enrollment = Enrollment {
            passphrases: vec!["open".into()],
            speakers: vec!["ann".into()],
        };
        let f = FeatureSequence::new(vec![vec![0.0]]).unwrap();
        let store = TemplateStore::from_templates(
            enrollment,
            [Template::new(TemplateKey::new("open", "ann"), f)],
        )
        .unwrap();
        let result = DecisionPolicy::new(
            store,
            MfccExtractor::new(MfccConfig::default()).unwrap(),
            FastDtw::default(),
            PolicyConfig::default(),
        );
        assert!(matches!(result, Err(VoiceprintError::UnknownTemplate { .. })));
    }

    #[test]
    fn result_serializes_for_presentation() {
        let p = policy(&[((0, 1), 10.0), ((0, 0), 20.0), ((0, 2), 30.0)], cfg());
        let r = p.decide_features(&query(), Mode::PassphraseAndSpeaker).unwrap();
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["accepted"], true);
        assert_eq!(json["speaker"], "base");
        assert_eq!(json["scores"].as_array().unwrap().len(), 6);
        assert_eq!(json["scores"][0]["key"]["passphrase"], "open");
    }
}
