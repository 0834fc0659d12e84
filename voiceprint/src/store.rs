use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use voicegate_audio::AudioSignal;

use crate::VoiceprintError;
use crate::mfcc::MfccExtractor;
use crate::voiceprint::{FeatureSequence, TemplateKey};

/// Declares which (passphrase, speaker) pairs must be enrolled.
///
/// Every passphrase is enrolled by every speaker. The order of both lists
/// is the enumeration order used when scoring, and therefore decides ties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Enrollment {
    pub passphrases: Vec<String>,
    pub speakers: Vec<String>,
}

impl Default for Enrollment {
    fn default() -> Self {
        Self {
            passphrases: ["OpenTheDoor", "UnlockMiddleGate", "GiveMeAccess"]
                .map(String::from)
                .to_vec(),
            speakers: [
                "mariamH", "mariamM", "ali", "mina", "ahmed", "hazem", "nourhan", "mayar",
            ]
            .map(String::from)
            .to_vec(),
        }
    }
}

impl Enrollment {
    pub fn validate(&self) -> Result<(), VoiceprintError> {
        check_labels("passphrase", &self.passphrases)?;
        check_labels("speaker", &self.speakers)
    }

    /// All required keys, passphrase-major.
    pub fn keys(&self) -> impl Iterator<Item = TemplateKey> + '_ {
        self.passphrases.iter().flat_map(move |p| {
            self.speakers
                .iter()
                .map(move |s| TemplateKey::new(p.as_str(), s.as_str()))
        })
    }
}

fn check_labels(kind: &str, labels: &[String]) -> Result<(), VoiceprintError> {
    if labels.is_empty() {
        return Err(VoiceprintError::InvalidConfig(format!("enrollment: no {kind}s declared")));
    }
    let mut seen = HashSet::new();
    for label in labels {
        if label.is_empty() {
            return Err(VoiceprintError::InvalidConfig(format!("enrollment: empty {kind} label")));
        }
        if !seen.insert(label.as_str()) {
            return Err(VoiceprintError::InvalidConfig(format!(
                "enrollment: duplicate {kind} {label:?}"
            )));
        }
    }
    Ok(())
}

/// Supplies one reference recording per (passphrase, speaker) pair.
///
/// Returning `Ok(None)` means the source has no recording for the pair;
/// [`TemplateStore::build`] reports that as
/// [`VoiceprintError::MissingTemplate`].
pub trait TemplateSource {
    fn fetch(&self, key: &TemplateKey) -> Result<Option<AudioSignal>, VoiceprintError>;
}

/// In-memory [`TemplateSource`].
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    recordings: HashMap<TemplateKey, AudioSignal>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the recording for `key`.
    pub fn insert(&mut self, key: TemplateKey, signal: AudioSignal) {
        self.recordings.insert(key, signal);
    }

    pub fn len(&self) -> usize {
        self.recordings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recordings.is_empty()
    }
}

impl TemplateSource for MemorySource {
    fn fetch(&self, key: &TemplateKey) -> Result<Option<AudioSignal>, VoiceprintError> {
        Ok(self.recordings.get(key).cloned())
    }
}

/// One enrolled reference utterance.
#[derive(Debug, Clone)]
pub struct Template {
    key: TemplateKey,
    features: FeatureSequence,
}

impl Template {
    pub fn new(key: TemplateKey, features: FeatureSequence) -> Self {
        Self { key, features }
    }

    pub fn key(&self) -> &TemplateKey {
        &self.key
    }

    pub fn features(&self) -> &FeatureSequence {
        &self.features
    }
}

/// Reference features for every enrolled (passphrase, speaker) pair.
///
/// Built once, read-only afterwards: there is no mutation API, so the
/// store can be shared across threads without locking.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    enrollment: Enrollment,
    templates: HashMap<String, HashMap<String, Template>>,
}

impl TemplateStore {
    /// Extracts features for every pair declared in `enrollment`.
    ///
    /// Fails on the first pair the source cannot supply; no partial store
    /// is returned.
    pub fn build<S: TemplateSource + ?Sized>(
        enrollment: Enrollment,
        source: &S,
        extractor: &MfccExtractor,
    ) -> Result<Self, VoiceprintError> {
        enrollment.validate()?;

        let mut templates = Vec::with_capacity(enrollment.passphrases.len() * enrollment.speakers.len());
        for key in enrollment.keys() {
            let signal = source.fetch(&key)?.ok_or_else(|| VoiceprintError::MissingTemplate {
                passphrase: key.passphrase.clone(),
                speaker: key.speaker.clone(),
            })?;
            let features = extractor.extract(&signal)?;
            debug!(template = %key, frames = features.len(), "template extracted");
            templates.push(Template::new(key, features));
        }

        let store = Self::from_templates(enrollment, templates)?;
        info!(
            templates = store.len(),
            passphrases = store.passphrases().len(),
            speakers = store.speakers().len(),
            "template store built"
        );
        Ok(store)
    }

    /// Assembles a store from precomputed templates.
    ///
    /// Every declared pair must be present. Templates for undeclared pairs
    /// are rejected, and a repeated pair keeps the last template given.
    pub fn from_templates(
        enrollment: Enrollment,
        templates: impl IntoIterator<Item = Template>,
    ) -> Result<Self, VoiceprintError> {
        enrollment.validate()?;

        let mut map: HashMap<String, HashMap<String, Template>> = HashMap::new();
        for t in templates {
            if !enrollment.passphrases.contains(&t.key.passphrase)
                || !enrollment.speakers.contains(&t.key.speaker)
            {
                return Err(VoiceprintError::UnknownTemplate {
                    passphrase: t.key.passphrase,
                    speaker: t.key.speaker,
                });
            }
            map.entry(t.key.passphrase.clone())
                .or_default()
                .insert(t.key.speaker.clone(), t);
        }

        for key in enrollment.keys() {
            let present = map
                .get(&key.passphrase)
                .is_some_and(|speakers| speakers.contains_key(&key.speaker));
            if !present {
                return Err(VoiceprintError::MissingTemplate {
                    passphrase: key.passphrase,
                    speaker: key.speaker,
                });
            }
        }

        Ok(Self {
            enrollment,
            templates: map,
        })
    }

    /// Passphrases in enumeration order.
    pub fn passphrases(&self) -> &[String] {
        &self.enrollment.passphrases
    }

    /// Speakers in enumeration order.
    pub fn speakers(&self) -> &[String] {
        &self.enrollment.speakers
    }

    pub fn enrollment(&self) -> &Enrollment {
        &self.enrollment
    }

    /// Number of templates.
    pub fn len(&self) -> usize {
        self.templates.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_speaker(&self, speaker: &str) -> bool {
        self.enrollment.speakers.iter().any(|s| s == speaker)
    }

    pub fn lookup(&self, passphrase: &str, speaker: &str) -> Result<&FeatureSequence, VoiceprintError> {
        self.templates
            .get(passphrase)
            .and_then(|speakers| speakers.get(speaker))
            .map(Template::features)
            .ok_or_else(|| VoiceprintError::UnknownTemplate {
                passphrase: passphrase.to_string(),
                speaker: speaker.to_string(),
            })
    }

    /// One template per passphrase, all taken from `speaker`.
    ///
    /// Used to identify the spoken passphrase against a single baseline
    /// speaker.
    pub fn all_for_passphrase_across_speakers(
        &self,
        speaker: &str,
    ) -> Result<Vec<(&str, &FeatureSequence)>, VoiceprintError> {
        self.enrollment
            .passphrases
            .iter()
            .map(|p| Ok((p.as_str(), self.lookup(p, speaker)?)))
            .collect()
    }

    /// Every speaker's template for `passphrase`.
    pub fn all_for_speaker_within_passphrase(
        &self,
        passphrase: &str,
    ) -> Result<Vec<(&str, &FeatureSequence)>, VoiceprintError> {
        self.enrollment
            .speakers
            .iter()
            .map(|s| Ok((s.as_str(), self.lookup(passphrase, s)?)))
            .collect()
    }

    /// All templates, passphrase-major in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = &Template> + '_ {
        self.enrollment.passphrases.iter().flat_map(move |p| {
            self.enrollment
                .speakers
                .iter()
                .filter_map(move |s| self.templates.get(p).and_then(|m| m.get(s)))
        })
    }
}
