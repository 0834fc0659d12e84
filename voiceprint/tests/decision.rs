//! End-to-end decisions on synthetic tones.
//!
//! Each passphrase is a tone in its own frequency region and each speaker
//! shifts that tone slightly, so the nearest template is known in advance.

use std::f64::consts::PI;
use std::io::Cursor;

use voicegate_audio::{AudioSignal, decode_wav, encode_wav};
use voicegate_voiceprint::{
    DecisionPolicy, Enrollment, FastDtw, MemorySource, MfccConfig, MfccExtractor, Mode,
    PolicyConfig, TemplateKey, TemplateStore, VoiceprintError,
};

const RATE: u32 = 22050;
const PHRASE_HZ: [f64; 3] = [300.0, 900.0, 2000.0];

fn tone(freq: f64, seconds: f64) -> AudioSignal {
    let n = (seconds * RATE as f64) as usize;
    let samples = (0..n)
        .map(|i| (0.5 * (2.0 * PI * freq * i as f64 / RATE as f64).sin()) as f32)
        .collect();
    AudioSignal::mono(samples, RATE).unwrap()
}

fn voice(phrase: usize, speaker: usize) -> AudioSignal {
    tone(PHRASE_HZ[phrase] + 20.0 * speaker as f64, 1.5)
}

fn source(enrollment: &Enrollment) -> MemorySource {
    let mut src = MemorySource::new();
    for (p, phrase) in enrollment.passphrases.iter().enumerate() {
        for (s, speaker) in enrollment.speakers.iter().enumerate() {
            src.insert(TemplateKey::new(phrase.as_str(), speaker.as_str()), voice(p, s));
        }
    }
    src
}

fn speaker_index(enrollment: &Enrollment, name: &str) -> usize {
    enrollment.speakers.iter().position(|s| s == name).unwrap()
}

fn policy(cfg: PolicyConfig) -> DecisionPolicy {
    let enrollment = Enrollment::default();
    let extractor = MfccExtractor::new(MfccConfig::default()).unwrap();
    let store = TemplateStore::build(enrollment.clone(), &source(&enrollment), &extractor).unwrap();
    DecisionPolicy::new(store, extractor, FastDtw::default(), cfg).unwrap()
}

fn lenient() -> PolicyConfig {
    PolicyConfig {
        sentence_threshold: 1e12,
        person_threshold: 1e12,
        ..PolicyConfig::default()
    }
}

#[test]
fn identifies_passphrase_and_speaker() {
    let p = policy(lenient());
    let e = p.store().enrollment().clone();
    let mina = speaker_index(&e, "mina");

    let r = p.decide(&voice(1, mina), Mode::PassphraseAndSpeaker).unwrap();
    assert!(r.accepted);
    assert_eq!(r.passphrase.as_deref(), Some("UnlockMiddleGate"));
    assert_eq!(r.speaker.as_deref(), Some("mina"));
    assert_eq!(r.passphrase_scores().len(), 3);
    assert_eq!(r.speaker_scores().len(), 8);

    let own = r
        .speaker_scores()
        .iter()
        .find(|s| s.key.speaker == "mina")
        .unwrap();
    assert_eq!(own.distance, 0.0);
}

#[test]
fn passphrase_mode_grants_without_speaker() {
    let p = policy(lenient());
    let r = p.decide(&voice(2, 5), Mode::Passphrase).unwrap();
    assert!(r.accepted);
    assert_eq!(r.passphrase.as_deref(), Some("GiveMeAccess"));
    assert_eq!(r.speaker, None);
    assert!(r.speaker_scores().is_empty());
    for s in &r.scores {
        assert_eq!(s.key.speaker, "mariamM");
    }
}

#[test]
fn exact_baseline_utterance_passes_tight_gate() {
    let p = policy(PolicyConfig {
        sentence_threshold: 1.0,
        person_threshold: 1.0,
        ..PolicyConfig::default()
    });
    let e = p.store().enrollment().clone();
    let baseline = speaker_index(&e, "mariamM");

    let r = p.decide(&voice(0, baseline), Mode::PassphraseAndSpeaker).unwrap();
    assert!(r.accepted);
    assert_eq!(r.passphrase.as_deref(), Some("OpenTheDoor"));
    assert_eq!(r.speaker.as_deref(), Some("mariamM"));
}

#[test]
fn unfamiliar_voice_denied() {
    let p = policy(PolicyConfig {
        sentence_threshold: 1e12,
        person_threshold: 1.0,
        ..PolicyConfig::default()
    });
    // between two enrolled speakers: passes the phrase gate, fails the speaker gate
    let r = p
        .decide(&tone(PHRASE_HZ[1] + 50.0, 1.5), Mode::PassphraseAndSpeaker)
        .unwrap();
    assert!(!r.accepted);
    assert_eq!(r.passphrase.as_deref(), Some("UnlockMiddleGate"));
    assert_eq!(r.speaker, None);
    assert_eq!(r.speaker_scores().len(), 8);

    let p = policy(PolicyConfig {
        sentence_threshold: 1.0,
        ..PolicyConfig::default()
    });
    let r = p.decide(&tone(5000.0, 1.5), Mode::PassphraseAndSpeaker).unwrap();
    assert!(!r.accepted);
    assert_eq!(r.passphrase, None);
    assert_eq!(r.scores.len(), 3);
}

#[test]
fn wav_capture_round_trip() {
    let p = policy(lenient());
    let e = p.store().enrollment().clone();
    let ahmed = speaker_index(&e, "ahmed");

    let bytes = encode_wav(&voice(0, ahmed)).unwrap();
    let captured = decode_wav(Cursor::new(bytes)).unwrap();
    let r = p.decide(&captured, Mode::PassphraseAndSpeaker).unwrap();
    assert!(r.accepted);
    assert_eq!(r.passphrase.as_deref(), Some("OpenTheDoor"));
    assert_eq!(r.speaker.as_deref(), Some("ahmed"));
}

#[test]
fn decisions_are_reproducible() {
    let p = policy(PolicyConfig::default());
    let q = tone(950.0, 1.2);
    let a = p.decide(&q, Mode::PassphraseAndSpeaker).unwrap();
    let b = p.decide(&q, Mode::PassphraseAndSpeaker).unwrap();
    assert_eq!(a, b);
}

#[test]
fn empty_capture_is_an_error_not_a_denial() {
    let p = policy(lenient());
    let empty = AudioSignal::mono(Vec::new(), RATE).unwrap();
    assert!(matches!(
        p.decide(&empty, Mode::Passphrase),
        Err(VoiceprintError::Extraction(_))
    ));

    let short = tone(300.0, 0.01);
    assert!(matches!(
        p.decide(&short, Mode::PassphraseAndSpeaker),
        Err(VoiceprintError::Extraction(_))
    ));
}

#[test]
fn incomplete_corpus_rejected() {
    let enrollment = Enrollment::default();
    let full = source(&enrollment);
    let mut partial = MemorySource::new();
    for key in enrollment.keys() {
        if key.speaker != "nourhan" || key.passphrase != "GiveMeAccess" {
            let signal = voicegate_voiceprint::TemplateSource::fetch(&full, &key)
                .unwrap()
                .unwrap();
            partial.insert(key, signal);
        }
    }

    let extractor = MfccExtractor::new(MfccConfig::default()).unwrap();
    match TemplateStore::build(enrollment, &partial, &extractor) {
        Err(VoiceprintError::MissingTemplate { passphrase, speaker }) => {
            assert_eq!(passphrase, "GiveMeAccess");
            assert_eq!(speaker, "nourhan");
        }
        other => panic!("expected MissingTemplate, got {other:?}"),
    }
}
