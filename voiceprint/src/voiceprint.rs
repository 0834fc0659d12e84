use std::fmt;

use serde::{Deserialize, Serialize};

use crate::VoiceprintError;

/// Time-ordered spectral feature frames for one utterance.
///
/// Every frame has the same number of coefficients. The number of frames
/// grows with utterance duration and differs between takes of the same
/// passphrase, which is why sequences are compared with time warping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSequence {
    frames: Vec<Vec<f32>>,
}

impl FeatureSequence {
    /// Wraps `frames`, rejecting rows of differing width.
    pub fn new(frames: Vec<Vec<f32>>) -> Result<Self, VoiceprintError> {
        if let Some(first) = frames.first() {
            let dim = first.len();
            if let Some(i) = frames.iter().position(|f| f.len() != dim) {
                return Err(VoiceprintError::Extraction(format!(
                    "frame {i} has {} coefficients, expected {dim}",
                    frames[i].len()
                )));
            }
        }
        Ok(Self { frames })
    }

    pub fn frames(&self) -> &[Vec<f32>] {
        &self.frames
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Coefficients per frame, 0 for an empty sequence.
    pub fn dim(&self) -> usize {
        self.frames.first().map_or(0, Vec::len)
    }
}

/// Identifies one enrolled template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TemplateKey {
    pub passphrase: String,
    pub speaker: String,
}

impl TemplateKey {
    pub fn new(passphrase: impl Into<String>, speaker: impl Into<String>) -> Self {
        Self {
            passphrase: passphrase.into(),
            speaker: speaker.into(),
        }
    }
}

impl fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.passphrase, self.speaker)
    }
}

/// Distance between a query and one template. Lower is more similar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityScore {
    pub key: TemplateKey,
    pub distance: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ragged_frames_rejected() {
        let err = FeatureSequence::new(vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(err, VoiceprintError::Extraction(_)));
    }

    #[test]
    fn sequence_shape() {
        let seq = FeatureSequence::new(vec![vec![0.0; 3]; 4]).unwrap();
        assert_eq!(seq.len(), 4);
        assert_eq!(seq.dim(), 3);
        assert!(!seq.is_empty());

        let empty = FeatureSequence::new(Vec::new()).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.dim(), 0);
    }

    #[test]
    fn template_key_display() {
        assert_eq!(TemplateKey::new("OpenTheDoor", "ali").to_string(), "OpenTheDoor/ali");
    }
}
