//! Voice activity classification.
//!
//! The `VoiceActivityClassifier` trait is the endpointer's extensibility
//! point: it decides speech/non-speech for one frame and nothing else.
//! Region tracking lives in [`crate::endpointer`].

pub mod energy;

pub use energy::EnergyClassifier;

use serde::{Deserialize, Serialize};

/// Whether a given audio frame contains speech or silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadDecision {
    Speech,
    Silence,
}

impl VadDecision {
    pub fn is_speech(self) -> bool {
        self == VadDecision::Speech
    }
}

/// Classifier aggressiveness. Stricter modes need more evidence before
/// calling a frame speech.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VadMode {
    #[default]
    Loose,
    MediumLoose,
    MediumStrict,
    Strict,
}

impl std::str::FromStr for VadMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "0" | "loose" => Ok(VadMode::Loose),
            "1" | "medium-loose" | "mediumloose" => Ok(VadMode::MediumLoose),
            "2" | "medium-strict" | "mediumstrict" => Ok(VadMode::MediumStrict),
            "3" | "strict" => Ok(VadMode::Strict),
            other => Err(format!("unknown VAD mode {other:?}")),
        }
    }
}

/// Per-frame speech classifier.
///
/// Implementors may be stateful (hangover counters and the like).
pub trait VoiceActivityClassifier: Send + 'static {
    /// Classify one frame of 16-bit PCM. The frame length and sample rate
    /// are fixed when the classifier is built.
    fn classify(&mut self, frame: &[i16]) -> VadDecision;

    /// Reset any internal state.
    fn reset(&mut self);
}
