//! Energy-based classifier using an RMS threshold + hangover counter.
//!
//! ## Algorithm
//!
//! 1. Compute RMS of the frame (normalized to [0, 1]).
//! 2. If RMS ≥ `threshold` → `Speech`, reload the hangover counter.
//! 3. If RMS < `threshold` and hangover counter > 0 → `Speech`,
//!    decrement counter (keeps syllable endings).
//! 4. Otherwise → `Silence`.

use super::{VadDecision, VadMode, VoiceActivityClassifier};

/// A simple energy-based voice activity classifier.
#[derive(Debug, Clone)]
pub struct EnergyClassifier {
    threshold: f32,
    hangover_frames: u32,
    hangover_counter: u32,
}

impl EnergyClassifier {
    /// - `threshold`: RMS level (full scale = 1.0) above which a frame is
    ///   speech.
    /// - `hangover_frames`: silent frames still reported as speech after
    ///   real speech ends.
    pub fn new(threshold: f32, hangover_frames: u32) -> Self {
        Self {
            threshold,
            hangover_frames,
            hangover_counter: 0,
        }
    }

    /// Threshold and hangover for `mode` at the given frame length.
    pub fn for_mode(mode: VadMode, frame_length: f64) -> Self {
        let (threshold, hangover_secs) = match mode {
            VadMode::Loose => (0.010, 0.12),
            VadMode::MediumLoose => (0.018, 0.09),
            VadMode::MediumStrict => (0.030, 0.06),
            VadMode::Strict => (0.050, 0.03),
        };
        let hangover = if frame_length > 0.0 {
            (hangover_secs / frame_length).round() as u32
        } else {
            0
        };
        Self::new(threshold, hangover)
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    fn rms(frame: &[i16]) -> f32 {
        if frame.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = frame
            .iter()
            .map(|&s| {
                let x = f64::from(s) / 32768.0;
                x * x
            })
            .sum();
        (sum_sq / frame.len() as f64).sqrt() as f32
    }
}

impl Default for EnergyClassifier {
    fn default() -> Self {
        Self::for_mode(VadMode::default(), 0.03)
    }
}

impl VoiceActivityClassifier for EnergyClassifier {
    fn classify(&mut self, frame: &[i16]) -> VadDecision {
        if Self::rms(frame) >= self.threshold {
            self.hangover_counter = self.hangover_frames;
            VadDecision::Speech
        } else if self.hangover_counter > 0 {
            self.hangover_counter -= 1;
            VadDecision::Speech
        } else {
            VadDecision::Silence
        }
    }

    fn reset(&mut self) {
        self.hangover_counter = 0;
    }
}
