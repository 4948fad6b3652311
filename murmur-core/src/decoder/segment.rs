//! Recognition results.

use serde::{Deserialize, Serialize};

/// How deep an alignment descends below the word level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AlignmentDepth {
    Words,
    Phones,
    States,
}

/// One aligned unit with timing in frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub text: String,
    pub start: u32,
    pub duration: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Segment>,
}

impl Segment {
    pub fn end(&self) -> u32 {
        self.start + self.duration
    }
}

/// A recognized word with times in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordSegment {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

impl WordSegment {
    pub(crate) fn from_frames(segment: &Segment, frame_rate: u32) -> Self {
        let rate = f64::from(frame_rate.max(1));
        Self {
            word: segment.text.clone(),
            start: f64::from(segment.start) / rate,
            end: f64::from(segment.end()) / rate,
        }
    }
}
