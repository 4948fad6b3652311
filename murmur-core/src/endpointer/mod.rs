//! Voice-activity endpointer.
//!
//! Frames are classified one at a time and queued in a sliding window of
//! `maxlen` frames. Speech starts when more than `start_frames` of the
//! window are speech and ends when fewer than `end_frames` are. While in
//! speech every call hands back the oldest queued frame, so the caller sees
//! a delayed but gap-free speech stream that begins at the window start.
//!
//! ## Timing
//!
//! `speech_start` and `speech_end` are measured in seconds of audio fed so
//! far. They track the time of the oldest queued frame, which advances
//! whenever a frame leaves the queue (popped or overwritten).

use ringbuf::traits::{Consumer, Observer, RingBuffer};
use ringbuf::HeapRb;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::audio::f32_slice_to_i16;
use crate::error::{MurmurError, Result};
use crate::vad::{EnergyClassifier, VadMode, VoiceActivityClassifier};

pub const DEFAULT_WINDOW: f64 = 0.3;
pub const DEFAULT_RATIO: f64 = 0.9;
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;
pub const DEFAULT_FRAME_LENGTH: f64 = 0.03;

const SAMPLE_RATES: [u32; 4] = [8_000, 16_000, 32_000, 48_000];
const FRAME_LENGTHS: [f64; 3] = [0.01, 0.02, 0.03];

/// The supported sample rate closest to `rate`; ties go to the lower rate.
pub fn nearest_sample_rate(rate: u32) -> u32 {
    SAMPLE_RATES
        .iter()
        .copied()
        .min_by_key(|r| r.abs_diff(rate))
        .unwrap_or(DEFAULT_SAMPLE_RATE)
}

/// Endpointer construction parameters. Zero in any field selects the
/// default for that field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndpointerConfig {
    /// Window length in seconds.
    pub window: f64,
    /// Fraction of the window that must be speech to start.
    pub ratio: f64,
    pub mode: VadMode,
    pub sample_rate: u32,
    /// Frame length in seconds: 0.01, 0.02 or 0.03.
    pub frame_length: f64,
}

impl Default for EndpointerConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            ratio: DEFAULT_RATIO,
            mode: VadMode::default(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            frame_length: DEFAULT_FRAME_LENGTH,
        }
    }
}

struct QueuedFrame {
    speech: bool,
    samples: Vec<i16>,
}

/// Frame-synchronous speech/non-speech segmenter.
pub struct Endpointer {
    classifier: Box<dyn VoiceActivityClassifier>,
    queue: HeapRb<QueuedFrame>,
    sample_rate: u32,
    frame_size: usize,
    frame_length: f64,
    start_frames: usize,
    end_frames: usize,
    in_speech: bool,
    qstart_time: f64,
    timestamp: f64,
    speech_start: f64,
    speech_end: f64,
}

impl std::fmt::Debug for Endpointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpointer")
            .field("sample_rate", &self.sample_rate)
            .field("frame_size", &self.frame_size)
            .field("in_speech", &self.in_speech)
            .finish_non_exhaustive()
    }
}

impl Endpointer {
    /// Build an endpointer with the energy classifier for `config.mode`.
    pub fn new(config: EndpointerConfig) -> Result<Self> {
        let frame_length = Self::resolve_frame_length(config.frame_length)?;
        let classifier = EnergyClassifier::for_mode(config.mode, frame_length);
        Self::with_classifier(config, Box::new(classifier))
    }

    fn resolve_frame_length(frame_length: f64) -> Result<f64> {
        if frame_length == 0.0 {
            return Ok(DEFAULT_FRAME_LENGTH);
        }
        FRAME_LENGTHS
            .iter()
            .copied()
            .find(|l| (l - frame_length).abs() < 1e-9)
            .ok_or(MurmurError::UnsupportedFrameLength(frame_length))
    }

    /// Build an endpointer around a caller-supplied classifier.
    ///
    /// # Errors
    /// `UnsupportedSampleRate`, `UnsupportedFrameLength`, or `InvalidWindow`
    /// when the window and ratio leave no room to start or end speech.
    pub fn with_classifier(
        config: EndpointerConfig,
        classifier: Box<dyn VoiceActivityClassifier>,
    ) -> Result<Self> {
        let sample_rate = match config.sample_rate {
            0 => DEFAULT_SAMPLE_RATE,
            r if SAMPLE_RATES.contains(&r) => r,
            r => return Err(MurmurError::UnsupportedSampleRate(r)),
        };
        let requested = Self::resolve_frame_length(config.frame_length)?;
        let frame_size = (f64::from(sample_rate) * requested).round() as usize;
        let frame_length = frame_size as f64 / f64::from(sample_rate);

        let window = if config.window == 0.0 { DEFAULT_WINDOW } else { config.window };
        let ratio = if config.ratio == 0.0 { DEFAULT_RATIO } else { config.ratio };

        let maxlen = (window / frame_length + 0.5).floor();
        let start_frames = (ratio * maxlen).floor();
        let end_frames = ((1.0 - ratio) * maxlen + 0.5).floor();
        let possible = |n: f64| n > 0.0 && n < maxlen;
        if !possible(start_frames) || !possible(end_frames) {
            return Err(MurmurError::InvalidWindow { window, ratio });
        }
        let maxlen = maxlen as usize;

        info!(
            threshold_pct = (ratio * 100.0).round() as u32,
            window = maxlen as f64 * frame_length,
            start_frames,
            end_frames,
            maxlen,
            "endpointer ready"
        );

        Ok(Self {
            classifier,
            queue: HeapRb::new(maxlen),
            sample_rate,
            frame_size,
            frame_length,
            start_frames: start_frames as usize,
            end_frames: end_frames as usize,
            in_speech: false,
            qstart_time: 0.0,
            timestamp: 0.0,
            speech_start: 0.0,
            speech_end: 0.0,
        })
    }

    /// Samples per frame.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Actual frame length in seconds.
    pub fn frame_length(&self) -> f64 {
        self.frame_length
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn in_speech(&self) -> bool {
        self.in_speech
    }

    /// Start of the current or last speech region, in seconds.
    pub fn speech_start(&self) -> f64 {
        self.speech_start
    }

    /// End of the last speech region, in seconds; 0 while a region is open.
    pub fn speech_end(&self) -> f64 {
        self.speech_end
    }

    /// Seconds of audio fed so far.
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    fn speech_count(&self) -> usize {
        self.queue.iter().filter(|f| f.speech).count()
    }

    fn push(&mut self, speech: bool, samples: Vec<i16>) {
        if self.queue.push_overwrite(QueuedFrame { speech, samples }).is_some() {
            self.qstart_time += self.frame_length;
        }
    }

    fn pop(&mut self) -> Option<QueuedFrame> {
        let frame = self.queue.try_pop()?;
        self.qstart_time += self.frame_length;
        Some(frame)
    }

    /// Classify and queue one frame of exactly `frame_size()` samples.
    ///
    /// Returns the oldest queued frame while in speech (including the call
    /// that leaves speech), `None` otherwise.
    pub fn process(&mut self, frame: &[i16]) -> Result<Option<Vec<i16>>> {
        if frame.len() != self.frame_size {
            return Err(MurmurError::FrameSize {
                expected: self.frame_size,
                actual: frame.len(),
            });
        }
        if self.in_speech && self.queue.is_full() {
            warn!("endpointer queue overflow, oldest frame dropped");
        }

        let speech = self.classifier.classify(frame).is_speech();
        self.push(speech, frame.to_vec());
        self.timestamp += self.frame_length;
        let count = self.speech_count();

        if self.in_speech {
            if count < self.end_frames {
                let popped = self.pop();
                self.speech_end = self.qstart_time;
                self.in_speech = false;
                debug!(start = self.speech_start, end = self.speech_end, "speech ended");
                return Ok(popped.map(|f| f.samples));
            }
        } else if count > self.start_frames {
            self.speech_start = self.qstart_time;
            self.speech_end = 0.0;
            self.in_speech = true;
            debug!(start = self.speech_start, "speech started");
        }

        if self.in_speech {
            Ok(self.pop().map(|f| f.samples))
        } else {
            Ok(None)
        }
    }

    /// [`Endpointer::process`] for f32 samples in [-1, 1].
    pub fn process_float32(&mut self, frame: &[f32]) -> Result<Option<Vec<i16>>> {
        self.process(&f32_slice_to_i16(frame))
    }

    /// Finish the stream with a final frame of at most `frame_size()`
    /// samples.
    ///
    /// If a speech region is open, closes it and returns the leading run of
    /// queued speech frames. When that run drains the whole queue the final
    /// frame is appended and the region ends at the end of the stream.
    /// Returns `None` if not in speech. The queue is empty afterwards.
    pub fn end_stream(&mut self, frame: &[i16]) -> Result<Option<Vec<i16>>> {
        if frame.len() > self.frame_size {
            return Err(MurmurError::FrameSize {
                expected: self.frame_size,
                actual: frame.len(),
            });
        }
        if !self.in_speech {
            return Ok(None);
        }
        self.in_speech = false;
        self.speech_end = self.qstart_time;

        let mut out = Vec::new();
        let mut all_speech = true;
        while let Some(queued) = self.pop() {
            if !queued.speech {
                all_speech = false;
                break;
            }
            out.extend_from_slice(&queued.samples);
            self.speech_end = self.qstart_time;
        }
        if all_speech {
            self.timestamp += frame.len() as f64 / f64::from(self.sample_rate);
            out.extend_from_slice(frame);
            self.speech_end = self.timestamp;
        }
        Consumer::clear(&mut self.queue);
        debug!(start = self.speech_start, end = self.speech_end, "stream ended in speech");
        Ok(Some(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vad::VadDecision;
    use approx::assert_relative_eq;

    /// Classifies a frame as speech iff its first sample is non-zero.
    struct Marker;

    impl VoiceActivityClassifier for Marker {
        fn classify(&mut self, frame: &[i16]) -> VadDecision {
            if frame[0] != 0 {
                VadDecision::Speech
            } else {
                VadDecision::Silence
            }
        }

        fn reset(&mut self) {}
    }

    fn marked() -> Endpointer {
        Endpointer::with_classifier(EndpointerConfig::default(), Box::new(Marker)).unwrap()
    }

    fn frame(speech: bool) -> Vec<i16> {
        vec![i16::from(speech); 480]
    }

    #[test]
    fn nearest_rate_snaps_to_supported_set() {
        assert_eq!(nearest_sample_rate(44_100), 48_000);
        assert_eq!(nearest_sample_rate(22_050), 16_000);
        assert_eq!(nearest_sample_rate(11_025), 8_000);
        assert_eq!(nearest_sample_rate(32_000), 32_000);
    }

    #[test]
    fn defaults_give_ten_frame_window() {
        let ep = marked();
        assert_eq!(ep.frame_size(), 480);
        assert_relative_eq!(ep.frame_length(), 0.03);
        assert_eq!(ep.queue.capacity().get(), 10);
        assert_eq!((ep.start_frames, ep.end_frames), (9, 1));
    }

    #[test]
    fn zero_fields_select_defaults() {
        let config = EndpointerConfig {
            window: 0.0,
            ratio: 0.0,
            mode: VadMode::Strict,
            sample_rate: 0,
            frame_length: 0.0,
        };
        let ep = Endpointer::new(config).unwrap();
        assert_eq!(ep.sample_rate(), 16_000);
        assert_eq!(ep.frame_size(), 480);
    }

    #[test]
    fn rejects_unsupported_parameters() {
        let bad_rate = EndpointerConfig {
            sample_rate: 44_100,
            ..Default::default()
        };
        assert!(matches!(
            Endpointer::new(bad_rate),
            Err(MurmurError::UnsupportedSampleRate(44_100))
        ));

        let bad_length = EndpointerConfig {
            frame_length: 0.025,
            ..Default::default()
        };
        assert!(matches!(
            Endpointer::new(bad_length),
            Err(MurmurError::UnsupportedFrameLength(_))
        ));

        let bad_ratio = EndpointerConfig {
            ratio: 0.99,
            ..Default::default()
        };
        assert!(matches!(
            Endpointer::new(bad_ratio),
            Err(MurmurError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn wrong_frame_size_is_rejected() {
        let mut ep = marked();
        assert!(matches!(
            ep.process(&[0; 100]),
            Err(MurmurError::FrameSize { expected: 480, actual: 100 })
        ));
        assert!(ep.end_stream(&[0; 481]).is_err());
    }

    #[test]
    fn region_starts_at_window_start_and_ends_after_silence() {
        let mut ep = marked();
        for _ in 0..20 {
            assert!(ep.process(&frame(false)).unwrap().is_none());
        }
        // Nine speech frames are not enough (need more than nine of ten).
        for _ in 0..9 {
            assert!(ep.process(&frame(true)).unwrap().is_none());
        }
        let first = ep.process(&frame(true)).unwrap();
        assert!(ep.in_speech());
        assert_eq!(first.unwrap()[0], 1);
        assert_relative_eq!(ep.speech_start(), 0.6, epsilon = 1e-9);

        for _ in 0..10 {
            assert!(ep.process(&frame(true)).unwrap().is_some());
        }
        // Stays in speech until the window has no speech left.
        let mut returned = 0;
        while ep.in_speech() {
            assert!(ep.process(&frame(false)).unwrap().is_some());
            returned += 1;
        }
        assert_eq!(returned, 10);
        assert!(ep.speech_end() > ep.speech_start());
        assert!(ep.process(&frame(false)).unwrap().is_none());
    }

    #[test]
    fn end_stream_outside_speech_returns_nothing() {
        let mut ep = marked();
        ep.process(&frame(false)).unwrap();
        assert!(ep.end_stream(&[0; 10]).unwrap().is_none());
    }

    #[test]
    fn end_stream_in_speech_appends_final_frame() {
        let mut ep = marked();
        for _ in 0..12 {
            ep.process(&frame(true)).unwrap();
        }
        assert!(ep.in_speech());
        let tail = ep.end_stream(&[7; 100]).unwrap().unwrap();
        // Nine queued speech frames plus the short final frame.
        assert_eq!(tail.len(), 9 * 480 + 100);
        assert_eq!(*tail.last().unwrap(), 7);
        assert!(!ep.in_speech());
        assert_relative_eq!(ep.speech_end(), ep.timestamp());
        assert_relative_eq!(ep.timestamp(), 12.0 * 0.03 + 100.0 / 16_000.0, epsilon = 1e-9);
    }
}
