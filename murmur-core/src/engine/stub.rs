//! `StubEngine`: deterministic placeholder backend without acoustic scoring.
//!
//! It enforces the model-loading order, parses a real text dictionary and
//! "recognizes" the best path through the active grammar, spreading the
//! words evenly over the frames it was fed. That is enough to exercise the
//! whole decoder lifecycle end-to-end.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::config::{default_schema, Config, ParamDef};
use crate::decoder::{AlignmentDepth, Segment, Stage};
use crate::engine::{Engine, MixtureWeights};
use crate::error::{MurmurError, Result};
use crate::grammar::{Fsg, Lexicon};

/// HMM states per phone in stub alignments.
const STATES_PER_PHONE: u32 = 3;

/// Shared record of completed engine stages, in call order.
pub type Journal = Arc<Mutex<Vec<Stage>>>;

#[derive(Debug, Default, Clone, Copy)]
struct Loaded {
    frontend: bool,
    feature: bool,
    acmod_pre: bool,
    mdef: bool,
    tmat: bool,
    gmm: bool,
    acmod: bool,
    dict: bool,
}

#[derive(Debug, Clone)]
struct Utterance {
    hypothesis: String,
    words: Vec<Segment>,
}

pub struct StubEngine {
    journal: Journal,
    loaded: Loaded,
    sample_rate: f64,
    frame_rate: u32,
    transform: bool,
    weights: Option<&'static str>,
    prons: BTreeMap<String, Vec<Vec<String>>>,
    fillers: BTreeSet<String>,
    grammar: Option<Vec<String>>,
    in_utterance: bool,
    samples: usize,
    frames: usize,
    last: Option<Utterance>,
}

impl StubEngine {
    pub fn new() -> Self {
        Self {
            journal: Journal::default(),
            loaded: Loaded::default(),
            sample_rate: 16_000.0,
            frame_rate: 100,
            transform: false,
            weights: None,
            prons: BTreeMap::new(),
            fillers: BTreeSet::new(),
            grammar: None,
            in_utterance: false,
            samples: 0,
            frames: 0,
            last: None,
        }
    }

    /// Handle onto the stage journal; stays valid after the engine is boxed.
    pub fn journal(&self) -> Journal {
        Arc::clone(&self.journal)
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Whether the feature module was built with a transform.
    pub fn has_transform(&self) -> bool {
        self.transform
    }

    /// `"sendump"` or `"mixw"`, whichever encoding was loaded.
    pub fn mixture_weights(&self) -> Option<&'static str> {
        self.weights
    }

    pub fn is_filler(&self, word: &str) -> bool {
        self.fillers.contains(word)
    }

    fn record(&self, stage: Stage) {
        self.journal.lock().push(stage);
    }

    fn require(ready: bool, what: &str, needs: &str) -> Result<()> {
        if ready {
            Ok(())
        } else {
            Err(MurmurError::Engine(format!("{what} requires {needs}")))
        }
    }

    fn non_empty(bytes: &[u8], what: &str) -> Result<()> {
        if bytes.is_empty() {
            return Err(MurmurError::Engine(format!("{what} is empty")));
        }
        Ok(())
    }

    fn parse_dict(&mut self, bytes: &[u8], what: &str, filler: bool) -> Result<usize> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| MurmurError::Engine(format!("{what} is not UTF-8: {e}")))?;
        let mut count = 0;
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(";;") {
                continue;
            }
            let mut fields = line.split_whitespace();
            let Some(entry) = fields.next() else { continue };
            let phones: Vec<String> = fields.map(str::to_string).collect();
            if phones.is_empty() {
                return Err(MurmurError::Engine(format!(
                    "{what} line {}: no pronunciation for {entry}",
                    lineno + 1
                )));
            }
            // `word(2)` is an alternate pronunciation of `word`.
            let word = match entry.find('(') {
                Some(idx) if entry.ends_with(')') => &entry[..idx],
                _ => entry,
            };
            self.prons.entry(word.to_string()).or_default().push(phones);
            if filler {
                self.fillers.insert(word.to_string());
            }
            count += 1;
        }
        Ok(count)
    }

    /// Split `duration` frames starting at `start` into `n` contiguous parts.
    fn split(start: u32, duration: u32, n: u32) -> impl Iterator<Item = (u32, u32)> {
        let (start, duration, n) = (u64::from(start), u64::from(duration), u64::from(n));
        (0..n).map(move |i| {
            let a = start + duration * i / n;
            let b = start + duration * (i + 1) / n;
            (a as u32, (b - a) as u32)
        })
    }

    fn align(&self, words: &[String], frames: u32) -> Vec<Segment> {
        let n = words.len() as u32;
        words
            .iter()
            .zip(Self::split(0, frames, n))
            .map(|(word, (start, duration))| {
                let phones = self
                    .prons
                    .get(word)
                    .and_then(|p| p.first())
                    .cloned()
                    .unwrap_or_default();
                let children = phones
                    .iter()
                    .zip(Self::split(start, duration, phones.len() as u32))
                    .map(|(phone, (start, duration))| Segment {
                        text: phone.clone(),
                        start,
                        duration,
                        children: Self::split(start, duration, STATES_PER_PHONE)
                            .enumerate()
                            .map(|(k, (start, duration))| Segment {
                                text: format!("{phone}[{k}]"),
                                start,
                                duration,
                                children: Vec::new(),
                            })
                            .collect(),
                    })
                    .collect();
                Segment {
                    text: word.clone(),
                    start,
                    duration,
                    children,
                }
            })
            .collect()
    }
}

impl Default for StubEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Lexicon for StubEngine {
    fn contains_word(&self, word: &str) -> bool {
        self.prons.contains_key(word)
    }
}

fn truncate(segments: &[Segment], levels: usize) -> Vec<Segment> {
    segments
        .iter()
        .map(|s| Segment {
            children: if levels == 0 {
                Vec::new()
            } else {
                truncate(&s.children, levels - 1)
            },
            ..s.clone()
        })
        .collect()
}

impl Engine for StubEngine {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn schema(&self) -> Vec<ParamDef> {
        default_schema()
    }

    fn cleanup(&mut self) {
        self.grammar = None;
        self.in_utterance = false;
        self.record(Stage::Cleanup);
    }

    fn init_frontend(&mut self, config: &Config) -> Result<()> {
        let sample_rate = config.get_float("samprate")?;
        let frame_rate = config.get_int("frate")?;
        if sample_rate.is_nan() || sample_rate <= 0.0 || frame_rate <= 0 {
            return Err(MurmurError::Engine(format!(
                "bad frontend parameters: samprate {sample_rate}, frate {frame_rate}"
            )));
        }
        self.sample_rate = sample_rate;
        self.frame_rate = frame_rate as u32;
        self.loaded.frontend = true;
        self.loaded.feature = false;
        debug!(sample_rate, frame_rate, "StubEngine frontend ready");
        self.record(Stage::Frontend);
        Ok(())
    }

    fn init_feature(&mut self, _config: &Config, transform: Option<&[u8]>) -> Result<()> {
        Self::require(self.loaded.frontend, "feature module", "a frontend")?;
        if let Some(bytes) = transform {
            Self::non_empty(bytes, "feature transform")?;
        }
        self.transform = transform.is_some();
        self.loaded.feature = true;
        self.record(Stage::Feature);
        Ok(())
    }

    fn acmod_pre_init(&mut self, _config: &Config) -> Result<()> {
        Self::require(self.loaded.feature, "acoustic model", "a feature module")?;
        // A new acoustic model invalidates everything loaded into the old one.
        self.loaded = Loaded {
            frontend: self.loaded.frontend,
            feature: self.loaded.feature,
            acmod_pre: true,
            ..Loaded::default()
        };
        self.record(Stage::AcousticModelPre);
        Ok(())
    }

    fn load_mdef(&mut self, bytes: &[u8]) -> Result<()> {
        Self::require(self.loaded.acmod_pre, "mdef", "acoustic model pre-initialization")?;
        Self::non_empty(bytes, "mdef")?;
        self.loaded.mdef = true;
        self.record(Stage::Mdef);
        Ok(())
    }

    fn load_tmat(&mut self, bytes: &[u8]) -> Result<()> {
        Self::require(self.loaded.mdef, "tmat", "an mdef")?;
        Self::non_empty(bytes, "tmat")?;
        self.loaded.tmat = true;
        self.record(Stage::Tmat);
        Ok(())
    }

    fn load_gmm(&mut self, means: &[u8], variances: &[u8], weights: MixtureWeights<'_>) -> Result<()> {
        Self::require(self.loaded.tmat, "gaussians", "a tmat")?;
        Self::non_empty(means, "means")?;
        Self::non_empty(variances, "variances")?;
        Self::non_empty(weights.bytes(), "mixture weights")?;
        self.weights = Some(match weights {
            MixtureWeights::Sendump(_) => "sendump",
            MixtureWeights::Mixw(_) => "mixw",
        });
        self.loaded.gmm = true;
        self.record(Stage::Gmm);
        Ok(())
    }

    fn acmod_post_init(&mut self) -> Result<()> {
        Self::require(self.loaded.gmm, "acoustic model post-initialization", "gaussians")?;
        self.loaded.acmod = true;
        self.record(Stage::AcousticModelPost);
        Ok(())
    }

    fn load_dict(&mut self, dict: &[u8], filler: Option<&[u8]>) -> Result<()> {
        Self::require(self.loaded.acmod, "dictionary", "an acoustic model")?;
        Self::non_empty(dict, "dictionary")?;
        self.prons.clear();
        self.fillers.clear();
        let words = self.parse_dict(dict, "dictionary", false)?;
        let fillers = match filler {
            Some(bytes) => self.parse_dict(bytes, "filler dictionary", true)?,
            None => 0,
        };
        debug!(words, fillers, "StubEngine dictionary loaded");
        self.loaded.dict = true;
        self.record(Stage::Dictionary);
        Ok(())
    }

    fn rewire_feature(&mut self) -> Result<()> {
        Self::require(self.loaded.acmod, "rewiring", "an acoustic model")?;
        Self::require(self.loaded.feature, "rewiring", "a feature module")?;
        self.record(Stage::Rewire);
        Ok(())
    }

    fn set_grammar(&mut self, fsg: &Fsg) -> Result<()> {
        Self::require(self.loaded.dict, "grammar", "a dictionary")?;
        if let Some(missing) = fsg.vocab().iter().find(|w| !self.contains_word(w)) {
            return Err(MurmurError::UnresolvedWord(missing.clone()));
        }
        let path = fsg.best_path().ok_or_else(|| {
            MurmurError::Engine(format!("final state of {} is unreachable", fsg.name()))
        })?;
        self.grammar = Some(path.into_iter().map(|w| fsg.word(w).to_string()).collect());
        self.record(Stage::Grammar);
        Ok(())
    }

    fn begin_utterance(&mut self) -> Result<()> {
        Self::require(self.grammar.is_some(), "utterance", "an active grammar")?;
        self.in_utterance = true;
        self.samples = 0;
        self.frames = 0;
        Ok(())
    }

    fn process(&mut self, samples: &[i16]) -> Result<usize> {
        Self::require(self.in_utterance, "processing", "an open utterance")?;
        self.samples += samples.len();
        let total = (self.samples as f64 * f64::from(self.frame_rate) / self.sample_rate) as usize;
        let new = total - self.frames;
        self.frames = total;
        Ok(new)
    }

    fn end_utterance(&mut self) -> Result<()> {
        Self::require(self.in_utterance, "ending", "an open utterance")?;
        self.in_utterance = false;
        let words = self.grammar.clone().unwrap_or_default();
        self.last = Some(Utterance {
            hypothesis: words.join(" "),
            words: self.align(&words, self.frames as u32),
        });
        Ok(())
    }

    fn hypothesis(&self) -> Option<String> {
        self.last.as_ref().map(|u| u.hypothesis.clone())
    }

    fn alignment(&self, depth: AlignmentDepth) -> Option<Vec<Segment>> {
        let levels = match depth {
            AlignmentDepth::Words => 0,
            AlignmentDepth::Phones => 1,
            AlignmentDepth::States => 2,
        };
        self.last.as_ref().map(|u| truncate(&u.words, levels))
    }

    fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    fn lookup_word(&self, word: &str) -> Option<String> {
        self.prons.get(word).and_then(|p| p.first()).map(|p| p.join(" "))
    }

    fn add_word(&mut self, word: &str, phones: &str) -> Result<()> {
        Self::require(self.loaded.dict, "adding words", "a dictionary")?;
        let phones: Vec<String> = phones.split_whitespace().map(str::to_string).collect();
        if word.trim().is_empty() || phones.is_empty() {
            return Err(MurmurError::Engine(format!("cannot add {word:?} without phones")));
        }
        self.prons.entry(word.to_string()).or_default().push(phones);
        Ok(())
    }
}
