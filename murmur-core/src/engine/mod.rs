//! Recognition engine abstraction.
//!
//! The `Engine` trait is the narrow call surface the decoder drives: model
//! loading in a fixed order, grammar activation, and the utterance calls.
//! Acoustic scoring lives entirely behind it.
//!
//! `&mut self` everywhere expresses that an engine is a single-session,
//! single-caller state machine; the decoder owns it exclusively.

pub mod stub;

use std::any::Any;

pub use stub::StubEngine;

use crate::config::{Config, ParamDef};
use crate::decoder::{AlignmentDepth, Segment};
use crate::error::Result;
use crate::grammar::{Fsg, Lexicon};

/// Gaussian mixture weights in one of their two interchangeable encodings.
#[derive(Debug, Clone, Copy)]
pub enum MixtureWeights<'a> {
    /// Compressed senone dump.
    Sendump(&'a [u8]),
    /// Uncompressed mixture weights.
    Mixw(&'a [u8]),
}

impl MixtureWeights<'_> {
    pub fn bytes(&self) -> &[u8] {
        match self {
            MixtureWeights::Sendump(b) | MixtureWeights::Mixw(b) => b,
        }
    }
}

/// Contract for recognition backends.
///
/// The [`Lexicon`] supertrait exposes the pronunciation dictionary so
/// grammars can be checked against it before activation.
pub trait Engine: Lexicon + Send + 'static {
    /// Parameter definitions this engine understands. Fixed for the
    /// engine's lifetime.
    fn schema(&self) -> Vec<ParamDef>;

    /// The concrete engine, for backend-specific inspection through
    /// [`Decoder::engine`](crate::Decoder::engine).
    fn as_any(&self) -> &dyn Any;

    /// Release search and grammar modules. Idempotent.
    fn cleanup(&mut self);

    fn init_frontend(&mut self, config: &Config) -> Result<()>;

    /// Build the dynamic feature module, with an optional feature transform.
    fn init_feature(&mut self, config: &Config, transform: Option<&[u8]>) -> Result<()>;

    fn acmod_pre_init(&mut self, config: &Config) -> Result<()>;
    fn load_mdef(&mut self, bytes: &[u8]) -> Result<()>;
    fn load_tmat(&mut self, bytes: &[u8]) -> Result<()>;
    fn load_gmm(&mut self, means: &[u8], variances: &[u8], weights: MixtureWeights<'_>) -> Result<()>;
    fn acmod_post_init(&mut self) -> Result<()>;

    /// Load the main dictionary and, if present, the filler dictionary.
    fn load_dict(&mut self, dict: &[u8], filler: Option<&[u8]>) -> Result<()>;

    /// Attach a freshly built frontend and feature module to the existing
    /// acoustic model.
    fn rewire_feature(&mut self) -> Result<()>;

    /// Activate `fsg` as the search grammar. On error the previous grammar
    /// stays active.
    fn set_grammar(&mut self, fsg: &Fsg) -> Result<()>;

    fn begin_utterance(&mut self) -> Result<()>;

    /// Feed samples; returns the number of frames consumed.
    fn process(&mut self, samples: &[i16]) -> Result<usize>;

    fn end_utterance(&mut self) -> Result<()>;

    /// Best hypothesis of the last utterance, if one has finished.
    fn hypothesis(&self) -> Option<String>;

    /// Alignment of the last hypothesis down to `depth`.
    fn alignment(&self, depth: AlignmentDepth) -> Option<Vec<Segment>>;

    /// Frames per second.
    fn frame_rate(&self) -> u32;

    /// Pronunciation of `word` as space-separated phones.
    fn lookup_word(&self, word: &str) -> Option<String>;

    /// Add `word` with pronunciation `phones`. An existing word gains an
    /// alternate pronunciation.
    fn add_word(&mut self, word: &str, phones: &str) -> Result<()>;
}
