//! `Decoder`: session lifecycle controller.
//!
//! ## Lifecycle
//!
//! ```text
//! Decoder::new()                      state = NotInitialized
//!     └─► initialize().await          pipeline ran, state = Ready
//!         └─► start()                 state = InUtterance
//!             └─► process(pcm) ...
//!             └─► stop()              hypothesis final, state = Ready
//! ```
//!
//! `initialize()` may be called again from `Ready`, optionally with a
//! replacement [`Config`]; the old grammar and store are dropped. Calling an
//! operation in the wrong state returns `NotInitialized` or `InvalidState`
//! rather than panicking.

pub mod diagnostics;
mod pipeline;
pub mod segment;

pub use diagnostics::{DecoderDiagnostics, DiagnosticsSnapshot};
pub use pipeline::Stage;
pub use segment::{AlignmentDepth, Segment, WordSegment};

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, info_span, Instrument};

use crate::audio::{bytes_to_i16, f32_slice_to_i16, SampleFormat};
use crate::config::Config;
use crate::engine::Engine;
use crate::error::{MurmurError, Result};
use crate::grammar::{fsg_text, jsgf, Fsg, LogMath, Transition};
use crate::resource::ResourceLoader;

/// Where a [`Decoder`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    NotInitialized,
    Ready,
    InUtterance,
}

impl fmt::Display for DecoderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DecoderState::NotInitialized => "not initialized",
            DecoderState::Ready => "ready",
            DecoderState::InUtterance => "in utterance",
        })
    }
}

/// Audio accepted by [`Decoder::process`].
#[derive(Debug, Clone, Copy)]
pub enum Pcm<'a> {
    Int16(&'a [i16]),
    /// Samples in [-1, 1].
    Float32(&'a [f32]),
    /// Little-endian raw bytes; the length must be a whole number of
    /// samples.
    Bytes(&'a [u8], SampleFormat),
}

/// A recognition session: one configuration, one engine, at most one active
/// grammar.
pub struct Decoder {
    config: Config,
    engine: Box<dyn Engine>,
    loader: Arc<dyn ResourceLoader>,
    lmath: Option<LogMath>,
    grammar: Option<Fsg>,
    state: DecoderState,
    has_utterance: bool,
    diagnostics: Arc<DecoderDiagnostics>,
}

impl fmt::Debug for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoder")
            .field("state", &self.state)
            .field("grammar", &self.grammar.as_ref().map(Fsg::name))
            .finish_non_exhaustive()
    }
}

impl Decoder {
    /// Create a session whose configuration uses the engine's schema with
    /// default values.
    pub fn new<E, L>(engine: E, loader: L) -> Self
    where
        E: Engine,
        L: ResourceLoader + 'static,
    {
        let config = Config::new(engine.schema());
        Self::with_config(engine, loader, config)
    }

    pub fn with_config<E, L>(engine: E, loader: L, config: Config) -> Self
    where
        E: Engine,
        L: ResourceLoader + 'static,
    {
        Self {
            config,
            engine: Box::new(engine),
            loader: Arc::new(loader),
            lmath: None,
            grammar: None,
            state: DecoderState::NotInitialized,
            has_utterance: false,
            diagnostics: Arc::new(DecoderDiagnostics::default()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Mutable access to the store. Changes take effect at the next
    /// `initialize()` (or `reinitialize_audio()` for frontend parameters).
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state != DecoderState::NotInitialized
    }

    /// The active grammar, if any.
    pub fn grammar(&self) -> Option<&Fsg> {
        self.grammar.as_ref()
    }

    pub fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    /// Log domain of the current initialization.
    pub fn log_math(&self) -> Option<&LogMath> {
        self.lmath.as_ref()
    }

    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    /// Shared handle to the live counters.
    pub fn diagnostics_handle(&self) -> Arc<DecoderDiagnostics> {
        Arc::clone(&self.diagnostics)
    }

    fn require(&self, expected: DecoderState) -> Result<()> {
        match self.state {
            s if s == expected => Ok(()),
            DecoderState::NotInitialized => Err(MurmurError::NotInitialized),
            actual => Err(MurmurError::InvalidState { expected, actual }),
        }
    }

    fn require_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(MurmurError::NotInitialized)
        }
    }

    // ── Initialization ───────────────────────────────────────────────────

    /// Run the full initialization pipeline with the current store.
    ///
    /// On error the session is left `NotInitialized` and the first fatal
    /// error is returned.
    ///
    /// # Errors
    /// `InvalidState` while an utterance is open, otherwise whatever the
    /// first failing stage reports.
    pub async fn initialize(&mut self) -> Result<()> {
        if self.state == DecoderState::InUtterance {
            return Err(MurmurError::InvalidState {
                expected: DecoderState::Ready,
                actual: self.state,
            });
        }
        self.state = DecoderState::NotInitialized;
        self.has_utterance = false;
        self.lmath = None;

        self.run_pipeline().instrument(info_span!("initialize")).await?;

        self.state = DecoderState::Ready;
        info!(
            grammar = self.grammar.as_ref().map(Fsg::name),
            "decoder initialized"
        );
        Ok(())
    }

    /// Replace the store, dropping the old one, then [`Decoder::initialize`].
    pub async fn initialize_with(&mut self, config: Config) -> Result<()> {
        if self.state == DecoderState::InUtterance {
            return Err(MurmurError::InvalidState {
                expected: DecoderState::Ready,
                actual: self.state,
            });
        }
        self.config = config;
        self.initialize().await
    }

    /// Rebuild the frontend and feature module from the current store and
    /// attach them to the loaded acoustic model. Valid only when `Ready`.
    ///
    /// A failure leaves the session `NotInitialized`: the old frontend is
    /// already gone by then.
    pub async fn reinitialize_audio(&mut self) -> Result<()> {
        self.require(DecoderState::Ready)?;
        self.state = DecoderState::NotInitialized;
        self.run_audio_stages()
            .instrument(info_span!("reinitialize_audio"))
            .await?;
        self.engine
            .rewire_feature()
            .map_err(|e| Stage::Rewire.failed(e))?;
        self.state = DecoderState::Ready;
        DecoderDiagnostics::bump(&self.diagnostics.stages_completed, 1);
        info!("audio frontend reinitialized");
        Ok(())
    }

    // ── Utterances ───────────────────────────────────────────────────────

    pub fn start(&mut self) -> Result<()> {
        self.require(DecoderState::Ready)?;
        self.engine.begin_utterance()?;
        self.state = DecoderState::InUtterance;
        debug!("utterance started");
        Ok(())
    }

    /// Feed audio; returns the number of frames consumed.
    ///
    /// # Errors
    /// `UnalignedAudio` for byte buffers that are not a whole number of
    /// samples; nothing is fed in that case.
    pub fn process(&mut self, pcm: Pcm<'_>) -> Result<usize> {
        self.require(DecoderState::InUtterance)?;
        let frames = match pcm {
            Pcm::Int16(samples) => self.engine.process(samples)?,
            Pcm::Float32(samples) => self.engine.process(&f32_slice_to_i16(samples))?,
            Pcm::Bytes(bytes, format) => self.engine.process(&bytes_to_i16(bytes, format)?)?,
        };
        DecoderDiagnostics::bump(&self.diagnostics.frames, frames);
        Ok(frames)
    }

    pub fn stop(&mut self) -> Result<()> {
        self.require(DecoderState::InUtterance)?;
        let ended = self.engine.end_utterance();
        self.state = DecoderState::Ready;
        ended?;
        self.has_utterance = true;
        DecoderDiagnostics::bump(&self.diagnostics.utterances, 1);
        debug!("utterance finished");
        Ok(())
    }

    fn require_utterance(&self) -> Result<()> {
        self.require_initialized()?;
        if self.has_utterance {
            Ok(())
        } else {
            Err(MurmurError::NoUtterance)
        }
    }

    /// Text of the last completed utterance.
    pub fn hypothesis(&self) -> Result<String> {
        self.require_utterance()?;
        self.engine.hypothesis().ok_or(MurmurError::NoUtterance)
    }

    /// Word timings of the last completed utterance, in seconds.
    pub fn segments(&self) -> Result<Vec<WordSegment>> {
        let frame_rate = self.engine.frame_rate();
        Ok(self
            .alignment(AlignmentDepth::Words)?
            .iter()
            .map(|s| WordSegment::from_frames(s, frame_rate))
            .collect())
    }

    /// Alignment of the last completed utterance, in frames.
    pub fn alignment(&self, depth: AlignmentDepth) -> Result<Vec<Segment>> {
        self.require_utterance()?;
        self.engine.alignment(depth).ok_or(MurmurError::NoUtterance)
    }

    // ── Dictionary ───────────────────────────────────────────────────────

    pub fn lookup_word(&self, word: &str) -> Result<Option<String>> {
        self.require_initialized()?;
        Ok(self.engine.lookup_word(word))
    }

    /// Add a word (or an alternate pronunciation) to the dictionary.
    pub fn add_word(&mut self, word: &str, phones: &str) -> Result<()> {
        self.require_initialized()?;
        self.engine.add_word(word, phones)?;
        debug!(word, phones, "word added");
        Ok(())
    }

    // ── Grammars ─────────────────────────────────────────────────────────

    fn lmath_and_lw(&self) -> Result<(LogMath, f32)> {
        let lmath = self.lmath.ok_or(MurmurError::NotInitialized)?;
        Ok((lmath, self.config.get_float("lw")? as f32))
    }

    /// Compile a transition list against the engine dictionary.
    pub fn compile_fsg(
        &self,
        name: &str,
        start: i64,
        final_state: i64,
        transitions: &[Transition],
    ) -> Result<Fsg> {
        let (lmath, lw) = self.lmath_and_lw()?;
        Fsg::from_transitions(name, start, final_state, transitions, &*self.engine, &lmath, lw)
    }

    /// Activate `fsg`, dropping the previous grammar once the engine has
    /// accepted it.
    pub fn set_fsg(&mut self, fsg: Fsg) -> Result<()> {
        self.require(DecoderState::Ready)?;
        self.engine.set_grammar(&fsg)?;
        info!(name = fsg.name(), states = fsg.n_state(), "grammar activated");
        self.grammar = Some(fsg);
        Ok(())
    }

    /// Compile and activate a transition list. Errors leave the previous
    /// grammar active.
    pub fn set_grammar(
        &mut self,
        name: &str,
        start: i64,
        final_state: i64,
        transitions: &[Transition],
    ) -> Result<()> {
        self.require(DecoderState::Ready)?;
        let fsg = self.compile_fsg(name, start, final_state, transitions)?;
        self.set_fsg(fsg)
    }

    /// Compile and activate a JSGF grammar. `rule` selects the rule by local
    /// or qualified name; `None` uses the first public rule.
    pub fn set_jsgf(&mut self, text: &str, rule: Option<&str>) -> Result<()> {
        self.require(DecoderState::Ready)?;
        let fsg = self.compile_jsgf(text, rule)?;
        self.set_fsg(fsg)
    }

    fn compile_jsgf(&self, text: &str, rule: Option<&str>) -> Result<Fsg> {
        let (lmath, lw) = self.lmath_and_lw()?;
        let grammar = jsgf::Grammar::parse(text)?;
        grammar.build_fsg(rule, &*self.engine, &lmath, lw)
    }

    /// Compile and activate a grammar in Sphinx FSG text format.
    pub fn set_fsg_text(&mut self, text: &str) -> Result<()> {
        self.require(DecoderState::Ready)?;
        let fsg = self.compile_fsg_text(text)?;
        self.set_fsg(fsg)
    }

    fn compile_fsg_text(&self, text: &str) -> Result<Fsg> {
        let (lmath, lw) = self.lmath_and_lw()?;
        fsg_text::parse(text, &*self.engine, &lmath, lw)
    }
}
