use thiserror::Error;

use crate::config::ParamKind;
use crate::decoder::{DecoderState, Stage};

/// All errors produced by murmur-core.
#[derive(Debug, Error)]
pub enum MurmurError {
    // ── Configuration store ──────────────────────────────────────────────
    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("parameter {name} has kind {expected}, got {found}")]
    TypeMismatch {
        name: String,
        expected: ParamKind,
        found: &'static str,
    },

    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: String, value: String },

    #[error("cannot resolve {0}: not set and no acoustic model directory (hmm) configured")]
    MissingModelPath(String),

    #[error("only one of jsgf, fsg can be enabled at a time in config")]
    ConflictingGrammars,

    // ── Initialization pipeline ──────────────────────────────────────────
    #[error("{stage} failed: {reason}")]
    Pipeline { stage: Stage, reason: String },

    #[error("failed to fetch {path}: {reason}")]
    Resource { path: String, reason: String },

    #[error("engine error: {0}")]
    Engine(String),

    // ── Utterance state machine ──────────────────────────────────────────
    #[error("decoder is not initialized")]
    NotInitialized,

    #[error("invalid decoder state: expected {expected}, currently {actual}")]
    InvalidState {
        expected: DecoderState,
        actual: DecoderState,
    },

    #[error("audio buffer of {len} bytes is not a multiple of the {width}-byte sample width")]
    UnalignedAudio { len: usize, width: usize },

    #[error("no utterance has been completed yet")]
    NoUtterance,

    // ── Grammar compilation ──────────────────────────────────────────────
    #[error("word not in dictionary: {0}")]
    UnresolvedWord(String),

    #[error("rule not found: {0}")]
    RuleNotFound(String),

    #[error("no public rules found in grammar")]
    NoPublicRule,

    #[error("grammar parse error at line {line}: {message}")]
    GrammarParse { line: usize, message: String },

    #[error("invalid grammar: {0}")]
    InvalidGrammar(String),

    #[error("rule <{0}> is recursive in a non-tail position")]
    RecursiveRule(String),

    // ── Endpointer ───────────────────────────────────────────────────────
    #[error("unsupported VAD sample rate: {0} Hz")]
    UnsupportedSampleRate(u32),

    #[error("unsupported VAD frame length: {0} s (must be 0.01, 0.02 or 0.03)")]
    UnsupportedFrameLength(f64),

    #[error("window of {window:.3} s with ratio {ratio:.2} makes endpointing impossible")]
    InvalidWindow { window: f64, ratio: f64 },

    #[error("frame must be {expected} samples, got {actual}")]
    FrameSize { expected: usize, actual: usize },

    #[error("resampler error: {0}")]
    Resample(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, MurmurError>;
