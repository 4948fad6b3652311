//! # murmur-core
//!
//! Control plane for a GMM/HMM speech recognizer.
//!
//! ## Architecture
//!
//! ```text
//! Config ──► Decoder::initialize() ──► ordered pipeline ──► Engine
//!                                           │
//!                               ResourceLoader (fs / memory / http)
//!
//! JSGF / FSG text / transitions ──► grammar compiler ──► Fsg ──► Decoder
//!
//! PCM frames ──► Endpointer (VAD + sliding window) ──► speech regions
//! ```
//!
//! The acoustic engine is a trait object; [`StubEngine`] is a deterministic
//! implementation that exercises the whole lifecycle without model data.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod config;
pub mod decoder;
pub mod endpointer;
pub mod engine;
pub mod error;
pub mod grammar;
pub mod resource;
pub mod vad;

// Convenience re-exports for downstream crates
pub use config::{Config, ParamDef, ParamKind, ParamValue};
pub use decoder::{
    AlignmentDepth, Decoder, DecoderState, DiagnosticsSnapshot, Pcm, Segment, Stage, WordSegment,
};
pub use endpointer::{Endpointer, EndpointerConfig};
pub use engine::{Engine, StubEngine};
pub use error::{MurmurError, Result};
pub use grammar::{Fsg, Lexicon, LogMath, Transition};
pub use resource::{FsLoader, MemoryLoader, ResourceLoader};
pub use vad::{EnergyClassifier, VadDecision, VadMode, VoiceActivityClassifier};

#[cfg(feature = "http")]
pub use resource::HttpLoader;
