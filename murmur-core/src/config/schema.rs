//! Parameter definitions.
//!
//! An engine reports its schema once, at handle creation, as a list of
//! [`ParamDef`]s. [`default_schema`] is the table used by [`StubEngine`]
//! and by `Config::default()`; it mirrors the parameter set of a
//! semi-continuous GMM/HMM recognizer.
//!
//! [`StubEngine`]: crate::engine::stub::StubEngine

use std::fmt;

use serde::{Deserialize, Serialize};

/// Value kind of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Integer,
    Float,
    Boolean,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
            ParamKind::Float => "float",
            ParamKind::Boolean => "boolean",
        })
    }
}

/// One schema entry.
///
/// `default` is the textual default as the engine reports it; `None` means
/// "unset" and is only meaningful for string parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    pub kind: ParamKind,
    pub default: Option<String>,
    pub doc: String,
}

impl ParamDef {
    pub fn new(name: &str, kind: ParamKind, default: Option<&str>, doc: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            default: default.map(str::to_string),
            doc: doc.to_string(),
        }
    }
}

use ParamKind::{Boolean as B, Float as F, Integer as I, String as S};

#[rustfmt::skip]
const DEFAULTS: &[(&str, ParamKind, Option<&str>, &str)] = &[
    // Acoustic model
    ("hmm",        S, None,              "Directory containing acoustic model files"),
    ("featparams", S, None,              "File containing feature extraction parameters"),
    ("mdef",       S, None,              "Model definition input file"),
    ("senmgau",    S, None,              "Senone to codebook mapping input file (usually not needed)"),
    ("tmat",       S, None,              "HMM state transition matrix input file"),
    ("tmatfloor",  F, Some("0.0001"),    "HMM state transition probability floor"),
    ("mean",       S, None,              "Mixture gaussian means input file"),
    ("var",        S, None,              "Mixture gaussian variances input file"),
    ("varfloor",   F, Some("0.0001"),    "Mixture gaussian variance floor"),
    ("mixw",       S, None,              "Senone mixture weights input file (uncompressed)"),
    ("mixwfloor",  F, Some("0.0000001"), "Senone mixture weights floor"),
    ("sendump",    S, None,              "Senone dump (compressed mixture weights) input file"),
    ("aw",         I, Some("1"),         "Inverse weight applied to acoustic scores"),
    ("ds",         I, Some("1"),         "Frame GMM computation downsampling ratio"),
    ("topn",       I, Some("4"),         "Maximum number of top Gaussians to use in scoring"),
    ("logbase",    F, Some("1.0001"),    "Base in which all log-likelihoods are calculated"),
    ("cionly",     B, Some("no"),        "Use only context-independent phones"),
    // Front end
    ("samprate",   F, Some("16000"),     "Sampling rate"),
    ("frate",      I, Some("100"),       "Frame rate"),
    ("wlen",       F, Some("0.025625"),  "Hamming window length"),
    ("alpha",      F, Some("0.97"),      "Preemphasis parameter"),
    ("nfft",       I, Some("0"),         "Size of FFT, or 0 to set automatically"),
    ("nfilt",      I, Some("40"),        "Number of filter banks"),
    ("lowerf",     F, Some("133.33334"), "Lower edge of filters"),
    ("upperf",     F, Some("6855.4976"), "Upper edge of filters"),
    ("ncep",       I, Some("13"),        "Number of cep coefficients"),
    ("transform",  S, Some("legacy"),    "Cepstral transform (legacy, dct, or htk)"),
    ("dither",     B, Some("no"),        "Add 1/2-bit noise"),
    ("seed",       I, Some("-1"),        "Seed for random number generator"),
    ("remove_dc",  B, Some("no"),        "Remove DC offset from each frame"),
    // Dynamic features
    ("feat",       S, Some("1s_c_d_dd"), "Feature stream type, depends on the acoustic model"),
    ("ceplen",     I, Some("13"),        "Number of components in the input feature vector"),
    ("cmn",        S, Some("live"),      "Cepstral mean normalization scheme (live, batch, or none)"),
    ("cmninit",    S, Some("40,3,-1"),   "Initial values for cepstral mean when live is used"),
    ("varnorm",    B, Some("no"),        "Variance normalize each utterance"),
    ("lda",        S, None,              "Transformation matrix applied to features"),
    ("ldadim",     I, Some("0"),         "Dimensionality of output of feature transformation"),
    // Dictionaries
    ("dict",       S, None,              "Main pronunciation dictionary (lexicon) input file"),
    ("fdict",      S, None,              "Noise word pronunciation dictionary input file"),
    ("dictcase",   B, Some("no"),        "Dictionary is case sensitive"),
    // Search
    ("beam",       F, Some("1e-48"),     "Beam width applied to every frame in Viterbi search"),
    ("wbeam",      F, Some("7e-29"),     "Beam width applied to word exits"),
    ("pbeam",      F, Some("1e-48"),     "Beam width applied to phone transitions"),
    ("maxhmmpf",   I, Some("30000"),     "Maximum number of active HMMs per frame (-1 for no pruning)"),
    ("bestpath",   B, Some("yes"),       "Run bestpath search over word lattice"),
    ("backtrace",  B, Some("no"),        "Print results and backtraces to log"),
    ("compallsen", B, Some("no"),        "Compute all senone scores in every frame"),
    // Grammars
    ("fsg",        S, None,              "Sphinx format finite state grammar file"),
    ("jsgf",       S, None,              "JSGF grammar file"),
    ("toprule",    S, None,              "Start rule for JSGF (first public rule is default)"),
    ("fsgusealtpron", B, Some("yes"),    "Add alternate pronunciations to FSG"),
    ("fsgusefiller",  B, Some("yes"),    "Insert filler words at each state"),
    ("lw",         F, Some("6.5"),       "Language model probability weight"),
    ("wip",        F, Some("0.65"),      "Word insertion penalty"),
    ("pip",        F, Some("1.0"),       "Phone insertion penalty"),
    ("silprob",    F, Some("0.005"),     "Silence word transition probability"),
    ("fillprob",   F, Some("1e-8"),      "Filler word transition probability"),
    // Logging
    ("loglevel",   S, Some("WARN"),      "Minimum level of log messages"),
];

/// The built-in parameter table.
pub fn default_schema() -> Vec<ParamDef> {
    DEFAULTS
        .iter()
        .map(|&(name, kind, default, doc)| ParamDef::new(name, kind, default, doc))
        .collect()
}
