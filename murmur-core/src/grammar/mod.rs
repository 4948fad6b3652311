//! Grammar compilation.
//!
//! Every grammar source ends up as an [`Fsg`]: explicit transition lists
//! compile directly, JSGF rules are flattened into a transition list first,
//! and Sphinx FSG files carry their own state count.

pub mod fsg;
pub mod fsg_text;
pub mod jsgf;
pub mod logmath;

use std::collections::{BTreeSet, HashSet};

pub use fsg::{Fsg, FsgLink, Transition, WordId};
pub use logmath::LogMath;

/// Word membership test used to resolve labeled transitions.
///
/// The decoder passes its engine's pronunciation dictionary; tests can use
/// a plain set of words.
pub trait Lexicon {
    fn contains_word(&self, word: &str) -> bool;
}

impl Lexicon for HashSet<String> {
    fn contains_word(&self, word: &str) -> bool {
        self.contains(word)
    }
}

impl Lexicon for BTreeSet<String> {
    fn contains_word(&self, word: &str) -> bool {
        self.contains(word)
    }
}

impl Lexicon for [&str] {
    fn contains_word(&self, word: &str) -> bool {
        self.iter().any(|w| *w == word)
    }
}
