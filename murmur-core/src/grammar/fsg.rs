//! Weighted finite-state word graphs.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Lexicon, LogMath};
use crate::error::{MurmurError, Result};

/// Index into an [`Fsg`]'s vocabulary.
pub type WordId = usize;

/// Largest state count a grammar may declare.
pub const MAX_STATES: usize = 1 << 20;

/// A transition as supplied by callers: raw probability, optional word.
///
/// Deserializes from `{"from": 0, "to": 1, "word": "go", "prob": 0.5}`;
/// `word` and `prob` may be omitted (null transition, probability 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub from: i64,
    pub to: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prob: Option<f64>,
}

impl Transition {
    pub fn word(from: i64, to: i64, word: &str, prob: f64) -> Self {
        Self {
            from,
            to,
            word: Some(word.to_string()),
            prob: Some(prob),
        }
    }

    pub fn null(from: i64, to: i64, prob: f64) -> Self {
        Self {
            from,
            to,
            word: None,
            prob: Some(prob),
        }
    }
}

/// A compiled transition. `logprob` is already scaled by the language
/// weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsgLink {
    pub from: usize,
    pub to: usize,
    pub word: Option<WordId>,
    pub logprob: i32,
}

/// A compiled finite-state grammar.
///
/// Owned by value; dropping it releases everything, including on the error
/// paths of the compilers that build it.
#[derive(Debug, Clone, PartialEq)]
pub struct Fsg {
    name: String,
    n_state: usize,
    start: usize,
    final_state: usize,
    links: Vec<FsgLink>,
    vocab: Vec<String>,
    lw: f32,
}

impl Fsg {
    /// Compile an explicit transition list.
    ///
    /// The state count is one more than the largest state mentioned by any
    /// transition.
    ///
    /// # Errors
    /// - `InvalidGrammar` for negative states, more than [`MAX_STATES`]
    ///   states, start/final out of range or a probability outside (0, 1].
    /// - `UnresolvedWord` if a labeled transition's word is not in `lexicon`.
    pub fn from_transitions<L: Lexicon + ?Sized>(
        name: &str,
        start: i64,
        final_state: i64,
        transitions: &[Transition],
        lexicon: &L,
        lmath: &LogMath,
        lw: f32,
    ) -> Result<Fsg> {
        let mut max_state = 0i64;
        for t in transitions {
            if t.from < 0 || t.to < 0 {
                return Err(MurmurError::InvalidGrammar(format!(
                    "negative state in transition {} -> {}",
                    t.from, t.to
                )));
            }
            max_state = max_state.max(t.from).max(t.to);
        }
        Self::compile(
            name,
            max_state as usize + 1,
            start,
            final_state,
            transitions,
            lexicon,
            lmath,
            lw,
        )
    }

    /// Compile with an explicit state count (as declared by FSG files).
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn compile<L: Lexicon + ?Sized>(
        name: &str,
        n_state: usize,
        start: i64,
        final_state: i64,
        transitions: &[Transition],
        lexicon: &L,
        lmath: &LogMath,
        lw: f32,
    ) -> Result<Fsg> {
        if n_state > MAX_STATES {
            return Err(MurmurError::InvalidGrammar(format!(
                "{n_state} states exceeds the limit of {MAX_STATES}"
            )));
        }
        let in_range = |s: i64| s >= 0 && (s as usize) < n_state;
        if !in_range(start) || !in_range(final_state) {
            return Err(MurmurError::InvalidGrammar(format!(
                "start {start} / final {final_state} outside 0..{n_state}"
            )));
        }

        let mut builder = FsgBuilder::new(name, n_state, start as usize, final_state as usize, lw);
        for t in transitions {
            if !in_range(t.from) || !in_range(t.to) {
                return Err(MurmurError::InvalidGrammar(format!(
                    "transition {} -> {} outside 0..{n_state}",
                    t.from, t.to
                )));
            }
            let prob = t.prob.unwrap_or(1.0);
            if !(prob > 0.0 && prob <= 1.0) {
                return Err(MurmurError::InvalidGrammar(format!(
                    "probability {prob} on {} -> {} not in (0, 1]",
                    t.from, t.to
                )));
            }
            let logprob = (lmath.log(prob) as f32 * lw) as i32;
            match &t.word {
                Some(word) => {
                    if !lexicon.contains_word(word) {
                        return Err(MurmurError::UnresolvedWord(word.clone()));
                    }
                    builder.add_word_link(t.from as usize, t.to as usize, word, logprob);
                }
                None => builder.add_null_link(t.from as usize, t.to as usize, logprob),
            }
        }
        let fsg = builder.build();
        debug!(
            name = fsg.name(),
            states = fsg.n_state(),
            words = fsg.vocab().len(),
            links = fsg.links().len(),
            "compiled FSG"
        );
        Ok(fsg)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn n_state(&self) -> usize {
        self.n_state
    }

    pub fn start_state(&self) -> usize {
        self.start
    }

    pub fn final_state(&self) -> usize {
        self.final_state
    }

    pub fn links(&self) -> &[FsgLink] {
        &self.links
    }

    pub fn vocab(&self) -> &[String] {
        &self.vocab
    }

    /// Language weight the log-probabilities were scaled by.
    pub fn lw(&self) -> f32 {
        self.lw
    }

    pub fn word(&self, id: WordId) -> &str {
        &self.vocab[id]
    }

    /// Links leaving `state`.
    pub fn links_from(&self, state: usize) -> impl Iterator<Item = &FsgLink> {
        self.links.iter().filter(move |l| l.from == state)
    }

    /// Highest-probability word sequence from start to final state, fewest
    /// words on ties. `None` if the final state is unreachable.
    ///
    /// All log-probabilities are <= 0, so this is a shortest-path search on
    /// their negation.
    pub fn best_path(&self) -> Option<Vec<WordId>> {
        let mut best: Vec<Option<(i64, usize)>> = vec![None; self.n_state];
        let mut back: Vec<Option<usize>> = vec![None; self.n_state];
        let mut heap = BinaryHeap::new();

        best[self.start] = Some((0, 0));
        heap.push(Reverse((0i64, 0usize, self.start)));

        while let Some(Reverse((cost, nwords, state))) = heap.pop() {
            if best[state] != Some((cost, nwords)) {
                continue;
            }
            if state == self.final_state {
                break;
            }
            for (idx, link) in self.links.iter().enumerate() {
                if link.from != state {
                    continue;
                }
                let next = (
                    cost - link.logprob as i64,
                    nwords + usize::from(link.word.is_some()),
                );
                if best[link.to].map_or(true, |b| next < b) {
                    best[link.to] = Some(next);
                    back[link.to] = Some(idx);
                    heap.push(Reverse((next.0, next.1, link.to)));
                }
            }
        }

        best[self.final_state]?;
        let mut words = Vec::new();
        let mut state = self.final_state;
        while state != self.start {
            let link = &self.links[back[state]?];
            if let Some(w) = link.word {
                words.push(w);
            }
            state = link.from;
        }
        words.reverse();
        Some(words)
    }
}

/// Incremental FSG construction with duplicate-link folding.
pub(crate) struct FsgBuilder {
    fsg: Fsg,
    word_ids: HashMap<String, WordId>,
    index: HashMap<(usize, usize, Option<WordId>), usize>,
}

impl FsgBuilder {
    pub(crate) fn new(name: &str, n_state: usize, start: usize, final_state: usize, lw: f32) -> Self {
        Self {
            fsg: Fsg {
                name: name.to_string(),
                n_state,
                start,
                final_state,
                links: Vec::new(),
                vocab: Vec::new(),
                lw,
            },
            word_ids: HashMap::new(),
            index: HashMap::new(),
        }
    }

    fn word_id(&mut self, word: &str) -> WordId {
        if let Some(&id) = self.word_ids.get(word) {
            return id;
        }
        let id = self.fsg.vocab.len();
        self.fsg.vocab.push(word.to_string());
        self.word_ids.insert(word.to_string(), id);
        id
    }

    fn add(&mut self, from: usize, to: usize, word: Option<WordId>, logprob: i32) {
        match self.index.get(&(from, to, word)) {
            // Parallel links with the same label keep the better score.
            Some(&i) => {
                let link = &mut self.fsg.links[i];
                link.logprob = link.logprob.max(logprob);
            }
            None => {
                self.index.insert((from, to, word), self.fsg.links.len());
                self.fsg.links.push(FsgLink {
                    from,
                    to,
                    word,
                    logprob,
                });
            }
        }
    }

    pub(crate) fn add_word_link(&mut self, from: usize, to: usize, word: &str, logprob: i32) {
        let id = self.word_id(word);
        self.add(from, to, Some(id), logprob);
    }

    pub(crate) fn add_null_link(&mut self, from: usize, to: usize, logprob: i32) {
        if from == to {
            return;
        }
        self.add(from, to, None, logprob);
    }

    pub(crate) fn build(self) -> Fsg {
        self.fsg
    }
}
