//! Rule flattening: JSGF expansion tree to a transition list.
//!
//! Each construct is expanded between an entry and an exit state, adding
//! fresh intermediate states as needed. Rule references expand inline.
//! A reference back to a rule already being expanded is allowed only in
//! tail position (its exit is the enclosing rule's exit), where it becomes a
//! null transition back to that rule's entry.

use super::{Expansion, Grammar, Rule};
use crate::error::{MurmurError, Result};
use crate::grammar::Transition;

const START: i64 = 0;
const FINAL: i64 = 1;

struct Active {
    name: String,
    entry: i64,
    exit: i64,
}

struct Flattener<'g> {
    grammar: &'g Grammar,
    transitions: Vec<Transition>,
    next_state: i64,
    active: Vec<Active>,
}

impl<'g> Flattener<'g> {
    fn new_state(&mut self) -> i64 {
        let s = self.next_state;
        self.next_state += 1;
        s
    }

    fn null(&mut self, from: i64, to: i64, prob: f64) {
        self.transitions.push(Transition::null(from, to, prob));
    }

    fn rule(&mut self, rule: &'g Rule, from: i64, to: i64) -> Result<()> {
        // A private entry state keeps tail loops from leaking into sibling
        // paths that share `from`.
        let entry = self.new_state();
        self.null(from, entry, 1.0);
        self.active.push(Active {
            name: rule.name.clone(),
            entry,
            exit: to,
        });
        self.expand(&rule.expansion, entry, to)?;
        self.active.pop();
        Ok(())
    }

    fn expand(&mut self, expansion: &'g Expansion, from: i64, to: i64) -> Result<()> {
        match expansion {
            Expansion::Token(word) => {
                self.transitions.push(Transition::word(from, to, word, 1.0));
            }
            Expansion::Null => self.null(from, to, 1.0),
            Expansion::Void => {}
            Expansion::Sequence(items) => {
                let mut here = from;
                for (i, item) in items.iter().enumerate() {
                    let next = if i + 1 == items.len() { to } else { self.new_state() };
                    self.expand(item, here, next)?;
                    here = next;
                }
            }
            Expansion::Alternatives(alts) => {
                let weighted = alts.iter().any(|(w, _)| w.is_some());
                let total: f64 = alts.iter().map(|(w, _)| w.unwrap_or(1.0)).sum();
                for (weight, alt) in alts {
                    if !weighted {
                        self.expand(alt, from, to)?;
                        continue;
                    }
                    let weight = weight.unwrap_or(1.0);
                    if weight <= 0.0 {
                        continue;
                    }
                    let entry = self.new_state();
                    self.null(from, entry, weight / total);
                    self.expand(alt, entry, to)?;
                }
            }
            Expansion::Optional(inner) => {
                self.expand(inner, from, to)?;
                self.null(from, to, 1.0);
            }
            Expansion::Repeat {
                expansion,
                at_least_once,
            } => {
                let loop_in = self.new_state();
                let loop_out = self.new_state();
                self.null(from, loop_in, 1.0);
                self.expand(expansion, loop_in, loop_out)?;
                self.null(loop_out, loop_in, 1.0);
                self.null(loop_out, to, 1.0);
                if !at_least_once {
                    self.null(from, to, 1.0);
                }
            }
            Expansion::RuleRef(name) => {
                let local = name.rsplit('.').next().unwrap_or(name);
                if let Some(active) = self.active.iter().rev().find(|a| a.name == local || a.name == *name) {
                    if active.exit != to {
                        return Err(MurmurError::RecursiveRule(active.name.clone()));
                    }
                    let entry = active.entry;
                    self.null(from, entry, 1.0);
                    return Ok(());
                }
                let grammar = self.grammar;
                let rule = grammar.rule(Some(name))?;
                self.rule(rule, from, to)?;
            }
        }
        Ok(())
    }
}

/// Flatten `rule` into transitions from state 0 to the returned final state.
pub(super) fn flatten(grammar: &Grammar, rule: &Rule) -> Result<(Vec<Transition>, i64)> {
    let mut f = Flattener {
        grammar,
        transitions: Vec::new(),
        next_state: FINAL + 1,
        active: Vec::new(),
    };
    f.rule(rule, START, FINAL)?;
    Ok((f.transitions, FINAL))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Fsg, LogMath};

    fn accepts(fsg: &Fsg, words: &[&str]) -> bool {
        // Breadth-first over (state, position), following null links freely.
        let mut seen = std::collections::HashSet::new();
        let mut queue = vec![(fsg.start_state(), 0usize)];
        while let Some((state, pos)) = queue.pop() {
            if !seen.insert((state, pos)) {
                continue;
            }
            if state == fsg.final_state() && pos == words.len() {
                return true;
            }
            for link in fsg.links_from(state) {
                match link.word {
                    None => queue.push((link.to, pos)),
                    Some(w) if pos < words.len() && fsg.word(w) == words[pos] => {
                        queue.push((link.to, pos + 1))
                    }
                    Some(_) => {}
                }
            }
        }
        false
    }

    fn compile(text: &str, rule: Option<&str>) -> Result<Fsg> {
        let lexicon = ["a", "b", "c", "go", "stop", "now", "please"];
        let lmath = LogMath::new(1.0001).unwrap();
        Grammar::parse(text)?.build_fsg(rule, lexicon.as_slice(), &lmath, 1.0)
    }

    #[test]
    fn sequences_optionals_and_groups() {
        let fsg = compile("public <r> = (go | stop) [now] please;", None).unwrap();
        assert!(accepts(&fsg, &["go", "please"]));
        assert!(accepts(&fsg, &["stop", "now", "please"]));
        assert!(!accepts(&fsg, &["go", "now"]));
        assert!(!accepts(&fsg, &["go", "stop", "please"]));
    }

    #[test]
    fn kleene_star_and_plus() {
        let fsg = compile("public <r> = a* b+;", None).unwrap();
        assert!(accepts(&fsg, &["b"]));
        assert!(accepts(&fsg, &["a", "a", "b", "b"]));
        assert!(!accepts(&fsg, &["a"]));
        assert!(!accepts(&fsg, &[]));
    }

    #[test]
    fn references_expand_inline() {
        let fsg = compile("<x> = a | b; public <r> = go <x> <x>;", None).unwrap();
        assert!(accepts(&fsg, &["go", "a", "b"]));
        assert!(!accepts(&fsg, &["go", "a"]));
    }

    #[test]
    fn tail_recursion_becomes_a_loop() {
        let fsg = compile("public <r> = <l> | stop; <l> = a <l> | c;", None).unwrap();
        assert!(accepts(&fsg, &["stop"]));
        assert!(accepts(&fsg, &["c"]));
        assert!(accepts(&fsg, &["a", "a", "c"]));
        // The loop must not reach the sibling alternative.
        assert!(!accepts(&fsg, &["a", "stop"]));
    }

    #[test]
    fn non_tail_recursion_is_rejected() {
        let err = compile("public <r> = a <r> b | c;", None).unwrap_err();
        assert!(matches!(err, MurmurError::RecursiveRule(r) if r == "r"));
    }

    #[test]
    fn void_alternatives_never_match() {
        let fsg = compile("public <r> = <VOID> | go <NULL>;", None).unwrap();
        assert!(accepts(&fsg, &["go"]));
        assert!(!accepts(&fsg, &[]));
    }

    #[test]
    fn weights_become_normalized_probabilities() {
        let lmath = LogMath::new(1.0001).unwrap();
        let fsg = compile("public <r> = /3/ go | /1/ stop;", None).unwrap();
        let mut null_probs: Vec<i32> = fsg
            .links_from(fsg.start_state())
            .flat_map(|entry| fsg.links_from(entry.to))
            .filter(|l| l.word.is_none())
            .map(|l| l.logprob)
            .collect();
        null_probs.sort();
        assert_eq!(null_probs, vec![lmath.log(0.25), lmath.log(0.75)]);
    }

    #[test]
    fn unknown_reference_and_unknown_word_fail() {
        assert!(matches!(
            compile("public <r> = <missing>;", None),
            Err(MurmurError::RuleNotFound(_))
        ));
        assert!(matches!(
            compile("public <r> = dance;", None),
            Err(MurmurError::UnresolvedWord(w)) if w == "dance"
        ));
    }
}
