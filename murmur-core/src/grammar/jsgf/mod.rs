//! JSGF grammars.
//!
//! Supported syntax: the `#JSGF` header, `grammar` declaration, `import`
//! (parsed and ignored with a warning), `public` and private rules,
//! alternatives with `/weight/`, sequences, `[optional]`, `(grouping)`,
//! `*`, `+`, `{tags}` (ignored), `<NULL>`, `<VOID>`, quoted tokens and both
//! comment styles.
//!
//! A chosen rule is flattened into a transition list and compiled through
//! [`Fsg::from_transitions`], so JSGF grammars obey exactly the same word
//! resolution and probability rules as hand-built ones.

mod flatten;
mod parser;

use crate::error::{MurmurError, Result};

use super::{Fsg, Lexicon, LogMath};

/// Right-hand side of a rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Expansion {
    Token(String),
    RuleRef(String),
    /// `<NULL>`: matches without consuming a word.
    Null,
    /// `<VOID>`: never matches.
    Void,
    Sequence(Vec<Expansion>),
    /// Weighted alternatives. Unweighted entries count as weight 1 when any
    /// sibling carries a weight.
    Alternatives(Vec<(Option<f64>, Expansion)>),
    Optional(Box<Expansion>),
    /// `*` (`at_least_once == false`) or `+`.
    Repeat {
        expansion: Box<Expansion>,
        at_least_once: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: String,
    pub public: bool,
    pub expansion: Expansion,
}

/// A parsed JSGF grammar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grammar {
    pub header: Option<String>,
    pub name: Option<String>,
    pub imports: Vec<String>,
    pub rules: Vec<Rule>,
}

impl Grammar {
    /// Parse JSGF source text.
    pub fn parse(text: &str) -> Result<Grammar> {
        parser::parse(text)
    }

    /// Fully qualified rule name, `grammar.rule` when the grammar is named.
    pub fn qualified_name(&self, rule: &Rule) -> String {
        match &self.name {
            Some(g) => format!("{g}.{}", rule.name),
            None => rule.name.clone(),
        }
    }

    fn find(&self, name: &str) -> Option<&Rule> {
        let name = name.trim_start_matches('<').trim_end_matches('>');
        self.rules
            .iter()
            .find(|r| r.name == name || self.qualified_name(r) == name)
    }

    /// Select a rule by local or qualified name, or the first public rule in
    /// declaration order when `name` is `None`.
    ///
    /// # Errors
    /// `RuleNotFound` for an unknown name, `NoPublicRule` if `name` is
    /// `None` and nothing is public.
    pub fn rule(&self, name: Option<&str>) -> Result<&Rule> {
        match name {
            Some(name) => self
                .find(name)
                .ok_or_else(|| MurmurError::RuleNotFound(name.to_string())),
            None => self
                .rules
                .iter()
                .find(|r| r.public)
                .ok_or(MurmurError::NoPublicRule),
        }
    }

    /// Flatten `rule` (see [`Grammar::rule`]) and compile it.
    pub fn build_fsg<L: Lexicon + ?Sized>(
        &self,
        rule: Option<&str>,
        lexicon: &L,
        lmath: &LogMath,
        lw: f32,
    ) -> Result<Fsg> {
        let rule = self.rule(rule)?;
        let (transitions, final_state) = flatten::flatten(self, rule)?;
        Fsg::from_transitions(
            &self.qualified_name(rule),
            0,
            final_state,
            &transitions,
            lexicon,
            lmath,
            lw,
        )
    }
}
