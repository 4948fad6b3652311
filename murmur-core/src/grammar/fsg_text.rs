//! Sphinx FSG text format.
//!
//! ```text
//! # comment
//! FSG_BEGIN goforward
//! NUM_STATES 5
//! START_STATE 0
//! FINAL_STATE 4
//! TRANSITION 0 1 1.0 go
//! T 1 2 0.5
//! FSG_END
//! ```
//!
//! Headers must appear in the order shown; the short forms `N`, `S`, `F`
//! and `T` are accepted. A transition without a word is a null transition.
//! Text before `FSG_BEGIN` is ignored, anything unrecognized after it is an
//! error.

use std::fmt::Write as _;

use tracing::info;

use super::fsg::MAX_STATES;
use super::{Fsg, Lexicon, LogMath, Transition};
use crate::error::{MurmurError, Result};

struct Lines<'a> {
    inner: std::iter::Enumerate<std::str::Lines<'a>>,
}

impl<'a> Lines<'a> {
    /// Next non-blank, non-comment line as (1-based line number, tokens).
    fn next_tokens(&mut self) -> Option<(usize, Vec<&'a str>)> {
        for (idx, line) in self.inner.by_ref() {
            if line.starts_with('#') {
                continue;
            }
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if !tokens.is_empty() {
                return Some((idx + 1, tokens));
            }
        }
        None
    }

    /// Skip ahead to the header `long` and return its value.
    fn seek(&mut self, long: &str) -> Result<(usize, &'a str)> {
        while let Some((line, tokens)) = self.next_tokens() {
            if tokens[0] == long {
                return Ok((line, tokens.get(1).copied().unwrap_or_default()));
            }
        }
        Err(MurmurError::GrammarParse {
            line: 0,
            message: format!("{long} declaration missing"),
        })
    }

    /// The next line must be the header `long` (or `short`) with one value.
    fn next_header(&mut self, long: &str, short: &str) -> Result<(usize, &'a str)> {
        match self.next_tokens() {
            Some((line, tokens)) if tokens[0] == long || tokens[0] == short => match tokens[..] {
                [_, value] => Ok((line, value)),
                _ => Err(MurmurError::GrammarParse {
                    line,
                    message: format!("{long} takes exactly one value"),
                }),
            },
            Some((line, tokens)) => Err(MurmurError::GrammarParse {
                line,
                message: format!("expected {long}, found {:?}", tokens[0]),
            }),
            None => Err(MurmurError::GrammarParse {
                line: 0,
                message: format!("{long} declaration missing"),
            }),
        }
    }
}

fn parse_state(line: usize, what: &str, text: &str) -> Result<i64> {
    text.parse::<i64>()
        .ok()
        .filter(|s| *s >= 0)
        .ok_or_else(|| MurmurError::GrammarParse {
            line,
            message: format!("malformed {what}: {text:?}"),
        })
}

/// Parse an FSG file and compile it against `lexicon`.
///
/// # Errors
/// `GrammarParse` for malformed, missing or out-of-order declarations, an
/// unrecognized line in the transition list or a missing `FSG_END`, plus
/// every error
/// [`Fsg::from_transitions`] can report.
pub fn parse<L: Lexicon + ?Sized>(text: &str, lexicon: &L, lmath: &LogMath, lw: f32) -> Result<Fsg> {
    let mut lines = Lines {
        inner: text.lines().enumerate(),
    };

    let (_, name) = lines.seek("FSG_BEGIN")?;
    let (line, n) = lines.next_header("NUM_STATES", "N")?;
    let n_state = parse_state(line, "NUM_STATES", n)?;
    if n_state == 0 || n_state as usize > MAX_STATES {
        return Err(MurmurError::GrammarParse {
            line,
            message: format!("NUM_STATES {n_state} not in 1..={MAX_STATES}"),
        });
    }
    let (line, s) = lines.next_header("START_STATE", "S")?;
    let start = parse_state(line, "START_STATE", s)?;
    let (line, f) = lines.next_header("FINAL_STATE", "F")?;
    let final_state = parse_state(line, "FINAL_STATE", f)?;

    let mut transitions = Vec::new();
    loop {
        let Some((line, tokens)) = lines.next_tokens() else {
            return Err(MurmurError::GrammarParse {
                line: 0,
                message: "FSG_END missing".to_string(),
            });
        };
        match tokens[0] {
            "FSG_END" => break,
            "T" | "TRANSITION" => {
                let field = |i: usize, what: &str| {
                    tokens.get(i).copied().ok_or_else(|| MurmurError::GrammarParse {
                        line,
                        message: format!("{what} missing"),
                    })
                };
                let from = parse_state(line, "from-state", field(1, "from-state")?)?;
                let to = parse_state(line, "to-state", field(2, "to-state")?)?;
                let prob_text = field(3, "transition probability")?;
                let prob: f64 = prob_text.parse().map_err(|_| MurmurError::GrammarParse {
                    line,
                    message: format!("expected probability, got {prob_text:?}"),
                })?;
                transitions.push(Transition {
                    from,
                    to,
                    word: tokens.get(4).map(|w| w.to_string()),
                    prob: Some(prob),
                });
            }
            other => {
                return Err(MurmurError::GrammarParse {
                    line,
                    message: format!("unexpected {other:?} in transition list"),
                })
            }
        }
    }

    let fsg = Fsg::compile(name, n_state as usize, start, final_state, &transitions, lexicon, lmath, lw)?;
    info!(
        name,
        states = fsg.n_state(),
        words = fsg.vocab().len(),
        transitions = fsg.links().len(),
        "read FSG"
    );
    Ok(fsg)
}

/// Render `fsg` in the text format, undoing the language-weight scaling.
pub fn write(fsg: &Fsg, lmath: &LogMath) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "FSG_BEGIN {}", fsg.name());
    let _ = writeln!(out, "NUM_STATES {}", fsg.n_state());
    let _ = writeln!(out, "START_STATE {}", fsg.start_state());
    let _ = writeln!(out, "FINAL_STATE {}", fsg.final_state());
    for state in 0..fsg.n_state() {
        for link in fsg.links_from(state) {
            let prob = lmath.exp((link.logprob as f32 / fsg.lw()) as i32);
            let _ = match link.word {
                Some(w) => writeln!(out, "TRANSITION {} {} {prob:.6} {}", link.from, link.to, fsg.word(w)),
                None => writeln!(out, "TRANSITION {} {} {prob:.6}", link.from, link.to),
            };
        }
    }
    out.push_str("FSG_END\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const GOFORWARD: &str = "\
# a comment
FSG_BEGIN goforward
NUM_STATES 5
START_STATE 0
FINAL_STATE 4

TRANSITION 0 1 1.0 go
T 1 2 1.0 forward
T 2 3 0.5 ten
T 2 3 0.5 five
T 3 4 1.0 meters
T 0 0 0.3
FSG_END
";

    fn words() -> Vec<&'static str> {
        vec!["go", "forward", "ten", "five", "meters"]
    }

    #[test]
    fn reads_headers_and_transitions() {
        let lmath = LogMath::new(1.0001).unwrap();
        let fsg = parse(GOFORWARD, words().as_slice(), &lmath, 6.5).unwrap();
        assert_eq!(fsg.name(), "goforward");
        assert_eq!(fsg.n_state(), 5);
        assert_eq!(fsg.start_state(), 0);
        assert_eq!(fsg.final_state(), 4);
        // The null self-loop is dropped.
        assert_eq!(fsg.links().len(), 5);
        assert_eq!(fsg.vocab().len(), 5);
    }

    #[test]
    fn declared_state_count_may_exceed_used_states() {
        let lmath = LogMath::new(1.0001).unwrap();
        let text = "FSG_BEGIN x\nN 10\nS 0\nF 1\nT 0 1 1.0 go\nFSG_END\n";
        let fsg = parse(text, words().as_slice(), &lmath, 1.0).unwrap();
        assert_eq!(fsg.n_state(), 10);
    }

    #[test]
    fn missing_header_is_a_parse_error() {
        let lmath = LogMath::new(1.0001).unwrap();
        let err = parse("FSG_BEGIN x\nSTART_STATE 0\n", words().as_slice(), &lmath, 1.0).unwrap_err();
        assert!(matches!(err, MurmurError::GrammarParse { .. }));
    }

    #[test]
    fn unknown_lines_and_missing_end_are_parse_errors() {
        let lmath = LogMath::new(1.0001).unwrap();
        let cases = [
            ("FSG_BEGIN x\nN 2\nS 0\nF 1\nT 0 1 1.0 go\nTRANSTION 0 1 1.0 go\nFSG_END\n", 6),
            ("FSG_BEGIN x\nN 2\nS 0\nF 1\nT 0 1 1.0 go\n", 0),
            ("FSG_BEGIN x\nN 2\nS 0\nsomething else\nF 1\nFSG_END\n", 4),
            ("FSG_BEGIN x\nN 2 3\nS 0\nF 1\nFSG_END\n", 2),
        ];
        for (text, expected) in cases {
            let err = parse(text, words().as_slice(), &lmath, 1.0).unwrap_err();
            assert!(
                matches!(err, MurmurError::GrammarParse { line, .. } if line == expected),
                "{text:?}: {err}"
            );
        }
    }

    #[test]
    fn state_count_must_be_positive_and_bounded() {
        let lmath = LogMath::new(1.0001).unwrap();
        for n in ["0", "4294967296", "99999999999"] {
            let text = format!("FSG_BEGIN x\nN {n}\nS 0\nF 0\nFSG_END\n");
            let err = parse(&text, words().as_slice(), &lmath, 1.0).unwrap_err();
            assert!(matches!(err, MurmurError::GrammarParse { line: 2, .. }), "{n}: {err}");
        }
    }

    #[test]
    fn bad_probability_reports_its_line() {
        let lmath = LogMath::new(1.0001).unwrap();
        let text = "FSG_BEGIN x\nN 2\nS 0\nF 1\nT 0 1 often go\n";
        let err = parse(text, words().as_slice(), &lmath, 1.0).unwrap_err();
        assert!(matches!(err, MurmurError::GrammarParse { line: 5, .. }), "{err}");
    }

    #[test]
    fn written_text_reads_back_to_the_same_graph() {
        let lmath = LogMath::new(1.0001).unwrap();
        let fsg = parse(GOFORWARD, words().as_slice(), &lmath, 6.5).unwrap();
        let text = write(&fsg, &lmath);
        assert!(text.starts_with("FSG_BEGIN goforward\nNUM_STATES 5\n"));
        assert!(text.contains("TRANSITION 2 3 0.5"));

        let again = parse(&text, words().as_slice(), &lmath, 6.5).unwrap();
        assert_eq!(again.n_state(), fsg.n_state());
        assert_eq!(again.vocab(), fsg.vocab());
        for (a, b) in again.links().iter().zip(fsg.links()) {
            assert_eq!((a.from, a.to, a.word), (b.from, b.to, b.word));
            assert_relative_eq!(
                lmath.exp(a.logprob),
                lmath.exp(b.logprob),
                max_relative = 1e-2
            );
        }
    }
}
