//! JSGF lexer and recursive-descent parser.

use tracing::warn;

use super::{Expansion, Grammar, Rule};
use crate::error::{MurmurError, Result};

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    /// `#JSGF V1.0 utf-8 en;` header, kept verbatim up to the `;`.
    Header(String),
    Word(String),
    Quoted(String),
    RuleRef(String),
    Weight(f64),
    Semi,
    Equals,
    Pipe,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Star,
    Plus,
    Tag,
}

fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !";=|()[]*+<>{}\"/".contains(c)
}

fn parse_error(line: usize, message: impl Into<String>) -> MurmurError {
    MurmurError::GrammarParse {
        line,
        message: message.into(),
    }
}

fn lex(text: &str) -> Result<Vec<(usize, Tok)>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut i = 0;

    // Consume up to (not including) `end`, tracking newlines.
    let take_until = |i: &mut usize, line: &mut usize, end: char| -> Option<String> {
        let mut s = String::new();
        while *i < chars.len() {
            let c = chars[*i];
            *i += 1;
            if c == end {
                return Some(s);
            }
            if c == '\n' {
                *line += 1;
            }
            s.push(c);
        }
        None
    };

    while i < chars.len() {
        let c = chars[i];
        let start_line = line;
        match c {
            '\n' => {
                line += 1;
                i += 1;
            }
            c if c.is_whitespace() => i += 1,
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                loop {
                    match chars.get(i) {
                        None => return Err(parse_error(start_line, "unterminated comment")),
                        Some('*') if chars.get(i + 1) == Some(&'/') => {
                            i += 2;
                            break;
                        }
                        Some('\n') => line += 1,
                        Some(_) => {}
                    }
                    i += 1;
                }
            }
            '/' => {
                i += 1;
                let body = take_until(&mut i, &mut line, '/')
                    .ok_or_else(|| parse_error(start_line, "unterminated weight"))?;
                let weight: f64 = body
                    .trim()
                    .parse()
                    .ok()
                    .filter(|w: &f64| w.is_finite() && *w >= 0.0)
                    .ok_or_else(|| parse_error(start_line, format!("bad weight /{body}/")))?;
                tokens.push((start_line, Tok::Weight(weight)));
            }
            '#' => {
                i += 1;
                let body = take_until(&mut i, &mut line, ';')
                    .ok_or_else(|| parse_error(start_line, "unterminated header"))?;
                tokens.push((start_line, Tok::Header(body.trim().to_string())));
            }
            '<' => {
                i += 1;
                let body = take_until(&mut i, &mut line, '>')
                    .ok_or_else(|| parse_error(start_line, "unterminated rule name"))?;
                let name = body.trim();
                if name.is_empty() || name.contains(char::is_whitespace) {
                    return Err(parse_error(start_line, format!("bad rule name <{body}>")));
                }
                tokens.push((start_line, Tok::RuleRef(name.to_string())));
            }
            '{' => {
                i += 1;
                take_until(&mut i, &mut line, '}')
                    .ok_or_else(|| parse_error(start_line, "unterminated tag"))?;
                tokens.push((start_line, Tok::Tag));
            }
            '"' => {
                i += 1;
                let body = take_until(&mut i, &mut line, '"')
                    .ok_or_else(|| parse_error(start_line, "unterminated quoted token"))?;
                tokens.push((start_line, Tok::Quoted(body)));
            }
            ';' | '=' | '|' | '(' | ')' | '[' | ']' | '*' | '+' => {
                let tok = match c {
                    ';' => Tok::Semi,
                    '=' => Tok::Equals,
                    '|' => Tok::Pipe,
                    '(' => Tok::LParen,
                    ')' => Tok::RParen,
                    '[' => Tok::LBracket,
                    ']' => Tok::RBracket,
                    '*' => Tok::Star,
                    _ => Tok::Plus,
                };
                tokens.push((line, tok));
                i += 1;
            }
            '>' | '}' => return Err(parse_error(line, format!("unexpected {c:?}"))),
            _ => {
                let begin = i;
                while i < chars.len() && is_word_char(chars[i]) {
                    i += 1;
                }
                tokens.push((line, Tok::Word(chars[begin..i].iter().collect())));
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Tok)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |(l, _)| *l)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        tok
    }

    fn expect(&mut self, want: Tok, what: &str) -> Result<()> {
        let line = self.line();
        match self.next() {
            Some(t) if t == want => Ok(()),
            Some(t) => Err(parse_error(line, format!("expected {what}, found {t:?}"))),
            None => Err(parse_error(line, format!("expected {what}, found end of input"))),
        }
    }

    fn grammar(&mut self) -> Result<Grammar> {
        let mut grammar = Grammar::default();

        if let Some(Tok::Header(h)) = self.peek() {
            if !h.starts_with("JSGF") {
                return Err(parse_error(self.line(), format!("bad header #{h}")));
            }
            grammar.header = Some(h.clone());
            self.pos += 1;
        }

        while let Some(tok) = self.peek().cloned() {
            let line = self.line();
            match tok {
                Tok::Word(w) if w == "grammar" => {
                    self.pos += 1;
                    match self.next() {
                        Some(Tok::Word(name)) => grammar.name = Some(name),
                        _ => return Err(parse_error(line, "expected grammar name")),
                    }
                    self.expect(Tok::Semi, "';'")?;
                }
                Tok::Word(w) if w == "import" => {
                    self.pos += 1;
                    match self.next() {
                        Some(Tok::RuleRef(name)) => {
                            warn!(import = %name, "JSGF imports are not supported, ignoring");
                            grammar.imports.push(name);
                        }
                        _ => return Err(parse_error(line, "expected <rule> after import")),
                    }
                    self.expect(Tok::Semi, "';'")?;
                }
                Tok::Word(w) if w == "public" => {
                    self.pos += 1;
                    let rule = self.rule(true)?;
                    grammar.rules.push(rule);
                }
                Tok::RuleRef(_) => {
                    let rule = self.rule(false)?;
                    grammar.rules.push(rule);
                }
                other => return Err(parse_error(line, format!("unexpected {other:?}"))),
            }
        }
        Ok(grammar)
    }

    fn rule(&mut self, public: bool) -> Result<Rule> {
        let line = self.line();
        let name = match self.next() {
            Some(Tok::RuleRef(name)) if name != "NULL" && name != "VOID" => name,
            _ => return Err(parse_error(line, "expected rule name")),
        };
        self.expect(Tok::Equals, "'='")?;
        let expansion = self.alternatives()?;
        self.expect(Tok::Semi, "';'")?;
        Ok(Rule {
            name,
            public,
            expansion,
        })
    }

    fn alternatives(&mut self) -> Result<Expansion> {
        let mut alts = vec![self.weighted()?];
        while self.peek() == Some(&Tok::Pipe) {
            self.pos += 1;
            alts.push(self.weighted()?);
        }
        if alts.len() == 1 && alts[0].0.is_none() {
            return Ok(alts.remove(0).1);
        }
        Ok(Expansion::Alternatives(alts))
    }

    fn weighted(&mut self) -> Result<(Option<f64>, Expansion)> {
        let weight = match self.peek() {
            Some(Tok::Weight(w)) => {
                let w = *w;
                self.pos += 1;
                Some(w)
            }
            _ => None,
        };
        Ok((weight, self.sequence()?))
    }

    fn sequence(&mut self) -> Result<Expansion> {
        let mut items = Vec::new();
        loop {
            match self.peek() {
                Some(Tok::Tag) => self.pos += 1,
                Some(Tok::Word(_) | Tok::Quoted(_) | Tok::RuleRef(_) | Tok::LParen | Tok::LBracket) => {
                    items.push(self.item()?);
                }
                _ => break,
            }
        }
        match items.len() {
            0 => Err(parse_error(self.line(), "empty expansion")),
            1 => Ok(items.remove(0)),
            _ => Ok(Expansion::Sequence(items)),
        }
    }

    fn item(&mut self) -> Result<Expansion> {
        let line = self.line();
        let mut item = match self.next() {
            Some(Tok::Word(w)) | Some(Tok::Quoted(w)) => Expansion::Token(w),
            Some(Tok::RuleRef(name)) => match name.as_str() {
                "NULL" => Expansion::Null,
                "VOID" => Expansion::Void,
                _ => Expansion::RuleRef(name),
            },
            Some(Tok::LParen) => {
                let inner = self.alternatives()?;
                self.expect(Tok::RParen, "')'")?;
                inner
            }
            Some(Tok::LBracket) => {
                let inner = self.alternatives()?;
                self.expect(Tok::RBracket, "']'")?;
                Expansion::Optional(Box::new(inner))
            }
            other => return Err(parse_error(line, format!("unexpected {other:?}"))),
        };
        loop {
            match self.peek() {
                Some(Tok::Star) => {
                    self.pos += 1;
                    item = Expansion::Repeat {
                        expansion: Box::new(item),
                        at_least_once: false,
                    };
                }
                Some(Tok::Plus) => {
                    self.pos += 1;
                    item = Expansion::Repeat {
                        expansion: Box::new(item),
                        at_least_once: true,
                    };
                }
                _ => return Ok(item),
            }
        }
    }
}

pub(super) fn parse(text: &str) -> Result<Grammar> {
    let tokens = lex(text)?;
    let mut parser = Parser { tokens, pos: 0 };
    parser.grammar()
}
