//! A grep-style search tool built around a small backtracking
//! regular-expression engine.
//!
//! Patterns are compiled to an AST once and matched against byte strings.
//! Groups capture, back-references compare against what a group captured,
//! and quantifiers are greedy with backtracking.
//!
//! # Pattern syntax
//!
//! | Syntax     | Meaning                                    |
//! |------------|--------------------------------------------|
//! | `a`        | Literal byte                               |
//! | `.`        | Any single byte                            |
//! | `[abc]`    | Any listed byte                            |
//! | `[^abc]`   | Any byte except those listed               |
//! | `\d`       | ASCII digit                                |
//! | `\w`       | ASCII letter, digit, or `_`                |
//! | `\.`       | Literal metacharacter                      |
//! | `(…)`      | Capturing group                            |
//! | `a\|b`     | Alternation, left branch preferred         |
//! | `x+`       | One or more, greedy                        |
//! | `x?`       | Zero or one, prefers one                   |
//! | `^` / `$`  | Start / end of input                       |
//! | `\1`–`\9`  | Back-reference to an earlier closed group  |
//!
//! Not supported (kept deliberately small): `*`, `{m,n}`, ranges like
//! `a-z` inside classes, lookaround, and case folding. `*`, `]`, and `-`
//! are ordinary literals.
//!
//! ```
//! let regex = tinygrep::compile("(cat) and \\1").unwrap();
//! assert!(regex.is_match(b"cat and cat").unwrap());
//! ```

pub mod ast;
pub mod matcher;
pub mod parser;

pub use matcher::MatchError;
pub use parser::PatternError;

use ast::Ast;
use matcher::{Matcher, Span};

/// Compile `pattern` into a reusable [`Regex`].
pub fn compile(pattern: &str) -> Result<Regex, PatternError> {
    parser::parse(pattern)
}

/// A compiled pattern. Immutable once built; matching against different
/// inputs from different threads only needs `&Regex`.
#[derive(Debug, Clone)]
pub struct Regex {
    pub(crate) ast: Ast,
    pub(crate) group_count: usize,
    pub(crate) start_anchored: bool,
    pub(crate) end_anchored: bool,
}

impl Regex {
    /// Does any substring of `input` match?
    pub fn is_match(&self, input: &[u8]) -> Result<bool, MatchError> {
        Ok(self.captures(input)?.is_some())
    }

    /// Find the first match in preference order and report its capture
    /// spans. Group 0 is the whole match.
    pub fn captures<'i>(&self, input: &'i [u8]) -> Result<Option<Captures<'i>>, MatchError> {
        let mut matcher = Matcher::new(input, self.group_count);
        // The input length is a legal start offset: empty-matching patterns
        // can match there.
        let last_start = if self.start_anchored { 0 } else { input.len() };
        for start in 0..=last_start {
            matcher.reset();
            if let Some(end) = matcher.find_at(&self.ast, self.end_anchored, start) {
                let mut spans = matcher.spans().to_vec();
                spans[0] = Some((start, end));
                return Ok(Some(Captures { input, spans }));
            }
            if matcher.gave_up() {
                return Err(MatchError::TooComplex);
            }
        }
        Ok(None)
    }

    /// Number of capturing groups in the pattern.
    pub fn group_count(&self) -> usize {
        self.group_count
    }
}

/// Capture spans of one successful match.
pub struct Captures<'i> {
    input: &'i [u8],
    spans: Vec<Option<Span>>,
}

impl<'i> Captures<'i> {
    /// The bytes captured by group `index`, or `None` if the group did not
    /// participate in the match. Group 0 is the whole match.
    pub fn get(&self, index: usize) -> Option<&'i [u8]> {
        let (start, end) = self.span(index)?;
        Some(&self.input[start..end])
    }

    /// The byte span captured by group `index`.
    pub fn span(&self, index: usize) -> Option<(usize, usize)> {
        self.spans.get(index).copied().flatten()
    }

    /// Number of capturing groups (excluding group 0).
    pub fn group_count(&self) -> usize {
        self.spans.len() - 1
    }
}
