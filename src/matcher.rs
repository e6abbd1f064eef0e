//! Backtracking matcher.
//!
//! Matching is a recursive search over (node, continuation, position)
//! triples. The continuation is a stack-allocated linked list of the work
//! that remains once the current node has matched: the rest of a
//! concatenation, a pending group-close record, or a pending quantifier
//! repetition. Threading the continuation through every node lets an
//! alternative or quantifier decision deep inside a group be retried
//! against everything that follows the group.

use thiserror::Error;

use crate::ast::Ast;

/// Half-open byte span into the input.
pub(crate) type Span = (usize, usize);

/// Backtracking step budget per search. Exceeding it means the pattern and
/// input combine into a search space we refuse to explore (for example
/// `(a+)+b` against a long run of `a`s).
const MAX_STEPS: usize = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("pattern too complex: backtracking step budget exhausted")]
    TooComplex,
}

static END_ANCHOR: Ast = Ast::EndAnchor;

/// Pending work inside a continuation.
#[derive(Clone, Copy)]
enum Step<'p> {
    /// Match this node next.
    Node(&'p Ast),
    /// Match these nodes next, in order.
    Nodes(&'p [Ast]),
    /// A group that opened at `start` closes here: record its span, undo the
    /// record if the rest of the continuation fails.
    CloseGroup { group: usize, start: usize },
    /// A `+` whose previous iteration began at `entry`: greedily try another
    /// iteration before letting the rest of the continuation run.
    Repeat { node: &'p Ast, entry: usize },
}

#[derive(Clone, Copy)]
struct Cont<'p, 'c> {
    step: Step<'p>,
    rest: Option<&'c Cont<'p, 'c>>,
}

pub(crate) struct Matcher<'i> {
    input: &'i [u8],
    captures: Vec<Option<Span>>,
    steps: usize,
    gave_up: bool,
}

impl<'i> Matcher<'i> {
    pub(crate) fn new(input: &'i [u8], group_count: usize) -> Self {
        Self {
            input,
            // +1 because groups are 1-indexed; slot 0 is the whole match.
            captures: vec![None; group_count + 1],
            steps: 0,
            gave_up: false,
        }
    }

    /// Clear captures for a fresh attempt. The step budget is intentionally
    /// not reset: it covers the whole search, not one start offset.
    pub(crate) fn reset(&mut self) {
        for capture in &mut self.captures {
            *capture = None;
        }
    }

    pub(crate) fn gave_up(&self) -> bool {
        self.gave_up
    }

    pub(crate) fn spans(&self) -> &[Option<Span>] {
        &self.captures
    }

    /// Try to match `ast` with the attempt pinned at `start`. Returns the end
    /// position of the first match in preference order, if any.
    pub(crate) fn find_at(&mut self, ast: &Ast, anchored_end: bool, start: usize) -> Option<usize> {
        if anchored_end {
            let tail = Cont {
                step: Step::Node(&END_ANCHOR),
                rest: None,
            };
            self.exec(ast, Some(&tail), start)
        } else {
            self.exec(ast, None, start)
        }
    }

    /// Match one node at `pos`, then run the continuation. `None` means this
    /// whole line of attack failed and the caller should try its next
    /// alternative.
    fn exec<'p, 'c>(
        &mut self,
        node: &'p Ast,
        cont: Option<&'c Cont<'p, 'c>>,
        pos: usize,
    ) -> Option<usize> {
        if self.gave_up {
            return None;
        }
        self.steps += 1;
        if self.steps > MAX_STEPS {
            self.gave_up = true;
            return None;
        }

        match node {
            Ast::Empty => self.resume(cont, pos),
            Ast::Literal(byte) => {
                if self.input.get(pos) == Some(byte) {
                    self.resume(cont, pos + 1)
                } else {
                    None
                }
            }
            Ast::AnyByte => {
                if pos < self.input.len() {
                    self.resume(cont, pos + 1)
                } else {
                    None
                }
            }
            Ast::Digit => self.match_byte(cont, pos, |b| b.is_ascii_digit()),
            Ast::Word => self.match_byte(cont, pos, |b| b.is_ascii_alphanumeric() || b == b'_'),
            Ast::Class { negated, members } => {
                self.match_byte(cont, pos, |b| members.contains(&b) != *negated)
            }
            Ast::StartAnchor => {
                if pos == 0 {
                    self.resume(cont, pos)
                } else {
                    None
                }
            }
            Ast::EndAnchor => {
                if pos == self.input.len() {
                    self.resume(cont, pos)
                } else {
                    None
                }
            }
            Ast::Concat(children) => self.step(Step::Nodes(children), cont, pos),
            Ast::Alternation(left, right) => {
                let snapshot = self.captures.clone();
                if let Some(end) = self.exec(left, cont, pos) {
                    return Some(end);
                }
                self.captures = snapshot;
                self.exec(right, cont, pos)
            }
            Ast::ZeroOrOne(inner) => {
                let snapshot = self.captures.clone();
                if let Some(end) = self.exec(inner, cont, pos) {
                    return Some(end);
                }
                self.captures = snapshot;
                self.resume(cont, pos)
            }
            Ast::OneOrMore(inner) => {
                let repeat = Cont {
                    step: Step::Repeat { node: inner, entry: pos },
                    rest: cont,
                };
                self.exec(inner, Some(&repeat), pos)
            }
            Ast::Group(group, inner) => {
                let close = Cont {
                    step: Step::CloseGroup { group: *group, start: pos },
                    rest: cont,
                };
                self.exec(inner, Some(&close), pos)
            }
            Ast::BackRef(group) => {
                let (start, end) = self.captures.get(*group).copied().flatten()?;
                let input = self.input;
                let captured = &input[start..end];
                if input[pos..].starts_with(captured) {
                    self.resume(cont, pos + captured.len())
                } else {
                    None
                }
            }
        }
    }

    /// Run the continuation from `pos`. An exhausted continuation is a match.
    fn resume<'p, 'c>(&mut self, cont: Option<&'c Cont<'p, 'c>>, pos: usize) -> Option<usize> {
        match cont {
            None => Some(pos),
            Some(next) => self.step(next.step, next.rest, pos),
        }
    }

    fn step<'p, 'c>(
        &mut self,
        step: Step<'p>,
        rest: Option<&'c Cont<'p, 'c>>,
        pos: usize,
    ) -> Option<usize> {
        match step {
            Step::Node(node) => self.exec(node, rest, pos),
            Step::Nodes(nodes) => match nodes.split_first() {
                None => self.resume(rest, pos),
                Some((head, tail)) => {
                    let next = Cont {
                        step: Step::Nodes(tail),
                        rest,
                    };
                    self.exec(head, Some(&next), pos)
                }
            },
            Step::CloseGroup { group, start } => {
                let prior = self.captures[group];
                self.captures[group] = Some((start, pos));
                match self.resume(rest, pos) {
                    Some(end) => Some(end),
                    None => {
                        self.captures[group] = prior;
                        None
                    }
                }
            }
            Step::Repeat { node, entry } => {
                // A zero-width iteration must not repeat, or `()+` would
                // never terminate.
                if pos == entry {
                    return self.resume(rest, pos);
                }
                let snapshot = self.captures.clone();
                let again = Cont {
                    step: Step::Repeat { node, entry: pos },
                    rest,
                };
                if let Some(end) = self.exec(node, Some(&again), pos) {
                    return Some(end);
                }
                self.captures = snapshot;
                self.resume(rest, pos)
            }
        }
    }

    fn match_byte<'p, 'c>(
        &mut self,
        cont: Option<&'c Cont<'p, 'c>>,
        pos: usize,
        test: impl Fn(u8) -> bool,
    ) -> Option<usize> {
        match self.input.get(pos) {
            Some(&byte) if test(byte) => self.resume(cont, pos + 1),
            _ => None,
        }
    }
}
