use nom::{
    branch::alt,
    character::complete::{anychar, char, none_of},
    combinator::{map, opt, value},
    multi::{many0, many1},
    sequence::preceded,
    IResult,
};
use std::cell::RefCell;
use std::collections::HashSet;
use thiserror::Error;

use crate::ast::Ast;
use crate::Regex;

/// Why a pattern failed to compile. Every variant carries the byte offset
/// into the pattern at which parsing stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("unexpected character {ch:?} at byte {pos}")]
    UnexpectedChar { ch: char, pos: usize },
    #[error("unexpected end of pattern at byte {pos}")]
    UnexpectedEnd { pos: usize },
    #[error("unmatched ')' at byte {pos}")]
    UnmatchedParen { pos: usize },
    #[error("unclosed group at byte {pos}")]
    UnclosedGroup { pos: usize },
    #[error("unterminated character class at byte {pos}")]
    UnclosedClass { pos: usize },
    #[error("empty character class at byte {pos}")]
    EmptyClass { pos: usize },
    #[error("dangling escape at byte {pos}")]
    DanglingEscape { pos: usize },
    #[error("quantifier with no operand at byte {pos}")]
    DanglingQuantifier { pos: usize },
    #[error("invalid back-reference \\{index} at byte {pos}")]
    InvalidBackref { index: usize, pos: usize },
}

impl PatternError {
    /// Byte offset into the pattern at which the error was detected.
    pub fn position(&self) -> usize {
        match *self {
            PatternError::UnexpectedChar { pos, .. }
            | PatternError::UnexpectedEnd { pos }
            | PatternError::UnmatchedParen { pos }
            | PatternError::UnclosedGroup { pos }
            | PatternError::UnclosedClass { pos }
            | PatternError::EmptyClass { pos }
            | PatternError::DanglingEscape { pos }
            | PatternError::DanglingQuantifier { pos }
            | PatternError::InvalidBackref { pos, .. } => pos,
        }
    }
}

struct ParseContext {
    pattern_len: usize,
    group_counter: RefCell<usize>,
    // Groups whose ')' has been consumed; only these are valid back-reference
    // targets ((\1) is rejected, (a)\1 is fine).
    closed_groups: RefCell<Vec<usize>>,
    diagnostic: RefCell<Option<PatternError>>,
}

impl ParseContext {
    fn new(pattern: &str) -> Self {
        Self {
            pattern_len: pattern.len(),
            group_counter: RefCell::new(0),
            closed_groups: RefCell::new(Vec::new()),
            diagnostic: RefCell::new(None),
        }
    }

    fn next_group_number(&self) -> usize {
        let mut counter = self.group_counter.borrow_mut();
        *counter += 1;
        *counter
    }

    fn group_count(&self) -> usize {
        *self.group_counter.borrow()
    }

    fn mark_closed(&self, index: usize) {
        self.closed_groups.borrow_mut().push(index);
    }

    fn backref_target_ok(&self, index: usize) -> bool {
        self.closed_groups.borrow().contains(&index)
    }

    /// Record a diagnostic at the position `remaining` starts at and return a
    /// non-recoverable nom failure. The first diagnostic recorded wins.
    fn fail<'a>(
        &self,
        remaining: &'a str,
        make: impl FnOnce(usize) -> PatternError,
    ) -> nom::Err<nom::error::Error<&'a str>> {
        let pos = self.pattern_len - remaining.len();
        let mut diagnostic = self.diagnostic.borrow_mut();
        if diagnostic.is_none() {
            *diagnostic = Some(make(pos));
        }
        nom::Err::Failure(nom::error::Error::new(
            remaining,
            nom::error::ErrorKind::Fail,
        ))
    }

    fn take_diagnostic(&self) -> Option<PatternError> {
        self.diagnostic.borrow_mut().take()
    }
}

/// Compile a pattern string into a [`Regex`].
pub fn parse(pattern: &str) -> Result<Regex, PatternError> {
    let context = ParseContext::new(pattern);
    match regex(pattern, &context) {
        Ok(("", ast)) => {
            let (ast, start_anchored, end_anchored) = extract_anchors(ast);
            Ok(Regex {
                ast,
                group_count: context.group_count(),
                start_anchored,
                end_anchored,
            })
        }
        Ok((remaining, _)) => Err(context
            .take_diagnostic()
            .unwrap_or_else(|| trailing_error(pattern, remaining))),
        Err(err) => {
            if let Some(diagnostic) = context.take_diagnostic() {
                return Err(diagnostic);
            }
            let remaining = match &err {
                nom::Err::Error(e) | nom::Err::Failure(e) => e.input,
                nom::Err::Incomplete(_) => "",
            };
            Err(trailing_error(pattern, remaining))
        }
    }
}

/// Classify leftover input the grammar could not consume.
fn trailing_error(pattern: &str, remaining: &str) -> PatternError {
    let pos = pattern.len() - remaining.len();
    match remaining.chars().next() {
        Some(')') => PatternError::UnmatchedParen { pos },
        Some('+') | Some('?') => PatternError::DanglingQuantifier { pos },
        Some(ch) => PatternError::UnexpectedChar { ch, pos },
        None => PatternError::UnexpectedEnd { pos },
    }
}

/// Split a leading `^` and a trailing `$` at the top level of the pattern off
/// into anchored flags. Anchors anywhere else stay in the tree as zero-width
/// nodes; both representations match identically, but the flags let the
/// search loop skip non-zero start offsets.
fn extract_anchors(ast: Ast) -> (Ast, bool, bool) {
    match ast {
        Ast::StartAnchor => (Ast::Empty, true, false),
        Ast::EndAnchor => (Ast::Empty, false, true),
        Ast::Concat(mut children) => {
            let start_anchored = matches!(children.first(), Some(Ast::StartAnchor));
            if start_anchored {
                children.remove(0);
            }
            let end_anchored = matches!(children.last(), Some(Ast::EndAnchor));
            if end_anchored {
                children.pop();
            }
            let ast = match children.len() {
                0 => Ast::Empty,
                1 => children.into_iter().next().unwrap(),
                _ => Ast::Concat(children),
            };
            (ast, start_anchored, end_anchored)
        }
        other => (other, false, false),
    }
}

fn regex<'a>(input: &'a str, context: &ParseContext) -> IResult<&'a str, Ast> {
    alternation(input, context)
}

fn alternation<'a>(input: &'a str, context: &ParseContext) -> IResult<&'a str, Ast> {
    let (input, first) = sequence(input, context)?;
    let (input, mut rest) = many0(preceded(char('|'), |i| sequence(i, context)))(input)?;

    let result = match rest.pop() {
        None => first,
        Some(last) => {
            let mut node = last;
            for branch in rest.into_iter().rev() {
                node = Ast::Alternation(Box::new(branch), Box::new(node));
            }
            Ast::Alternation(Box::new(first), Box::new(node))
        }
    };

    Ok((input, result))
}

fn sequence<'a>(input: &'a str, context: &ParseContext) -> IResult<&'a str, Ast> {
    let (input, parts) = many0(|i| quantified(i, context))(input)?;

    let result = if parts.is_empty() {
        Ast::Empty
    } else if parts.len() == 1 {
        parts.into_iter().next().unwrap()
    } else {
        Ast::Concat(parts)
    };

    Ok((input, result))
}

fn quantified<'a>(input: &'a str, context: &ParseContext) -> IResult<&'a str, Ast> {
    let (input, base) = atom(input, context)?;
    let (input, quantifier) = opt(alt((char('+'), char('?'))))(input)?;

    let result = match quantifier {
        Some('+') => Ast::OneOrMore(Box::new(base)),
        Some('?') => Ast::ZeroOrOne(Box::new(base)),
        _ => base,
    };

    Ok((input, result))
}

fn atom<'a>(input: &'a str, context: &ParseContext) -> IResult<&'a str, Ast> {
    alt((
        anchor,
        dot,
        |i| char_class(i, context),
        |i| escaped_char(i, context),
        |i| grouped(i, context),
        literal_char,
    ))(input)
}

fn anchor(input: &str) -> IResult<&str, Ast> {
    alt((
        value(Ast::StartAnchor, char('^')),
        value(Ast::EndAnchor, char('$')),
    ))(input)
}

fn dot(input: &str) -> IResult<&str, Ast> {
    value(Ast::AnyByte, char('.'))(input)
}

#[derive(Clone)]
enum ClassItem {
    Char(char),
    Digits,    // \d inside a class
    WordChars, // \w inside a class
}

fn char_class<'a>(input: &'a str, context: &ParseContext) -> IResult<&'a str, Ast> {
    let (input, _) = char('[')(input)?;
    let (input, negated) = opt(char('^'))(input)?;
    let (input, items) = many1(class_item)(input).map_err(|_| {
        if input.is_empty() {
            context.fail(input, |pos| PatternError::UnclosedClass { pos })
        } else {
            context.fail(input, |pos| PatternError::EmptyClass { pos })
        }
    })?;
    let (input, _) = char(']')(input).map_err(|_: nom::Err<nom::error::Error<&str>>| {
        context.fail(input, |pos| PatternError::UnclosedClass { pos })
    })?;

    let mut members = HashSet::new();
    for item in items {
        match item {
            ClassItem::Char(c) => {
                let mut buf = [0u8; 4];
                members.extend(c.encode_utf8(&mut buf).as_bytes());
            }
            ClassItem::Digits => members.extend(b'0'..=b'9'),
            ClassItem::WordChars => {
                members.extend(b'0'..=b'9');
                members.extend(b'a'..=b'z');
                members.extend(b'A'..=b'Z');
                members.insert(b'_');
            }
        }
    }

    Ok((
        input,
        Ast::Class {
            negated: negated.is_some(),
            members,
        },
    ))
}

fn class_item(input: &str) -> IResult<&str, ClassItem> {
    alt((
        map(preceded(char('\\'), anychar), |c| match c {
            'd' => ClassItem::Digits,
            'w' => ClassItem::WordChars,
            c => ClassItem::Char(c),
        }),
        map(none_of("]"), ClassItem::Char),
    ))(input)
}

fn escaped_char<'a>(input: &'a str, context: &ParseContext) -> IResult<&'a str, Ast> {
    let start = input;
    let (input, _) = char('\\')(input)?;
    let (input, ch) = anychar(input).map_err(|_: nom::Err<nom::error::Error<&str>>| {
        context.fail(start, |pos| PatternError::DanglingEscape { pos })
    })?;

    let result = match ch {
        'd' => Ast::Digit,
        'w' => Ast::Word,
        '1'..='9' => {
            let index = ch.to_digit(10).unwrap() as usize;
            if !context.backref_target_ok(index) {
                return Err(context.fail(start, |pos| PatternError::InvalidBackref { index, pos }));
            }
            Ast::BackRef(index)
        }
        c => literal_ast(c),
    };

    Ok((input, result))
}

fn grouped<'a>(input: &'a str, context: &ParseContext) -> IResult<&'a str, Ast> {
    let (input, _) = char('(')(input)?;
    let group_number = context.next_group_number();
    let (input, inner) = regex(input, context)?;
    let (input, _) = char(')')(input)
        .map_err(|_: nom::Err<nom::error::Error<&str>>| close_paren_error(input, context))?;
    context.mark_closed(group_number);
    Ok((input, Ast::Group(group_number, Box::new(inner))))
}

fn close_paren_error<'a>(
    remaining: &'a str,
    context: &ParseContext,
) -> nom::Err<nom::error::Error<&'a str>> {
    match remaining.chars().next() {
        Some('+') | Some('?') => {
            context.fail(remaining, |pos| PatternError::DanglingQuantifier { pos })
        }
        _ => context.fail(remaining, |pos| PatternError::UnclosedGroup { pos }),
    }
}

fn literal_char(input: &str) -> IResult<&str, Ast> {
    map(none_of("^$.+?()[|\\"), literal_ast)(input)
}

/// A literal character as AST nodes: one `Literal` per byte of its UTF-8
/// encoding, so a quantifier on a multi-byte character repeats the whole
/// character.
fn literal_ast(c: char) -> Ast {
    let mut buf = [0u8; 4];
    let bytes = c.encode_utf8(&mut buf).as_bytes();
    match bytes {
        [b] => Ast::Literal(*b),
        _ => Ast::Concat(bytes.iter().map(|&b| Ast::Literal(b)).collect()),
    }
}
