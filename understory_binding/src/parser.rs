// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Path syntax.
//!
//! ```text
//! path     := '!'* [ head ( '.' member | indexer )* ]
//! head     := member | indexer
//! member   := ident [ '(' ')' ]
//! indexer  := '[' arg ( ',' arg )* ']'
//! ```
//!
//! Whitespace between tokens is insignificant. An empty path (or one made of
//! negations only) binds to the root itself. Indexer arguments that parse as
//! `i64` become [`Value::Int`]; anything else is passed as a string.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::iter::Peekable;
use core::str::CharIndices;

use smallvec::SmallVec;
use thiserror::Error;
use understory_property::Value;

/// Indexer arguments.
pub type IndexArgs = SmallVec<[Value; 2]>;

/// One parsed segment of a path.
#[derive(Clone, Debug, PartialEq)]
pub enum PathSegment {
    /// Logical negation of the path's result.
    Not,
    /// Member access by name.
    Member(String),
    /// Indexed element access.
    Index(IndexArgs),
    /// Zero-argument method call.
    Method(String),
}

impl PathSegment {
    /// Returns `true` for [`PathSegment::Not`].
    #[must_use]
    pub fn is_not(&self) -> bool {
        matches!(self, Self::Not)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Not => f.write_str("!"),
            Self::Member(name) => f.write_str(name),
            Self::Method(name) => write!(f, "{name}()"),
            Self::Index(args) => {
                f.write_str("[")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// A path that could not be parsed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PathParseError {
    /// A character that cannot appear at this position.
    #[error("unexpected '{ch}' at position {position}")]
    UnexpectedChar {
        /// The offending character.
        ch: char,
        /// Byte offset into the path.
        position: usize,
    },
    /// The path ended where more input was required.
    #[error("unexpected end of path")]
    UnexpectedEnd,
    /// An indexer argument was empty.
    #[error("empty indexer argument at position {position}")]
    EmptyIndexArg {
        /// Byte offset into the path.
        position: usize,
    },
}

struct Cursor<'a> {
    path: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Cursor<'a> {
    fn new(path: &'a str) -> Self {
        Self {
            path,
            chars: path.char_indices().peekable(),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
    }

    /// Peeks at the next significant character.
    fn peek(&mut self) -> Option<(usize, char)> {
        self.skip_whitespace();
        self.chars.peek().copied()
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_whitespace();
        self.chars.next_if(|(_, c)| *c == expected).is_some()
    }

    fn expect(&mut self, expected: char) -> Result<(), PathParseError> {
        match self.peek() {
            Some((_, c)) if c == expected => {
                self.chars.next();
                Ok(())
            }
            Some((position, ch)) => Err(PathParseError::UnexpectedChar { ch, position }),
            None => Err(PathParseError::UnexpectedEnd),
        }
    }

    fn ident(&mut self) -> Result<&'a str, PathParseError> {
        let start = match self.peek() {
            Some((start, c)) if c.is_alphabetic() || c == '_' => start,
            Some((position, ch)) => return Err(PathParseError::UnexpectedChar { ch, position }),
            None => return Err(PathParseError::UnexpectedEnd),
        };
        let mut end = start;
        while let Some((i, c)) = self.chars.next_if(|(_, c)| c.is_alphanumeric() || *c == '_') {
            end = i + c.len_utf8();
        }
        Ok(&self.path[start..end])
    }

    fn indexer(&mut self) -> Result<IndexArgs, PathParseError> {
        self.expect('[')?;
        let mut args = IndexArgs::new();
        loop {
            self.skip_whitespace();
            let start = self.chars.peek().map_or(self.path.len(), |(i, _)| *i);
            let mut end = start;
            while let Some((i, c)) = self.chars.next_if(|(_, c)| *c != ',' && *c != ']') {
                end = i + c.len_utf8();
            }
            let raw = self.path[start..end].trim();
            if raw.is_empty() {
                return match self.chars.peek() {
                    Some(_) => Err(PathParseError::EmptyIndexArg { position: start }),
                    None => Err(PathParseError::UnexpectedEnd),
                };
            }
            args.push(match raw.parse::<i64>() {
                Ok(i) => Value::Int(i),
                Err(_) => Value::String(Rc::from(raw)),
            });
            match self.chars.next() {
                Some((_, ',')) => {}
                Some((_, ']')) => return Ok(args),
                _ => return Err(PathParseError::UnexpectedEnd),
            }
        }
    }

    fn member(&mut self, segments: &mut Vec<PathSegment>) -> Result<(), PathParseError> {
        let name = String::from(self.ident()?);
        if self.eat('(') {
            self.expect(')')?;
            segments.push(PathSegment::Method(name));
        } else {
            segments.push(PathSegment::Member(name));
        }
        Ok(())
    }
}

/// Parses a path into segments.
///
/// # Example
///
/// ```rust
/// use understory_binding::{PathSegment, parse_path};
/// use understory_property::Value;
///
/// let segments = parse_path("!Items[0].IsEmpty()").unwrap();
/// assert_eq!(
///     segments,
///     [
///         PathSegment::Not,
///         PathSegment::Member("Items".into()),
///         PathSegment::Index([Value::Int(0)].into_iter().collect()),
///         PathSegment::Method("IsEmpty".into()),
///     ]
/// );
/// ```
pub fn parse_path(path: &str) -> Result<Vec<PathSegment>, PathParseError> {
    let mut cursor = Cursor::new(path);
    let mut segments = Vec::new();

    while cursor.eat('!') {
        segments.push(PathSegment::Not);
    }

    match cursor.peek() {
        None => return Ok(segments),
        Some((_, '[')) => segments.push(PathSegment::Index(cursor.indexer()?)),
        Some(_) => cursor.member(&mut segments)?,
    }

    while let Some((position, ch)) = cursor.peek() {
        match ch {
            '.' => {
                cursor.chars.next();
                cursor.member(&mut segments)?;
            }
            '[' => segments.push(PathSegment::Index(cursor.indexer()?)),
            _ => return Err(PathParseError::UnexpectedChar { ch, position }),
        }
    }

    Ok(segments)
}
