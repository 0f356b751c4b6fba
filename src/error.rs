use std::fmt;

use thiserror::Error;

use crate::token::{Position, TokenKind};

/// A syntax error recorded while parsing one statement.
///
/// The parser keeps going after recording one of these, so a single parse can
/// produce several.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("{position}: expected next token to be {expected}, got {found} ({literal:?}) instead")]
    UnexpectedToken {
        expected: TokenKind,
        found: TokenKind,
        literal: String,
        position: Position,
    },

    #[error("{position}: no prefix parse function for {kind} ({literal:?}) found")]
    NoPrefixParseFn {
        kind: TokenKind,
        literal: String,
        position: Position,
    },

    #[error("{position}: expression nested too deeply (limit is {limit})")]
    NestingTooDeep { limit: usize, position: Position },

    #[error("{position}: could not parse {literal:?} as integer")]
    InvalidInteger { literal: String, position: Position },
}

impl ParseError {
    pub fn position(&self) -> Position {
        match self {
            Self::UnexpectedToken { position, .. }
            | Self::NoPrefixParseFn { position, .. }
            | Self::NestingTooDeep { position, .. }
            | Self::InvalidInteger { position, .. } => *position,
        }
    }
}

/// Every error from one parse, reported together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseErrors(pub Vec<ParseError>);

impl std::error::Error for ParseErrors {}

impl fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parser has {} error(s)", self.0.len())?;
        for error in &self.0 {
            write!(f, "\n\t{error}")?;
        }
        Ok(())
    }
}
