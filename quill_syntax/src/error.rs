use std::fmt::Display;

use crate::{
    diagnostic::{Diagnostic, Stage},
    token::TextRange,
};

#[derive(Debug)]
pub enum ErrorMsg {
    // Lex errors
    UnexpectedChar,
    UnterminatedString,
    UnterminatedComment,
    InvalidEscape,
    InvalidNumber,
    // Parse errors
    ExpectedExpr,
    ExpectedIdent,
    ExpectedBlock,
    InvalidAssignment,
    MissingSemicolon,
    MissingOpeningParen,
    MissingClosingParen,
    MissingClosingBrace,
    MissingClosingBracket,
    UnexpectedClosingBrace,
    TooDeep,
}

impl Display for ErrorMsg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::UnexpectedChar => "unexpected character",
            Self::UnterminatedString => "unterminated string",
            Self::UnterminatedComment => "unterminated block comment",
            Self::InvalidEscape => "invalid escape sequence",
            Self::InvalidNumber => "invalid number literal",
            Self::ExpectedExpr => "expected expression",
            Self::ExpectedIdent => "expected identifier",
            Self::ExpectedBlock => "expected `{`",
            Self::InvalidAssignment => "invalid assignment target",
            Self::MissingSemicolon => "expected `;`",
            Self::MissingOpeningParen => "expected `(`",
            Self::MissingClosingParen => "expected `)`",
            Self::MissingClosingBrace => "expected `}`",
            Self::MissingClosingBracket => "expected `]`",
            Self::UnexpectedClosingBrace => "unmatched `}`",
            Self::TooDeep => "nesting too deep",
        })
    }
}

pub fn lex_error(msg: ErrorMsg, lexeme: &str, range: TextRange) -> Diagnostic {
    let message = if lexeme.is_empty() {
        msg.to_string()
    } else {
        format!("{msg} `{}`", lexeme.escape_debug())
    };
    Diagnostic::error(Stage::Lex, message).with_range(range)
}

pub fn parse_error(msg: ErrorMsg, found: impl Display, range: TextRange) -> Diagnostic {
    Diagnostic::error(Stage::Parse, format!("{msg}, found {found}")).with_range(range)
}
