pub mod ast;
pub mod diagnostic;
pub mod error;
pub mod format;
pub mod lex;
pub mod parse;
pub mod token;

use ast::Source;
use diagnostic::Diagnostic;
use lex::Lexer;
use log::trace;
use parse::Parser;

/// Lex and parse `source` in one go. The tree is returned even when errors
/// were found, with the broken statements replaced by error placeholders.
pub fn parse_source(source: &str) -> (Source, Vec<Diagnostic>) {
    trace!("Lexing {source}");
    let (tokens, mut errors) = Lexer::new(source).lex_all_sanitised();
    trace!("Parsing {} tokens", tokens.len());
    let (root, parse_errors) = Parser::new(&tokens).parse_all();
    errors.extend(parse_errors);
    (root, errors)
}
