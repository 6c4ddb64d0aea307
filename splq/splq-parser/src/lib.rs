//! Lexing and parsing for SPL pipelined search queries.
//!
//! This crate turns query text into a [`ast::Query`] parse tree. It knows
//! nothing about condition extraction; that lives in the `splq` crate.
//!
//! Both layers accumulate diagnostics instead of failing fast: a partial
//! tree alongside a non-empty error list is a normal outcome for
//! malformed input.

pub mod error;
pub mod lexer;
mod parser;
pub mod span;

pub use error::Error;
pub use parser::ast;
pub use span::{slice_chars, Span};

/// Build a parse tree from query text.
///
/// Lex errors, parse errors, and the tree (when one could be recovered)
/// are all returned; `None` means the input was beyond recovery.
pub fn parse_query(source: &str) -> (Option<ast::Query>, Vec<Error>) {
    let mut errors = Vec::new();

    let (tokens, lex_errors) = chumsky::Parser::parse_recovery(&lexer::lexer(), source);

    errors.extend(
        lex_errors
            .into_iter()
            .map(|e| error::convert_lexer_error(source, e)),
    );

    let tree = if let Some(tokens) = tokens {
        let (tree, parse_errors) = parser::parse_tokens(tokens, source.chars().count());
        errors.extend(parse_errors);
        tree
    } else {
        None
    };

    (tree, errors)
}

/// Lex query text to tokens; mainly useful for tests and tooling.
pub fn lex_source(source: &str) -> (Option<Vec<lexer::lr::Token>>, Vec<Error>) {
    let (tokens, lex_errors) = chumsky::Parser::parse_recovery(&lexer::lexer(), source);
    let errors = lex_errors
        .into_iter()
        .map(|e| error::convert_lexer_error(source, e))
        .collect();
    (tokens, errors)
}
