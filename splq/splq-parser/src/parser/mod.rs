pub mod ast;
mod expr;
pub(crate) mod perror;
mod stage;

use chumsky::{prelude::*, Stream};

use crate::error::{convert_parser_error, Error};
use crate::lexer::lr::{Literal, Token, TokenKind};
use crate::span::Span;
use ast::{NamedArg, SearchValue};
use perror::PError;

/// Parse a lexed token stream into a [`ast::Query`].
///
/// Parsing continues past recoverable errors; a partial tree plus the
/// accumulated diagnostics is the normal outcome for malformed input.
pub(crate) fn parse_tokens(
    tokens: Vec<Token>,
    source_chars: usize,
) -> (Option<ast::Query>, Vec<Error>) {
    let stream = prepare_stream(tokens, source_chars);
    let (tree, parse_errors) = stage::query_root().parse_recovery(stream);

    let errors: Vec<_> = parse_errors
        .into_iter()
        .map(convert_parser_error)
        .collect();
    log::debug!("parse errors: {errors:?}");

    (tree, errors)
}

fn prepare_stream(
    tokens: Vec<Token>,
    source_chars: usize,
) -> Stream<'static, TokenKind, Span, impl Iterator<Item = (TokenKind, Span)>> {
    let eoi = Span {
        start: source_chars,
        end: source_chars + 1,
    };
    let iter = tokens.into_iter().map(|t| {
        (
            t.kind,
            Span {
                start: t.span.start,
                end: t.span.end,
            },
        )
    });
    Stream::from_iter(eoi, iter)
}

pub(crate) fn ident_part() -> impl Parser<TokenKind, String, Error = PError> + Clone {
    select! { TokenKind::Ident(ident) => ident }.map_err(|e: PError| {
        PError::expected_input_found(
            e.span(),
            [Some(TokenKind::Ident("".to_string()))],
            e.found().cloned(),
        )
    })
}

/// A field name position: a purely numeric left-hand side is still a valid
/// field, so `3=3` compares the field `3` against the value `3`.
pub(crate) fn field_name() -> impl Parser<TokenKind, String, Error = PError> + Clone {
    select! {
        TokenKind::Ident(ident) => ident,
        TokenKind::Literal(Literal::Number(n)) => n,
    }
}

pub(crate) fn keyword(kw: &'static str) -> impl Parser<TokenKind, (), Error = PError> + Clone {
    just(TokenKind::Keyword(kw.to_string())).ignored()
}

pub(crate) fn ctrl(char: char) -> impl Parser<TokenKind, (), Error = PError> + Clone {
    just(TokenKind::Control(char)).ignored()
}

/// A command word, matched case-insensitively (`WHERE`, `Stats`, …).
pub(crate) fn cmd(name: &'static str) -> impl Parser<TokenKind, String, Error = PError> + Clone {
    filter_map(move |span, t| match t {
        TokenKind::Ident(s) if s.eq_ignore_ascii_case(name) => Ok(s.to_ascii_lowercase()),
        t => Err(PError::expected_input_found(
            span,
            [Some(TokenKind::Ident(name.to_string()))],
            Some(t),
        )),
    })
}

/// One of several command words, yielding the lowercased match.
pub(crate) fn cmd_one_of(
    names: &'static [&'static str],
) -> impl Parser<TokenKind, String, Error = PError> + Clone {
    filter_map(move |span, t| match t {
        TokenKind::Ident(s) if names.iter().any(|n| s.eq_ignore_ascii_case(n)) => {
            Ok(s.to_ascii_lowercase())
        }
        t => Err(PError::expected_input_found(
            span,
            [Some(TokenKind::Ident(names[0].to_string()))],
            Some(t),
        )),
    })
}

/// A value in search/option position: bare word, number, or quoted string
/// (outer quotes stripped).
pub(crate) fn search_value() -> impl Parser<TokenKind, SearchValue, Error = PError> + Clone {
    select! {
        TokenKind::Ident(text) => SearchValue { text, quoted: false },
        TokenKind::Literal(Literal::Number(text)) => SearchValue { text, quoted: false },
        TokenKind::Literal(Literal::String(text)) => SearchValue { text, quoted: true },
    }
}

/// A recognized `name=value` option pair (`type=left`, `span=1h`,
/// `summariesonly=t`).
pub(crate) fn named_arg() -> impl Parser<TokenKind, NamedArg, Error = PError> + Clone {
    field_name()
        .then_ignore(ctrl('='))
        .then(search_value())
        .map(|(name, value)| NamedArg {
            name,
            value: value.text,
        })
}
