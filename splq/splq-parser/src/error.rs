use std::fmt::Display;

use chumsky::error::SimpleReason;

use crate::lexer::lr::TokenKind;
use crate::parser::perror::PError;
use crate::span::Span;

/// A lex or parse diagnostic. Diagnostics never abort the walk; they are
/// accumulated and surfaced next to whatever partial tree was produced.
#[derive(Debug, Clone)]
pub struct Error {
    pub span: Span,
    pub kind: ErrorKind,
}

#[derive(Debug, Clone)]
pub enum ErrorKind {
    Lexer(String),
    Parser(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ErrorKind::Lexer(found) => write!(f, "unexpected {found}"),
            ErrorKind::Parser(msg) => write!(f, "{msg}"),
        }
    }
}

pub(crate) fn convert_lexer_error(source: &str, e: chumsky::error::Cheap<char>) -> Error {
    // Take the failing slice based on chars, not bytes, so we can't just
    // index into the str.
    let found: String = source
        .chars()
        .skip(e.span().start)
        .take(e.span().end.saturating_sub(e.span().start))
        .collect();

    Error {
        span: Span {
            start: e.span().start,
            end: e.span().end,
        },
        kind: ErrorKind::Lexer(if found.is_empty() {
            "end of input".to_string()
        } else {
            format!("`{found}`")
        }),
    }
}

pub(crate) fn convert_parser_error(e: PError) -> Error {
    let mut span = e.span();

    if e.found().is_none() {
        // found end of file
        // fix for span outside of source
        if span.start > 0 && span.end > 0 {
            span.start -= 1;
            span.end -= 1;
        }
    }

    if let SimpleReason::Custom(message) = e.reason() {
        return Error {
            span,
            kind: ErrorKind::Parser(message.clone()),
        };
    }

    fn token_to_string(t: Option<&TokenKind>) -> String {
        t.map(TokenKind::to_string)
            .unwrap_or_else(|| "end of input".to_string())
    }

    let expected: Vec<String> = e
        .expected()
        .map(|t| token_to_string(t.as_ref()))
        .collect();

    let while_parsing = e
        .label()
        .map(|l| format!(" while parsing {l}"))
        .unwrap_or_default();

    if expected.is_empty() || expected.len() > 10 {
        let found = token_to_string(e.found());
        return Error {
            span,
            kind: ErrorKind::Parser(format!("unexpected {found}{while_parsing}")),
        };
    }

    let mut expected = expected;
    expected.sort();

    let expected = match expected.len() {
        1 => expected.remove(0),
        2 => expected.join(" or "),
        _ => {
            let last = expected.pop().unwrap();
            format!("one of {} or {last}", expected.join(", "))
        }
    };

    Error {
        span,
        kind: ErrorKind::Parser(match e.found() {
            Some(found) => format!("expected {expected}, but found {found}{while_parsing}"),
            None => format!("expected {expected}, but didn't find anything before the end"),
        }),
    }
}
