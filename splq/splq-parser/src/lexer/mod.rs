//! Lexer for SPL query text.
//!
//! Whitespace and comments go to a hidden channel (they are consumed
//! between tokens and never surface in the token stream); everything else
//! becomes a [`lr::Token`] with a char-offset span.

pub mod lr;

use chumsky::{error::Cheap, prelude::*};

use lr::{Literal, Token, TokenKind};

/// Lex chars to tokens until the end of the input.
pub fn lexer() -> impl Parser<char, Vec<Token>, Error = Cheap<char>> {
    lex_token()
        .repeated()
        .then_ignore(ignored())
        .then_ignore(end())
}

/// Lex chars to a single token, consuming leading whitespace/comments.
fn lex_token() -> impl Parser<char, Token, Error = Cheap<char>> {
    let control_multi = choice((
        just("!=").to(TokenKind::Ne),
        just("<=").to(TokenKind::Lte),
        just(">=").to(TokenKind::Gte),
    ));

    let control = one_of("=<>()[],|+-/%.:").map(TokenKind::Control);

    let token = choice((control_multi, literal(), word(), control))
        .recover_with(skip_then_retry_until([]).skip_start());

    ignored().ignore_then(token.map_with_span(|kind, span| Token { kind, span }))
}

fn ignored() -> impl Parser<char, (), Error = Cheap<char>> {
    choice((
        filter(|c: &char| c.is_whitespace()).ignored(),
        comment(),
    ))
    .repeated()
    .ignored()
}

/// SPL comments are backtick-fenced: ```` ```like this``` ````.
fn comment() -> impl Parser<char, (), Error = Cheap<char>> {
    just("```").ignore_then(take_until(just("```"))).ignored()
}

/// Word characters are permissive on purpose: SPL field names may start
/// with digits or `_`, and carry `.`, `-`, `:` and wildcards inside
/// (`process.name`, `user-id`, `network:connection:allowed`, `*exe`).
fn is_word_start(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '*' | '?' | '$' | '@')
}

fn is_word_cont(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | ':' | '*' | '?' | '-' | '$' | '@' | '#')
}

fn word() -> impl Parser<char, TokenKind, Error = Cheap<char>> {
    let cont = filter(|c: &char| is_word_cont(*c));

    let plain = filter(|c: &char| is_word_start(*c)).chain(cont.repeated());

    // A leading `-` starts a word only when something follows it (`-24h`,
    // `-field`); a lone `-` stays punctuation (`sort - field`, arithmetic).
    let dashed = just('-').chain(cont.repeated().at_least(1));

    dashed.or(plain).collect::<String>().map(classify_word)
}

fn classify_word(word: String) -> TokenKind {
    let lower = word.to_ascii_lowercase();
    match lower.as_str() {
        "and" | "or" | "not" | "in" | "as" | "by" | "over" => TokenKind::Keyword(lower),
        _ => TokenKind::Ident(word),
    }
}

fn literal() -> impl Parser<char, TokenKind, Error = Cheap<char>> {
    let string = quoted_string('"')
        .or(quoted_string('\''))
        .map(Literal::String);

    number().or(string).map(TokenKind::Literal)
}

fn number() -> impl Parser<char, Literal, Error = Cheap<char>> {
    let digits = || filter(|c: &char| c.is_ascii_digit()).repeated().at_least(1);

    let frac = just('.').chain(digits());
    let exp = one_of("eE").chain::<char, _, _>(one_of("+-").or_not().chain::<char, _, _>(digits()));

    digits()
        .chain::<char, _, _>(frac.or_not().flatten())
        .chain::<char, _, _>(exp.or_not().flatten())
        .collect::<String>()
        // `24h` and `1.2.3` are words, not numbers followed by junk.
        .then_ignore(end_of_word())
        .map(Literal::Number)
}

/// Rewinding boundary check: the next char must not extend a word.
fn end_of_word() -> impl Parser<char, (), Error = Cheap<char>> {
    choice((end(), filter(|c: &char| !is_word_cont(*c)).ignored())).rewind()
}

/// The quoted-string body is kept verbatim: `\"` stays two chars so regex
/// literals (`rex` patterns) survive the round-trip; only the outer quotes
/// are stripped.
fn quoted_string(quote: char) -> impl Parser<char, String, Error = Cheap<char>> {
    let escape = just('\\').chain(any());
    let plain = none_of([quote, '\\']).map(|c| vec![c]);

    escape
        .or(plain)
        .repeated()
        .flatten()
        .collect::<String>()
        .delimited_by(just(quote), just(quote))
}
