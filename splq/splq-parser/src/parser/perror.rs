use chumsky::error::Simple;

use crate::lexer::lr::TokenKind;
use crate::span::Span;

pub type PError = Simple<TokenKind, Span>;
