//! Lexer representation: the token model produced by [`crate::lexer`].

use serde::{Deserialize, Serialize};

/// A lexed token with its char-offset span in the source.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub span: std::ops::Range<usize>,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum TokenKind {
    /// A bare word: field names, command names, unquoted values, wildcards.
    /// SPL words are permissive; `process.name`, `user-id`, `-24h`, `*` and
    /// `network:connection:allowed` are all single words.
    Ident(String),

    /// One of the reserved connective/clause words, stored lowercased:
    /// `and`, `or`, `not`, `in`, `as`, `by`, `over`.
    /// Command words stay [`TokenKind::Ident`]; the parser resolves them
    /// case-insensitively so `WHERE`/`where` both dispatch.
    Keyword(String),

    Literal(Literal),

    /// Single-char punctuation: `= < > ( ) [ ] , | + - / % .` and friends.
    Control(char),

    Ne,  // !=
    Lte, // <=
    Gte, // >=
}

#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Literal {
    /// Numbers keep their raw spelling; values are surfaced as text and
    /// `999999999999999999999999` must survive unharmed.
    Number(String),

    /// A quoted string with the outer quotes stripped. Escapes are kept
    /// verbatim (`\"` stays two chars) so regex literals round-trip.
    String(String),
}

impl TokenKind {
    pub fn keyword(kw: &str) -> Self {
        TokenKind::Keyword(kw.to_string())
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Ident(s) => {
                if s.is_empty() {
                    // FYI this shows up in errors
                    write!(f, "an identifier")
                } else {
                    write!(f, "`{s}`")
                }
            }
            TokenKind::Keyword(s) => write!(f, "keyword {s}"),
            TokenKind::Literal(Literal::Number(n)) => write!(f, "{n}"),
            TokenKind::Literal(Literal::String(s)) => write!(f, "\"{s}\""),
            TokenKind::Control(c) => write!(f, "{c}"),
            TokenKind::Ne => f.write_str("!="),
            TokenKind::Lte => f.write_str("<="),
            TokenKind::Gte => f.write_str(">="),
        }
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}..{}: {:?}", self.span.start, self.span.end, self.kind)
    }
}

/// Wrapper so token dumps snapshot one-per-line.
pub struct TokenVec(pub Vec<Token>);

impl std::fmt::Debug for TokenVec {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "TokenVec (")?;
        for token in self.0.iter() {
            writeln!(f, "  {:?},", token)?;
        }
        write!(f, ")")
    }
}
