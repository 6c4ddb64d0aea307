use std::fmt::{self, Debug, Formatter};
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// A range of character offsets into the query text.
///
/// Offsets count `char`s, not bytes, because the lexer consumes a `char`
/// stream; slicing the source back out must go through [`slice_chars`].
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn merge(a: Span, b: Span) -> Span {
        Span {
            start: usize::min(a.start, b.start),
            end: usize::max(a.end, b.end),
        }
    }
}

impl From<Span> for Range<usize> {
    fn from(a: Span) -> Self {
        a.start..a.end
    }
}

impl Debug for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl Serialize for Span {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&format!("{self:?}"))
    }
}

impl<'de> Deserialize<'de> for Span {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        let s = String::deserialize(deserializer)?;
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| D::Error::custom("malformed span"))?;
        Ok(Span {
            start: start.parse().map_err(D::Error::custom)?,
            end: end.parse().map_err(D::Error::custom)?,
        })
    }
}

impl chumsky::Span for Span {
    type Context = ();
    type Offset = usize;

    fn new(_context: (), range: Range<usize>) -> Self {
        Self {
            start: range.start,
            end: range.end,
        }
    }

    fn context(&self) -> Self::Context {}

    fn start(&self) -> Self::Offset {
        self.start
    }

    fn end(&self) -> Self::Offset {
        self.end
    }
}

/// Slice `source` by a char-offset span, clamped to the source length.
pub fn slice_chars(source: &str, span: Span) -> String {
    source
        .chars()
        .skip(span.start)
        .take(span.end.saturating_sub(span.start))
        .collect()
}
