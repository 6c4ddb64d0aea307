//! The parse tree for a pipelined SPL query.
//!
//! Nodes carry char-offset [`Span`]s; stage and subsearch spans are
//! load-bearing, since downstream consumers slice the original source by
//! them (stage text must preserve intra-stage whitespace, and subsearches
//! are re-parsed from the sliced text).

use enum_as_inner::EnumAsInner;
use serde::{Deserialize, Serialize};

use crate::span::Span;

/// A whole query: pipeline stages in source order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Query {
    pub stages: Vec<Stage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub kind: StageKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, EnumAsInner, Serialize, Deserialize, strum::AsRefStr)]
pub enum StageKind {
    /// An explicit `search` command or the implicit leading search.
    Search(SearchExpr),
    Where(Expr),
    Eval(Vec<EvalAssignment>),
    /// `stats`, `eventstats`, `streamstats`, `chart`, `timechart`.
    Stats(StatsStage),
    Rex {
        /// Source field; `_raw` when absent.
        field: Option<String>,
        pattern: String,
    },
    Join(JoinStage),
    Append(JoinStage),
    Multisearch(Vec<Subsearch>),
    Transaction {
        fields: Vec<String>,
        options: Vec<NamedArg>,
    },
    /// `tstats` / `mstats`.
    Tstats(TstatsStage),
    Inputlookup {
        options: Vec<NamedArg>,
        source: Option<String>,
        where_expr: Option<SearchExpr>,
    },
    /// `rename old AS new, …`; each spec defines a new field name.
    Rename(Vec<RenameSpec>),
    /// `lookup <table> <input> [AS <field>]… [OUTPUT|OUTPUTNEW <out>…]`.
    Lookup(LookupStage),
    Table(Vec<String>),
    Fields {
        /// True for `fields - a b` (removal mode).
        removed: bool,
        fields: Vec<String>,
    },
    Dedup {
        fields: Vec<String>,
        options: Vec<NamedArg>,
    },
    Sort(Vec<SortField>),
    /// `top` / `rare`.
    TopRare {
        command: String,
        fields: Vec<String>,
        by: Vec<String>,
        options: Vec<NamedArg>,
    },
    /// Fallthrough for commands without a dedicated rule; the stage still
    /// parses and the command name is recorded.
    Generic {
        name: String,
        args: Vec<GenericArg>,
    },
    /// A stage with no tokens (`| |`, trailing pipe).
    Empty,
}

/// Boolean structure of a search stage. Terms without an explicit
/// connective are joined by an implicit AND.
#[derive(Debug, Clone, PartialEq, EnumAsInner, Serialize, Deserialize)]
pub enum SearchExpr {
    Binary {
        op: SearchOp,
        left: Box<SearchExpr>,
        right: Box<SearchExpr>,
    },
    Not(Box<SearchExpr>),
    Group(Box<SearchExpr>),
    Term(SearchTerm),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum SearchOp {
    #[strum(to_string = "AND")]
    And,
    #[strum(to_string = "OR")]
    Or,
}

#[derive(Debug, Clone, PartialEq, EnumAsInner, Serialize, Deserialize)]
pub enum SearchTerm {
    /// `field <op> value`; the left side may be purely numeric (`3=3`).
    Compare {
        field: String,
        op: CompareOp,
        value: SearchValue,
    },
    /// `field IN (v1, v2, …)`.
    InList {
        field: String,
        values: Vec<SearchValue>,
    },
    /// A bare unquoted word (`error`, `*`); not a condition by itself.
    Word(String),
    /// A bare quoted string: a full-text keyword filter.
    Phrase(String),
    /// An inline `[ … ]` subsearch in search position.
    Sub(Subsearch),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchValue {
    /// Outer quotes stripped; wildcards kept.
    pub text: String,
    pub quoted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum CompareOp {
    #[strum(to_string = "=")]
    Eq,
    #[strum(to_string = "!=")]
    Ne,
    #[strum(to_string = "<")]
    Lt,
    #[strum(to_string = "<=")]
    Lte,
    #[strum(to_string = ">")]
    Gt,
    #[strum(to_string = ">=")]
    Gte,
}

/// Expression grammar for `where` and `eval` stages:
/// or > and > not > comparison > additive > multiplicative > unary > primary.
#[derive(Debug, Clone, PartialEq, EnumAsInner, Serialize, Deserialize)]
pub enum Expr {
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnOp,
        expr: Box<Expr>,
    },
    /// `field IN (v1, v2, …)` in expression position.
    InList {
        expr: Box<Expr>,
        values: Vec<Expr>,
    },
    FuncCall {
        name: String,
        args: Vec<Expr>,
    },
    Group(Box<Expr>),
    Ident(String),
    Number(String),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum BinOp {
    #[strum(to_string = "OR")]
    Or,
    #[strum(to_string = "AND")]
    And,
    #[strum(to_string = "=")]
    Eq,
    #[strum(to_string = "!=")]
    Ne,
    #[strum(to_string = "<")]
    Lt,
    #[strum(to_string = "<=")]
    Lte,
    #[strum(to_string = ">")]
    Gt,
    #[strum(to_string = ">=")]
    Gte,
    /// `field LIKE "pat%"` in keyword form.
    #[strum(to_string = "LIKE")]
    Like,
    #[strum(to_string = "+")]
    Add,
    #[strum(to_string = "-")]
    Sub,
    /// `eval`-style string concatenation.
    #[strum(to_string = ".")]
    Concat,
    #[strum(to_string = "*")]
    Mul,
    #[strum(to_string = "/")]
    Div,
    #[strum(to_string = "%")]
    Mod,
}

impl BinOp {
    /// The comparison operators that yield filter conditions.
    pub fn as_comparison(&self) -> Option<CompareOp> {
        match self {
            BinOp::Eq => Some(CompareOp::Eq),
            BinOp::Ne => Some(CompareOp::Ne),
            BinOp::Lt => Some(CompareOp::Lt),
            BinOp::Lte => Some(CompareOp::Lte),
            BinOp::Gt => Some(CompareOp::Gt),
            BinOp::Gte => Some(CompareOp::Gte),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalAssignment {
    pub field: String,
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsStage {
    /// The command word as written, lowercased (`stats`, `timechart`, …).
    pub command: String,
    pub options: Vec<NamedArg>,
    pub functions: Vec<StatsFunc>,
    pub by: Vec<String>,
    pub over: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsFunc {
    pub name: String,
    pub arg: Option<Expr>,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinStage {
    pub options: Vec<NamedArg>,
    /// The ON key list; empty when absent.
    pub fields: Vec<String>,
    pub subsearch: Subsearch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TstatsStage {
    pub command: String,
    pub options: Vec<NamedArg>,
    pub functions: Vec<StatsFunc>,
    /// `from datamodel=X.Y`.
    pub datamodel: Option<String>,
    /// Inline `where` clause; search-style terms, time modifiers included.
    pub where_expr: Option<SearchExpr>,
    pub by: Vec<String>,
}

/// A bracketed subquery. `span` covers the inner query text (brackets
/// excluded) so callers can slice and re-parse it verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subsearch {
    pub query: Box<Query>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameSpec {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupStage {
    pub options: Vec<NamedArg>,
    pub table: String,
    /// Lookup-file fields matched against event fields.
    pub inputs: Vec<LookupField>,
    /// Fields the lookup adds to events; empty means "all".
    pub outputs: Vec<LookupField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupField {
    pub field: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedArg {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, EnumAsInner, Serialize, Deserialize)]
pub enum GenericArg {
    Named(NamedArg),
    Bare(String),
    Sub(Subsearch),
}

impl Stage {
    pub fn new(kind: StageKind, span: Span) -> Self {
        Stage { kind, span }
    }
}
