//! The extraction data model: everything a caller gets back from
//! [`crate::extract_conditions`].
//!
//! Results are plain owned data. Nothing here references parser state or
//! tree nodes; a `ParseResult` and everything reachable from it outlives
//! the parse that produced it.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A single field condition extracted from an SPL query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Condition {
    /// Left-hand side identifier, original case preserved.
    pub field: String,
    /// `=`, `!=`, `<`, `<=`, `>`, `>=`, or one of the synthesized
    /// operators: `in`, `contains`, `matches`, `like`, `cidrmatch`.
    pub operator: String,
    /// Primary value as text, outer quotes stripped, wildcards kept.
    pub value: String,
    /// True when the condition sits under an odd number of negations.
    pub negated: bool,
    /// Zero-based pipeline stage that produced the condition.
    pub pipe_stage: usize,
    /// Connective to the textually previous condition in the same stage.
    pub logical_op: LogicalOp,
    /// Same-field OR alternatives, or the value list of an `IN`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub alternatives: Option<Vec<String>>,
    /// True when `field` was produced by `eval`, `rex`, a stats alias, or
    /// `transaction` earlier in the pipeline.
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub is_computed: bool,
    /// Best-effort traced source of a computed field, when determinable.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source_field: Option<String>,
}

/// Connective between a condition and its predecessor. `AND` is the
/// default for the first condition of a stage.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display,
)]
pub enum LogicalOp {
    #[default]
    #[serde(rename = "AND")]
    #[strum(to_string = "AND")]
    And,
    #[serde(rename = "OR")]
    #[strum(to_string = "OR")]
    Or,
}

/// Everything extracted from one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ParseResult {
    pub conditions: Vec<Condition>,
    /// Fields named in aggregation `by` clauses, `table`, `fields`,
    /// `dedup`, `sort`, `top`/`rare`, `chart … over …`, `tstats … by`.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub group_by_fields: Vec<String>,
    /// Computed-field name (lowercased) to best-known source field; the
    /// source is empty when it could not be traced. The reserved key
    /// `_datamodel` carries `tstats from datamodel=…`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub computed_fields: BTreeMap<String, String>,
    /// Command tokens in traversal order.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub commands: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub joins: Vec<JoinInfo>,
    /// Lex, parse, and walk diagnostics. Non-empty errors next to
    /// non-empty conditions is a legitimate partial parse.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<String>,
}

impl ParseResult {
    /// The well-formed empty result the safety wrapper hands back on
    /// timeout or panic: one diagnostic, nothing else.
    pub(crate) fn from_error(message: String) -> Self {
        ParseResult {
            errors: vec![message],
            ..Default::default()
        }
    }
}

/// Structured view of a `join` or `append` stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinInfo {
    #[serde(rename = "type")]
    pub join_type: JoinType,
    pub is_append: bool,
    /// The ON key list; empty when absent.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub join_fields: Vec<String>,
    /// Recognized `name=value` options, names lowercased.
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub options: BTreeMap<String, String>,
    /// The bracketed subquery, independently parsed from its original
    /// text slice.
    pub subsearch: Box<ParseResult>,
    /// Fields the subsearch makes available to downstream stages.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub exposed_fields: Vec<String>,
    /// Stage index of the join/append itself.
    pub pipe_stage: usize,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Outer,
    Append,
}

impl JoinType {
    /// `type=` option values outside the known set default to inner.
    pub(crate) fn from_option(value: &str) -> Self {
        JoinType::from_str(value).unwrap_or_default()
    }
}

/// How a field relates to the first join in a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FieldProvenance {
    /// Present before any join.
    Main,
    /// Produced by a join's subsearch.
    Joined,
    /// Listed in a join's ON clause.
    JoinKey,
    /// Cannot be determined.
    Ambiguous,
}
