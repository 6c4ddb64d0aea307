//! The condition extractor: a recursive walk over the parse tree that
//! fills in a [`ParseResult`].
//!
//! The walk is structural rather than counter-driven: conditions inside
//! stats/function arguments are simply never visited for emission, and
//! `join`/`append` subsearches are re-parsed from their original text
//! slice instead of being merged into the outer result. `multisearch` branches are real branches of the search, so
//! they do contribute to the outer result, pinned to the multisearch's
//! stage index.

pub(crate) mod post;
pub(crate) mod result;

use std::collections::BTreeMap;
use std::sync::OnceLock;

use itertools::Itertools;
use regex::Regex;
use splq_parser::{ast, parse_query, slice_chars};

use crate::analysis::{is_excluded_field, is_search_scope_metadata};
use result::{Condition, JoinInfo, JoinType, LogicalOp, ParseResult};

/// Work budget for nested subsearch re-parses; adversarial bracket towers
/// get a diagnostic instead of unbounded recursion.
const MAX_SUBSEARCH_DEPTH: usize = 24;

pub(crate) fn extract_inner(query: &str) -> ParseResult {
    extract_at_depth(query, 0)
}

fn extract_at_depth(source: &str, depth: usize) -> ParseResult {
    let (tree, errors) = parse_query(source);

    let mut extractor = Extractor {
        source,
        depth,
        result: ParseResult {
            errors: errors.iter().map(ToString::to_string).collect(),
            ..Default::default()
        },
        current_stage: 0,
        negated: false,
        last_logical_op: LogicalOp::And,
    };

    if let Some(tree) = tree {
        extractor.walk_query(&tree);
    }

    let mut result = extractor.result;
    result.conditions = post::group_or_conditions(std::mem::take(&mut result.conditions));
    result
}

struct Extractor<'a> {
    source: &'a str,
    depth: usize,
    result: ParseResult,
    current_stage: usize,
    /// Flipped on entering and exiting a NOT, so negation applies only to
    /// the subtree underneath.
    negated: bool,
    /// Connective carried to the next emitted condition, reset to AND
    /// after every commit.
    last_logical_op: LogicalOp,
}

impl Extractor<'_> {
    fn walk_query(&mut self, query: &ast::Query) {
        for (index, stage) in query.stages.iter().enumerate() {
            self.current_stage = index;
            self.walk_stage(stage);
        }
    }

    fn walk_stage(&mut self, stage: &ast::Stage) {
        use ast::StageKind::*;

        match &stage.kind {
            Search(expr) => {
                self.push_command("search");
                self.walk_search_expr(expr);
            }
            Where(expr) => {
                self.push_command("where");
                self.walk_where_expr(expr);
            }
            Eval(assignments) => {
                self.push_command("eval");
                for assignment in assignments {
                    let source = first_identifier(&assignment.expr).unwrap_or_default();
                    self.record_computed(&assignment.field, source);
                }
            }
            Stats(stats) => {
                self.push_command(&stats.command);
                self.record_stats_aliases(&stats.functions);
                self.add_group_by(stats.by.iter());
                self.add_group_by(stats.over.iter());
            }
            Rex { field, pattern } => {
                self.push_command("rex");
                let source = field.clone().unwrap_or_else(|| "_raw".to_string());
                for capture in named_captures(pattern) {
                    self.record_computed(&capture, source.clone());
                }
            }
            Join(join) => {
                self.push_command("join");
                self.handle_join(join, false);
            }
            Append(join) => {
                self.push_command("append");
                self.handle_join(join, true);
            }
            Multisearch(branches) => {
                self.push_command("multisearch");
                // Each bracketed branch is a real branch of the search;
                // its stages share the multisearch's stage index.
                for branch in branches {
                    for stage in &branch.query.stages {
                        self.walk_stage(stage);
                    }
                }
            }
            Transaction { fields, .. } => {
                self.push_command("transaction");
                let source = fields.first().cloned().unwrap_or_default();
                for name in ["duration", "eventcount", "closed_txn"] {
                    self.record_computed(name, source.clone());
                }
            }
            Tstats(tstats) => {
                self.push_command(&tstats.command);
                if let Some(datamodel) = &tstats.datamodel {
                    self.result
                        .computed_fields
                        .insert("_datamodel".to_string(), datamodel.clone());
                }
                self.record_stats_aliases(&tstats.functions);
                if let Some(where_expr) = &tstats.where_expr {
                    self.walk_search_expr(where_expr);
                }
                self.add_group_by(tstats.by.iter());
            }
            Inputlookup { where_expr, .. } => {
                self.push_command("inputlookup");
                if let Some(where_expr) = where_expr {
                    self.walk_search_expr(where_expr);
                }
            }
            Rename(specs) => {
                self.push_command("rename");
                for spec in specs {
                    self.record_computed(&spec.target, spec.source.clone());
                }
            }
            Lookup(lookup) => {
                self.push_command("lookup");
                // OUTPUT fields come from the lookup file; their source is
                // not an event field, so it stays untraced.
                for output in &lookup.outputs {
                    let name = output.alias.as_ref().unwrap_or(&output.field).clone();
                    self.record_computed(&name, String::new());
                }
            }
            Table(fields) => {
                self.push_command("table");
                self.add_group_by(fields.iter());
            }
            Fields { fields, .. } => {
                self.push_command("fields");
                self.add_group_by(fields.iter());
            }
            Dedup { fields, .. } => {
                self.push_command("dedup");
                self.add_group_by(fields.iter());
            }
            Sort(fields) => {
                self.push_command("sort");
                self.add_group_by(fields.iter().map(|f| &f.field));
            }
            TopRare {
                command,
                fields,
                by,
                ..
            } => {
                self.push_command(command);
                self.add_group_by(fields.iter());
                self.add_group_by(by.iter());
            }
            Generic { name, .. } => {
                self.push_command(name);
            }
            Empty => {}
        }
    }

    fn walk_search_expr(&mut self, expr: &ast::SearchExpr) {
        use ast::SearchExpr::*;

        match expr {
            Binary { op, left, right } => {
                self.walk_search_expr(left);
                self.last_logical_op = match op {
                    ast::SearchOp::Or => LogicalOp::Or,
                    ast::SearchOp::And => LogicalOp::And,
                };
                self.walk_search_expr(right);
            }
            Not(inner) => {
                self.negated = !self.negated;
                self.walk_search_expr(inner);
                self.negated = !self.negated;
            }
            Group(inner) => self.walk_search_expr(inner),
            Term(term) => self.walk_search_term(term),
        }
    }

    fn walk_search_term(&mut self, term: &ast::SearchTerm) {
        use ast::SearchTerm::*;

        match term {
            Compare { field, op, value } => {
                self.emit(field, op.to_string(), value.text.clone(), None);
            }
            InList { field, values } => {
                if values.is_empty() {
                    return;
                }
                let alternatives: Vec<String> =
                    values.iter().map(|v| v.text.clone()).collect();
                self.emit(
                    field,
                    "in".to_string(),
                    alternatives[0].clone(),
                    Some(alternatives),
                );
            }
            // A bare quoted string is a full-text keyword filter.
            Phrase(text) => {
                self.result.conditions.push(Condition {
                    field: "_raw".to_string(),
                    operator: "contains".to_string(),
                    value: text.clone(),
                    negated: self.negated,
                    pipe_stage: self.current_stage,
                    logical_op: self.last_logical_op,
                    ..Default::default()
                });
                self.last_logical_op = LogicalOp::And;
            }
            Word(_) => {}
            // Inline subsearches don't merge into the outer result.
            Sub(_) => {}
        }
    }

    fn walk_where_expr(&mut self, expr: &ast::Expr) {
        use ast::Expr::*;

        match expr {
            Binary {
                op: ast::BinOp::Or,
                left,
                right,
            } => {
                self.walk_where_expr(left);
                self.last_logical_op = LogicalOp::Or;
                self.walk_where_expr(right);
            }
            Binary {
                op: ast::BinOp::And,
                left,
                right,
            } => {
                self.walk_where_expr(left);
                self.last_logical_op = LogicalOp::And;
                self.walk_where_expr(right);
            }
            Binary {
                op: ast::BinOp::Like,
                left,
                right,
            } => {
                if let (Some(field), Some(pattern)) = (ident_name(left), value_text(right)) {
                    self.emit(&field, "like".to_string(), translate_like(&pattern), None);
                }
            }
            Binary { op, left, right } => {
                // Only a plain `field <op> value` shape is a filter;
                // arithmetic on either side is not.
                if let Some(cmp) = op.as_comparison() {
                    if let (Some(field), Some(value)) = (ident_name(left), value_text(right)) {
                        self.emit(&field, cmp.to_string(), value, None);
                    }
                }
            }
            Unary {
                op: ast::UnOp::Not,
                expr,
            } => {
                self.negated = !self.negated;
                self.walk_where_expr(expr);
                self.negated = !self.negated;
            }
            Unary { .. } => {}
            InList { expr, values } => {
                if let Some(field) = ident_name(expr) {
                    let alternatives: Vec<std::string::String> =
                        values.iter().filter_map(value_text).collect();
                    if !alternatives.is_empty() {
                        self.emit(
                            &field,
                            "in".to_string(),
                            alternatives[0].clone(),
                            Some(alternatives),
                        );
                    }
                }
            }
            FuncCall { name, args } => self.walk_where_func(name, args),
            Group(inner) => self.walk_where_expr(inner),
            Ident(_) | Number(_) | String(_) => {}
        }
    }

    /// `cidrmatch`, `match` and `like` are the only calls that contribute
    /// conditions; everything else is an argument expression whose inner
    /// comparisons must not be emitted.
    fn walk_where_func(&mut self, name: &str, args: &[ast::Expr]) {
        match name.to_ascii_lowercase().as_str() {
            "cidrmatch" if args.len() == 2 => {
                if let (Some(cidr), Some(field)) = (value_text(&args[0]), ident_name(&args[1])) {
                    self.emit(&field, "cidrmatch".to_string(), cidr, None);
                }
            }
            "match" if args.len() == 2 => {
                if let (Some(field), Some(regex)) = (ident_name(&args[0]), value_text(&args[1])) {
                    self.emit(&field, "matches".to_string(), regex, None);
                }
            }
            "like" if args.len() == 2 => {
                if let (Some(field), Some(pattern)) =
                    (ident_name(&args[0]), value_text(&args[1]))
                {
                    self.emit(&field, "like".to_string(), translate_like(&pattern), None);
                }
            }
            _ => {}
        }
    }

    fn handle_join(&mut self, join: &ast::JoinStage, is_append: bool) {
        // Re-parse the subsearch from the original character slice, not
        // from token text: whitespace inside quoted regexes must survive.
        let sub_text = slice_chars(self.source, join.subsearch.span);
        let sub_result = if self.depth >= MAX_SUBSEARCH_DEPTH {
            ParseResult::from_error(
                "subsearch nesting too deep; nested parse skipped".to_string(),
            )
        } else {
            extract_at_depth(&sub_text, self.depth + 1)
        };

        let options: BTreeMap<String, String> = join
            .options
            .iter()
            .map(|o| (o.name.to_lowercase(), o.value.clone()))
            .collect();

        let join_type = if is_append {
            JoinType::Append
        } else {
            options
                .get("type")
                .map(|v| JoinType::from_option(v))
                .unwrap_or_default()
        };

        let exposed_fields = exposed_fields(&sub_result, &join.fields);

        self.result.joins.push(JoinInfo {
            join_type,
            is_append,
            join_fields: join.fields.clone(),
            options,
            subsearch: Box::new(sub_result),
            exposed_fields,
            pipe_stage: self.current_stage,
        });
    }

    fn emit(
        &mut self,
        field: &str,
        operator: String,
        value: String,
        alternatives: Option<Vec<String>>,
    ) {
        let field_lower = field.to_lowercase();
        if is_excluded_field(&field_lower) {
            return;
        }

        let (is_computed, source_field) = match self.result.computed_fields.get(&field_lower) {
            Some(source) => (true, (!source.is_empty()).then(|| source.clone())),
            None => (false, None),
        };

        self.result.conditions.push(Condition {
            field: field.to_string(),
            operator,
            value,
            negated: self.negated,
            pipe_stage: self.current_stage,
            logical_op: self.last_logical_op,
            alternatives,
            is_computed,
            source_field,
        });
        self.last_logical_op = LogicalOp::And;
    }

    fn push_command(&mut self, command: &str) {
        self.result.commands.push(command.to_string());
    }

    fn record_computed(&mut self, name: &str, source: String) {
        self.result
            .computed_fields
            .insert(name.to_lowercase(), source);
    }

    fn record_stats_aliases(&mut self, functions: &[ast::StatsFunc]) {
        for func in functions {
            if let Some(alias) = &func.alias {
                let source = func
                    .arg
                    .as_ref()
                    .and_then(first_identifier)
                    .unwrap_or_default();
                self.record_computed(alias, source);
            }
        }
    }

    fn add_group_by<'f>(&mut self, fields: impl Iterator<Item = &'f String>) {
        for field in fields {
            if !is_excluded_field(&field.to_lowercase()) {
                self.result.group_by_fields.push(field.clone());
            }
        }
    }
}

/// Fields a subsearch makes available downstream: projected fields when
/// the subsearch pipes through `table`/`fields`, otherwise its condition
/// fields (minus search-scope metadata) plus computed fields; the join
/// keys always count.
fn exposed_fields(sub: &ParseResult, join_fields: &[String]) -> Vec<String> {
    let mut fields: Vec<String> = Vec::new();

    if sub
        .commands
        .iter()
        .any(|c| c == "table" || c == "fields")
    {
        fields.extend(sub.group_by_fields.iter().cloned());
    } else {
        fields.extend(
            sub.conditions
                .iter()
                .map(|c| c.field.clone())
                .filter(|f| !is_search_scope_metadata(f)),
        );
        fields.extend(
            sub.computed_fields
                .keys()
                .filter(|k| k.as_str() != "_datamodel")
                .cloned(),
        );
    }
    fields.extend(join_fields.iter().cloned());

    fields
        .into_iter()
        .unique_by(|f| f.to_lowercase())
        .collect()
}

/// The leftmost identifier of an expression that looks like a real field:
/// not a reserved word (those never lex as identifiers), not
/// digit-leading, not a function name (function names aren't identifier
/// nodes in the tree).
fn first_identifier(expr: &ast::Expr) -> Option<String> {
    use ast::Expr::*;

    match expr {
        Ident(name) => {
            let starts_like_field = name
                .chars()
                .next()
                .is_some_and(|c| c.is_alphabetic() || c == '_');
            starts_like_field.then(|| name.clone())
        }
        Binary { left, right, .. } => {
            first_identifier(left).or_else(|| first_identifier(right))
        }
        Unary { expr, .. } | Group(expr) => first_identifier(expr),
        InList { expr, .. } => first_identifier(expr),
        FuncCall { args, .. } => args.iter().find_map(first_identifier),
        Number(_) | String(_) => None,
    }
}

fn ident_name(expr: &ast::Expr) -> Option<String> {
    match expr {
        ast::Expr::Ident(name) => Some(name.clone()),
        ast::Expr::Number(n) => Some(n.clone()),
        ast::Expr::Group(inner) => ident_name(inner),
        _ => None,
    }
}

fn value_text(expr: &ast::Expr) -> Option<String> {
    match expr {
        ast::Expr::String(s) => Some(s.clone()),
        ast::Expr::Number(n) => Some(n.clone()),
        ast::Expr::Ident(s) => Some(s.clone()),
        ast::Expr::Unary {
            op: ast::UnOp::Neg,
            expr,
        } => value_text(expr).map(|v| format!("-{v}")),
        ast::Expr::Group(inner) => value_text(inner),
        _ => None,
    }
}

/// SQL LIKE wildcards in SPL patterns: `%` matches any run, `_` a single
/// char; both are rewritten to the search-style `*`/`?`.
fn translate_like(pattern: &str) -> String {
    pattern.replace('%', "*").replace('_', "?")
}

/// Named capture groups in a rex pattern: `(?<name>…)` and `(?P<name>…)`.
fn named_captures(pattern: &str) -> Vec<String> {
    static CAPTURE: OnceLock<Regex> = OnceLock::new();
    let capture = CAPTURE
        .get_or_init(|| Regex::new(r"\(\?P?<([A-Za-z_][A-Za-z0-9_]*)>").expect("static regex"));

    capture
        .captures_iter(pattern)
        .map(|c| c[1].to_string())
        .collect()
}
