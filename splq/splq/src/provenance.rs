//! Field provenance relative to the first join of a query: which side of
//! a join a later `where`/`search` clause targets.

use crate::extract::result::{FieldProvenance, ParseResult};

/// Classify how `field` relates to the first join in `result`.
///
/// Tie resolution, in order: join key, joined, main (pre-join condition
/// or computed), ambiguous.
pub fn classify_field_provenance(result: &ParseResult, field: &str) -> FieldProvenance {
    let field_lower = field.to_lowercase();

    for join in &result.joins {
        if join
            .join_fields
            .iter()
            .any(|f| f.to_lowercase() == field_lower)
        {
            return FieldProvenance::JoinKey;
        }
    }

    for join in &result.joins {
        if join
            .exposed_fields
            .iter()
            .any(|f| f.to_lowercase() == field_lower)
        {
            return FieldProvenance::Joined;
        }
    }

    let condition_on_field = |stage_cap: Option<usize>| {
        result.conditions.iter().any(|c| {
            c.field.to_lowercase() == field_lower
                && stage_cap.map_or(true, |cap| c.pipe_stage < cap)
        })
    };

    match result.joins.iter().map(|j| j.pipe_stage).min() {
        Some(first_join_stage) => {
            if condition_on_field(Some(first_join_stage)) {
                return FieldProvenance::Main;
            }
        }
        // No joins at all: any condition field belongs to the main search.
        None => {
            if condition_on_field(None) {
                return FieldProvenance::Main;
            }
        }
    }

    if result.computed_fields.contains_key(&field_lower) {
        return FieldProvenance::Main;
    }

    FieldProvenance::Ambiguous
}
