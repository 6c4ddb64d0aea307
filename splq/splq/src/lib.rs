//! Static analysis for Splunk-style SPL search queries.
//!
//! The entry point is [`extract_conditions`]: it parses a query and
//! returns a [`ParseResult`] describing the fields it filters on, where
//! computed fields come from, aggregation group-bys, and a structured
//! decomposition of join/append subsearches. [`classify_pipeline_stages`]
//! and [`classify_field_provenance`] build further analyses on top.
//!
//! No entry point ever panics to the caller or returns an error: parse
//! problems surface as strings in [`ParseResult::errors`] next to
//! whatever partial result was extracted, and every call runs under a
//! process-wide deadline (see [`set_max_parse_time`]) with panic
//! recovery. The extractor keeps no shared mutable state, so concurrent
//! independent calls are fine.

mod analysis;
mod extract;
mod guard;
mod provenance;
mod stages;

pub use analysis::{
    get_event_type_from_conditions, has_complex_where_conditions, has_unmapped_computed_fields,
    is_command_keyword, is_search_scope_metadata, is_statistical_query,
};
pub use extract::post::deduplicate_conditions;
pub use extract::result::{
    Condition, FieldProvenance, JoinInfo, JoinType, LogicalOp, ParseResult,
};
pub use guard::{max_parse_time, set_max_parse_time};
pub use provenance::classify_field_provenance;
pub use stages::{
    classify_pipeline_stages, first_join_or_subsearch_stage, CommandType, PipelineStageInfo,
};

/// Parse an SPL query and extract its filter conditions and structure.
///
/// Always returns a well-formed result; on timeout or internal panic the
/// result is empty apart from a single diagnostic in `errors`.
pub fn extract_conditions(query: &str) -> ParseResult {
    let owned = query.to_string();
    guard::run_guarded(
        move || extract::extract_inner(&owned),
        ParseResult::from_error,
    )
}
