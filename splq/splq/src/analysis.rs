//! Field classification predicates and small query-level analyses built
//! on top of an extracted [`ParseResult`].

use crate::extract::result::ParseResult;

/// Time-range modifiers that are not real filter conditions.
const TIME_MODIFIERS: &[&str] = &["earliest", "latest", "splunk_server"];

/// SPL command keywords; a left-hand side with one of these names is a
/// grammar artifact, not a field.
const COMMAND_KEYWORDS: &[&str] = &[
    "count", "sum", "avg", "min", "max", "search", "where", "eval", "stats", "table", "fields",
    "rename", "sort", "head", "tail", "dedup", "by", "as", "and", "or", "not", "span",
];

/// Routing fields that scope a search rather than filter event content.
/// They are kept as conditions (they carry detection context); callers
/// that don't want them filter with this predicate.
const SEARCH_SCOPE_METADATA: &[&str] = &["index", "sourcetype", "source", "splunk_server"];

const AGGREGATION_COMMANDS: &[&str] = &[
    "stats",
    "eventstats",
    "streamstats",
    "chart",
    "timechart",
    "transaction",
    "dedup",
    "top",
    "rare",
    "tstats",
    "mstats",
];

pub fn is_command_keyword(field: &str) -> bool {
    COMMAND_KEYWORDS
        .iter()
        .any(|k| field.eq_ignore_ascii_case(k))
}

pub fn is_search_scope_metadata(field: &str) -> bool {
    SEARCH_SCOPE_METADATA
        .iter()
        .any(|k| field.eq_ignore_ascii_case(k))
}

/// Left-hand sides silently dropped before condition emission. Note that
/// `index`/`sourcetype`/`source` are NOT excluded; only time-range
/// modifiers and command keywords are.
pub(crate) fn is_excluded_field(field_lower: &str) -> bool {
    TIME_MODIFIERS.contains(&field_lower) || is_command_keyword(field_lower)
}

/// True when the query aggregates events at any stage.
pub fn is_statistical_query(result: &ParseResult) -> bool {
    result
        .commands
        .iter()
        .any(|c| AGGREGATION_COMMANDS.contains(&c.as_str()))
}

/// True when some computed field (sentinels aside) has no traceable
/// source; test-event synthesizers cannot populate those.
pub fn has_unmapped_computed_fields(result: &ParseResult) -> bool {
    result
        .computed_fields
        .iter()
        .any(|(name, source)| !name.starts_with('_') && source.is_empty())
}

/// True when the query's `where` filtering goes beyond simple equality:
/// regex/pattern/CIDR matching, or range comparisons on computed fields.
pub fn has_complex_where_conditions(result: &ParseResult) -> bool {
    result.conditions.iter().any(|c| {
        matches!(c.operator.as_str(), "matches" | "like" | "cidrmatch")
            || (c.is_computed && matches!(c.operator.as_str(), "<" | "<=" | ">" | ">=" | "!="))
    })
}

/// Map Windows event-code conditions to a canonical event-type tag.
///
/// A starter table, not a closed set: 4688/4624/4625 for Windows
/// security, and Sysmon 1/3 when the sourcetype mentions sysmon.
pub fn get_event_type_from_conditions(result: &ParseResult) -> Option<String> {
    let is_sysmon = result.conditions.iter().any(|c| {
        c.field.eq_ignore_ascii_case("sourcetype") && c.value.to_lowercase().contains("sysmon")
    });

    let code = result.conditions.iter().find(|c| {
        matches!(
            c.field.to_lowercase().as_str(),
            "eventcode" | "eventid" | "event_id"
        )
    })?;

    let tag = if is_sysmon {
        match code.value.as_str() {
            "1" => "sysmon_1",
            "3" => "sysmon_3",
            _ => return None,
        }
    } else {
        match code.value.as_str() {
            "4688" => "windows_4688",
            "4624" => "windows_4624",
            "4625" => "windows_4625",
            _ => return None,
        }
    };

    Some(tag.to_string())
}
