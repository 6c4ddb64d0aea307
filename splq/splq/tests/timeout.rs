//! Deadline behavior gets its own test binary: the parse deadline is
//! process-wide, and shrinking it must not race other extraction tests.

use std::time::Duration;

use splq::{classify_pipeline_stages, extract_conditions, set_max_parse_time};

#[test]
fn deadline_expiry_returns_empty_result_with_one_error() {
    // A zero deadline expires before any real parse can finish.
    set_max_parse_time(Duration::ZERO);

    let result = extract_conditions("index=main status=200 | stats count by user");
    assert!(result.conditions.is_empty());
    assert!(result.group_by_fields.is_empty());
    assert!(result.joins.is_empty());
    assert_eq!(result.errors.len(), 1);
    assert!(
        result.errors[0].starts_with("parser timeout:"),
        "unexpected error: {}",
        result.errors[0]
    );

    // The classifier degrades to an empty sequence.
    assert!(classify_pipeline_stages("index=main | stats count").is_empty());

    // Restore the default and confirm normal service resumes.
    set_max_parse_time(Duration::from_secs(5));
    let result = extract_conditions("index=main status=200");
    assert_eq!(result.conditions.len(), 2);
    assert!(result.errors.is_empty());
}
