//! Table-driven tests for join/append decomposition, exposed fields, and
//! field provenance across joins.

use splq::{
    classify_field_provenance, extract_conditions, FieldProvenance, JoinType, ParseResult,
};

struct ExpectedJoin {
    join_type: JoinType,
    is_append: bool,
    /// None means "don't check".
    join_fields: Option<&'static [&'static str]>,
    subsearch_conditions: &'static [(&'static str, &'static str, &'static str)],
}

struct Case {
    name: &'static str,
    query: &'static str,
    main_conditions: &'static [(&'static str, &'static str, &'static str)],
    joins: &'static [ExpectedJoin],
    provenance: &'static [(&'static str, FieldProvenance)],
}

fn assert_has_condition(result: &ParseResult, (field, op, value): (&str, &str, &str), ctx: &str) {
    assert!(
        result
            .conditions
            .iter()
            .any(|c| c.field == field && c.operator == op && c.value == value),
        "{ctx}: missing condition {field} {op} {value}; got {:#?}",
        result.conditions
    );
}

const CASES: &[Case] = &[
    Case {
        name: "enrichment join - left join with table output",
        query: r#"index=auth action="failed" | join type=left user [search index=assets status="active" | table user, department, location]"#,
        main_conditions: &[("action", "=", "failed")],
        joins: &[ExpectedJoin {
            join_type: JoinType::Left,
            is_append: false,
            join_fields: Some(&["user"]),
            subsearch_conditions: &[("status", "=", "active")],
        }],
        provenance: &[
            ("user", FieldProvenance::JoinKey),
            ("department", FieldProvenance::Joined),
            ("location", FieldProvenance::Joined),
            ("action", FieldProvenance::Main),
        ],
    },
    Case {
        name: "correlation join - inner join two event sources",
        query: r#"index=auth EventID=4625 | join type=inner user [search index=endpoint EventID=4688 | where ParentProcessName="cmd.exe" | table user, ProcessName, ParentProcessName] | where ProcessName="*mimikatz*""#,
        main_conditions: &[("EventID", "=", "4625")],
        joins: &[ExpectedJoin {
            join_type: JoinType::Inner,
            is_append: false,
            join_fields: Some(&["user"]),
            subsearch_conditions: &[
                ("EventID", "=", "4688"),
                ("ParentProcessName", "=", "cmd.exe"),
            ],
        }],
        provenance: &[
            ("user", FieldProvenance::JoinKey),
            ("ProcessName", FieldProvenance::Joined),
            ("ParentProcessName", FieldProvenance::Joined),
            ("EventID", FieldProvenance::Main),
        ],
    },
    Case {
        name: "default join type (inner)",
        query: r#"index=main | join user [search index=other field="val"]"#,
        main_conditions: &[],
        joins: &[ExpectedJoin {
            join_type: JoinType::Inner,
            is_append: false,
            join_fields: Some(&["user"]),
            subsearch_conditions: &[("field", "=", "val")],
        }],
        provenance: &[],
    },
    Case {
        name: "join with no field list (no ON clause)",
        query: r#"index=main | join type=left [search index=other field="val"]"#,
        main_conditions: &[],
        joins: &[ExpectedJoin {
            join_type: JoinType::Left,
            is_append: false,
            join_fields: Some(&[]),
            subsearch_conditions: &[("field", "=", "val")],
        }],
        provenance: &[],
    },
    Case {
        name: "join with multiple join fields",
        query: r#"index=main | join type=left user, host [search index=assets status="active"]"#,
        main_conditions: &[],
        joins: &[ExpectedJoin {
            join_type: JoinType::Left,
            is_append: false,
            join_fields: Some(&["user", "host"]),
            subsearch_conditions: &[("status", "=", "active")],
        }],
        provenance: &[],
    },
    Case {
        name: "append command",
        query: r#"index=main action="blocked" | append [search index=secondary action="denied"]"#,
        main_conditions: &[("action", "=", "blocked")],
        joins: &[ExpectedJoin {
            join_type: JoinType::Append,
            is_append: true,
            join_fields: Some(&[]),
            subsearch_conditions: &[("action", "=", "denied")],
        }],
        provenance: &[],
    },
    Case {
        name: "subsearch with eval computed fields",
        query: r#"index=main | join user [search index=endpoint | eval cmd=lower(CommandLine) | search cmd="powershell"]"#,
        main_conditions: &[],
        joins: &[ExpectedJoin {
            join_type: JoinType::Inner,
            is_append: false,
            join_fields: Some(&["user"]),
            subsearch_conditions: &[],
        }],
        provenance: &[],
    },
    Case {
        name: "join with complex subsearch pipeline",
        query: r#"index=auth EventID=4625 | join user [search index=endpoint EventID=1 | where CommandLine="*whoami*" | stats count by user | where count > 5 | table user]"#,
        main_conditions: &[("EventID", "=", "4625")],
        joins: &[ExpectedJoin {
            join_type: JoinType::Inner,
            is_append: false,
            join_fields: Some(&["user"]),
            subsearch_conditions: &[
                ("EventID", "=", "1"),
                ("CommandLine", "=", "*whoami*"),
            ],
        }],
        provenance: &[],
    },
];

#[test]
fn join_extraction_table_driven() {
    for case in CASES {
        let result = extract_conditions(case.query);

        for expected in case.main_conditions {
            assert_has_condition(&result, *expected, case.name);
        }

        assert_eq!(
            result.joins.len(),
            case.joins.len(),
            "{}: join count",
            case.name
        );

        for (i, expected) in case.joins.iter().enumerate() {
            let join = &result.joins[i];
            assert_eq!(join.join_type, expected.join_type, "{}: type", case.name);
            assert_eq!(join.is_append, expected.is_append, "{}: is_append", case.name);

            if let Some(fields) = expected.join_fields {
                let got: Vec<&str> = join.join_fields.iter().map(String::as_str).collect();
                assert_eq!(&got, fields, "{}: join fields", case.name);
            }

            for cond in expected.subsearch_conditions {
                assert_has_condition(&join.subsearch, *cond, case.name);
            }
        }

        for (field, expected) in case.provenance {
            assert_eq!(
                classify_field_provenance(&result, field),
                *expected,
                "{}: provenance of {field}",
                case.name
            );
        }
    }
}

#[test]
fn subsearch_is_independent_of_outer_result() {
    let query = r#"index=main | join type=left user [search index=users status="active"]"#;
    let result = extract_conditions(query);

    // Subsearch conditions never merge into the outer list.
    assert!(
        !result
            .conditions
            .iter()
            .any(|c| c.field == "status" && c.value == "active"),
        "subsearch condition leaked into outer result"
    );

    // They are available through the join decomposition instead.
    assert_eq!(result.joins.len(), 1);
    let sub = &result.joins[0].subsearch;
    assert!(sub.conditions.iter().any(|c| c.field == "status"));
    // Subsearch stage numbering starts over from zero.
    assert!(sub.conditions.iter().all(|c| c.pipe_stage == 0));
}

#[test]
fn subsearch_text_slicing_preserves_whitespace() {
    let query = r#"index=main | join user [search index=assets department="engineering" | where risk_score > 50]"#;
    let result = extract_conditions(query);

    assert_eq!(result.joins.len(), 1);
    let sub = &result.joins[0].subsearch;
    assert!(sub
        .conditions
        .iter()
        .any(|c| c.field == "department" && c.value == "engineering"));
    assert!(sub
        .conditions
        .iter()
        .any(|c| c.field == "risk_score" && c.operator == ">"));
}

#[test]
fn exposed_fields_from_table_projection() {
    let query = r#"index=auth EventID=4625 | join type=inner user [search index=endpoint EventID=4688 | where ParentProcessName="cmd.exe" | table user, ProcessName, ParentProcessName, ComputerName]"#;
    let result = extract_conditions(query);

    let join = &result.joins[0];
    for field in ["user", "ProcessName", "ParentProcessName", "ComputerName"] {
        assert!(
            join.exposed_fields.iter().any(|f| f == field),
            "expected exposed field {field}, got {:?}",
            join.exposed_fields
        );
    }
}

#[test]
fn exposed_fields_without_projection() {
    // No table/fields in the subsearch: condition fields (metadata aside)
    // plus computed fields are what the join exposes.
    let query = r#"index=main | join user [search index=endpoint dest_port=443 | eval cmd=lower(CommandLine)]"#;
    let result = extract_conditions(query);

    let join = &result.joins[0];
    assert!(join.exposed_fields.iter().any(|f| f == "dest_port"));
    assert!(join.exposed_fields.iter().any(|f| f == "cmd"));
    assert!(join.exposed_fields.iter().any(|f| f == "user"));
    // Search-scope metadata is not an exposed field.
    assert!(!join.exposed_fields.iter().any(|f| f == "index"));
}

#[test]
fn join_options_map() {
    let query = r#"index=main | join type=outer usetime=true max=1 user [search index=other a=1]"#;
    let result = extract_conditions(query);

    let join = &result.joins[0];
    assert_eq!(join.join_type, JoinType::Outer);
    assert_eq!(join.options.get("type").map(String::as_str), Some("outer"));
    assert_eq!(join.options.get("usetime").map(String::as_str), Some("true"));
    assert_eq!(join.options.get("max").map(String::as_str), Some("1"));
    assert_eq!(join.join_fields, vec!["user"]);
    assert_eq!(join.pipe_stage, 1);
}

#[test]
fn nested_joins_recurse() {
    let query = "index=a | join u1 [search index=b | join u2 [search index=c x=1]]";
    let result = extract_conditions(query);

    assert_eq!(result.joins.len(), 1);
    let inner = &result.joins[0].subsearch;
    assert_eq!(inner.joins.len(), 1);
    assert!(inner.joins[0]
        .subsearch
        .conditions
        .iter()
        .any(|c| c.field == "x"));
}
