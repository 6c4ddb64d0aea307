//! End-to-end extraction scenarios over realistic detection queries.

use similar_asserts::assert_eq;
use splq::{extract_conditions, Condition, ParseResult};

fn find<'a>(result: &'a ParseResult, field: &str) -> &'a Condition {
    result
        .conditions
        .iter()
        .find(|c| c.field.eq_ignore_ascii_case(field))
        .unwrap_or_else(|| panic!("no condition on {field}: {:#?}", result.conditions))
}

#[test]
fn simple_search() {
    let result = extract_conditions(r#"index=main sourcetype="access_combined" status=200"#);

    assert_eq!(result.errors, Vec::<String>::new());
    assert_eq!(result.conditions.len(), 3);
    assert_eq!(find(&result, "index").value, "main");
    assert_eq!(find(&result, "sourcetype").value, "access_combined");
    assert_eq!(find(&result, "status").value, "200");
    assert!(result.conditions.iter().all(|c| c.pipe_stage == 0));
}

#[test]
fn simple_search_serialization() {
    let result = extract_conditions("index=main status=200");
    insta::assert_snapshot!(serde_json::to_string_pretty(&result).unwrap(), @r#"
    {
      "conditions": [
        {
          "field": "index",
          "operator": "=",
          "value": "main",
          "negated": false,
          "pipe_stage": 0,
          "logical_op": "AND"
        },
        {
          "field": "status",
          "operator": "=",
          "value": "200",
          "negated": false,
          "pipe_stage": 0,
          "logical_op": "AND"
        }
      ],
      "commands": [
        "search"
      ]
    }
    "#);
}

#[test]
fn or_conditions_group_into_alternatives() {
    let result = extract_conditions(r#"index=main (action="success" OR action="failure")"#);

    assert_eq!(result.conditions.len(), 2);
    let action = find(&result, "action");
    assert_eq!(action.value, "success");
    assert_eq!(
        action.alternatives.as_deref(),
        Some(&["success".to_string(), "failure".to_string()][..])
    );
}

#[test]
fn where_clause_stage_index() {
    let result = extract_conditions("index=main | where status=200");

    assert_eq!(result.conditions.len(), 2);
    assert_eq!(find(&result, "index").pipe_stage, 0);
    let status = find(&result, "status");
    assert_eq!(status.pipe_stage, 1);
    assert_eq!(status.operator, "=");
    assert_eq!(result.commands, vec!["search", "where"]);
}

#[test]
fn computed_field_tracking() {
    let result = extract_conditions(
        r#"index=endpoint EventCode=4688 | eval cmd=lower(CommandLine) | search cmd="powershell""#,
    );

    assert_eq!(
        result.computed_fields.get("cmd").map(String::as_str),
        Some("CommandLine")
    );

    let cmd = find(&result, "cmd");
    assert!(cmd.is_computed);
    assert_eq!(cmd.source_field.as_deref(), Some("CommandLine"));
    assert_eq!(cmd.pipe_stage, 2);

    // The plain condition is untouched.
    let event_code = find(&result, "EventCode");
    assert!(!event_code.is_computed);
    assert_eq!(event_code.source_field, None);
}

#[test]
fn stats_aliases_become_computed_fields() {
    let result = extract_conditions(
        "index=windows EventCode=4688 | stats count as events dc(Computer) as host_count by user | where events > 5",
    );

    // `count` has no argument to trace, `dc(Computer)` does.
    assert_eq!(result.computed_fields.get("events").map(String::as_str), Some(""));
    assert_eq!(
        result.computed_fields.get("host_count").map(String::as_str),
        Some("Computer")
    );

    let events = find(&result, "events");
    assert!(events.is_computed);
    assert_eq!(events.operator, ">");
    assert_eq!(events.pipe_stage, 2);
}

#[test]
fn transaction_synthesizes_computed_fields() {
    let result = extract_conditions(
        "index=web sourcetype=access_combined | transaction session_id maxpause=30m | where duration > 3600 | table session_id, duration, eventcount",
    );

    for name in ["duration", "eventcount", "closed_txn"] {
        assert_eq!(
            result.computed_fields.get(name).map(String::as_str),
            Some("session_id"),
            "missing transaction field {name}"
        );
    }

    let duration = find(&result, "duration");
    assert!(duration.is_computed);
    assert_eq!(duration.source_field.as_deref(), Some("session_id"));

    assert!(result.commands.contains(&"transaction".to_string()));
    assert_eq!(
        result.group_by_fields,
        vec!["session_id", "duration", "eventcount"]
    );
}

#[test]
fn rex_named_captures() {
    let result = extract_conditions(
        r#"source="/var/log/auth.log" f_54401!="fulbwnvc" | fields f_54401 event f_80119 | sort - f_54401 | transaction f_54401 | rex field=f_54401 "(?<extract_7614>pixzc)" | search f_4400 <= 82"#,
    );

    assert_eq!(
        result.commands,
        vec!["search", "fields", "sort", "transaction", "rex", "search"]
    );
    assert_eq!(
        result.computed_fields.get("extract_7614").map(String::as_str),
        Some("f_54401")
    );

    assert_eq!(find(&result, "f_54401").operator, "!=");
    let late = find(&result, "f_4400");
    assert_eq!(late.operator, "<=");
    assert_eq!(late.value, "82");
    assert_eq!(late.pipe_stage, 5);
}

#[test]
fn rex_default_source_is_raw() {
    let result = extract_conditions(r#"index=a | rex "(?P<user>\w+)@(?<domain>\S+)""#);
    assert_eq!(result.computed_fields.get("user").map(String::as_str), Some("_raw"));
    assert_eq!(result.computed_fields.get("domain").map(String::as_str), Some("_raw"));
}

#[test]
fn rename_creates_computed_fields() {
    let result = extract_conditions(
        r#"index=proxy | rename url as indicator | search indicator="*evil*""#,
    );

    assert_eq!(
        result.computed_fields.get("indicator").map(String::as_str),
        Some("url")
    );
    let indicator = find(&result, "indicator");
    assert!(indicator.is_computed);
    assert_eq!(indicator.source_field.as_deref(), Some("url"));
}

#[test]
fn lookup_outputs_are_computed_without_a_source() {
    let result = extract_conditions(
        "index=firewall | lookup geo_ip_lookup ip as src_ip OUTPUT country, city | stats count by country",
    );

    assert_eq!(result.computed_fields.get("country").map(String::as_str), Some(""));
    assert_eq!(result.computed_fields.get("city").map(String::as_str), Some(""));
    assert!(splq::has_unmapped_computed_fields(&result));
    assert_eq!(result.group_by_fields, vec!["country"]);
    assert_eq!(result.commands, vec!["search", "lookup", "stats"]);
}

#[test]
fn in_operator_single_condition_with_alternatives() {
    let result = extract_conditions(r#"index=main status IN ("200", "201", "204")"#);

    assert_eq!(result.conditions.len(), 2);
    let status = find(&result, "status");
    assert_eq!(status.operator, "in");
    assert_eq!(status.value, "200");
    assert_eq!(
        status.alternatives.as_deref(),
        Some(&["200".to_string(), "201".to_string(), "204".to_string()][..])
    );
    assert!(!status.negated);
}

#[test]
fn negated_in_list() {
    let result = extract_conditions(r#"index=sysmon NOT host IN ("gzs","pmagc","hok") EventCode=1"#);

    assert_eq!(result.conditions.len(), 3);

    let host = find(&result, "host");
    assert!(host.negated);
    assert_eq!(host.operator, "in");
    assert_eq!(host.value, "gzs");
    assert_eq!(host.alternatives.as_ref().map(Vec::len), Some(3));

    // Negation applies only to the IN term.
    assert!(!find(&result, "index").negated);
    assert!(!find(&result, "EventCode").negated);
}

#[test]
fn negation_composes() {
    let result = extract_conditions(r#"index=main NOT status="error""#);
    assert!(find(&result, "status").negated);

    // An even number of NOTs cancels out.
    let result = extract_conditions(r#"index=main NOT NOT status="error""#);
    assert!(!find(&result, "status").negated);

    let result = extract_conditions(r#"index=main NOT (a=1 NOT b=2)"#);
    assert!(find(&result, "a").negated);
    assert!(!find(&result, "b").negated);
}

#[test]
fn bare_quoted_strings_are_raw_keywords() {
    let result = extract_conditions(r#"index=main "error" OR "failed" | search f_5226 = "*bakvf*""#);

    let raw = find(&result, "_raw");
    assert_eq!(raw.operator, "contains");
    assert_eq!(raw.value, "error");
    assert_eq!(
        raw.alternatives.as_deref(),
        Some(&["error".to_string(), "failed".to_string()][..])
    );

    assert_eq!(find(&result, "f_5226").value, "*bakvf*");
}

#[test]
fn colon_and_wildcard_values() {
    let result = extract_conditions("eventtype=network:connection:allowed status=200");
    assert_eq!(find(&result, "eventtype").value, "network:connection:allowed");

    let result = extract_conditions("CommandLine=powershell* status=200");
    assert_eq!(find(&result, "CommandLine").value, "powershell*");

    let result = extract_conditions(r#"index=sysmon host="*xnsnlyh*" EventCode=1"#);
    assert_eq!(result.conditions.len(), 3);
    assert_eq!(find(&result, "host").value, "*xnsnlyh*");
}

#[test]
fn numeric_comparison_operators() {
    let result = extract_conditions("EventCode>1000 bytes>=500 duration<30 count<=10");

    assert_eq!(find(&result, "EventCode").operator, ">");
    assert_eq!(find(&result, "bytes").operator, ">=");
    assert_eq!(find(&result, "duration").operator, "<");
    // `count` is a command keyword, never a field.
    assert!(!result.conditions.iter().any(|c| c.field == "count"));
}

#[test]
fn numeric_field_names_survive() {
    let result = extract_conditions("3=3 4=4 x=1");
    assert_eq!(result.conditions.len(), 3);
    assert_eq!(result.conditions[0].field, "3");
    assert_eq!(result.conditions[0].operator, "=");
    assert_eq!(result.conditions[0].value, "3");
    assert!(result.conditions.iter().all(|c| c.pipe_stage == 0));
}

#[test]
fn excluded_fields_never_leak() {
    let cases: &[(&str, usize)] = &[
        (r#"host IN ("a", "b", "c")"#, 1),
        (r#"index=sysmon EventCode=4625 host="server1""#, 3),
        (r#"index=main sourcetype=syslog source="/var/log" host="*""#, 4),
        (r#"index=main action="blocked" host="server1""#, 3),
        ("index=sysmon host>8632", 2),
        (r#"index=main sourcetype=syslog source="/var/log""#, 3),
        // earliest is a time modifier, not a condition
        ("index=main earliest=-24h", 1),
    ];

    for (query, expected) in cases {
        let result = extract_conditions(query);
        assert_eq!(
            result.conditions.len(),
            *expected,
            "wrong condition count for {query}: {:#?}",
            result.conditions
        );
        for cond in &result.conditions {
            assert!(!splq::is_command_keyword(&cond.field));
            assert!(!matches!(
                cond.field.to_lowercase().as_str(),
                "earliest" | "latest" | "splunk_server"
            ));
        }
    }
}

#[test]
fn where_function_conditions() {
    let cases: &[(&str, &str, &str, &str)] = &[
        (
            r#"index=network | where cidrmatch("10.0.0.0/8", src_ip)"#,
            "src_ip",
            "cidrmatch",
            "10.0.0.0/8",
        ),
        (
            r#"index=main | where match(CommandLine, "(?i)invoke-mimikatz")"#,
            "CommandLine",
            "matches",
            "(?i)invoke-mimikatz",
        ),
        (
            r#"index=main | where like(process_name, "%.exe")"#,
            "process_name",
            "like",
            "*.exe",
        ),
    ];

    for (query, field, operator, value) in cases {
        let result = extract_conditions(query);
        let cond = result
            .conditions
            .iter()
            .find(|c| c.operator == *operator)
            .unwrap_or_else(|| panic!("no {operator} condition for {query}"));
        assert_eq!(cond.field, *field);
        assert_eq!(cond.value, *value);
    }
}

#[test]
fn other_function_calls_do_not_emit() {
    // Comparisons inside unrecognized calls are argument expressions.
    let result = extract_conditions(r#"index=a | where if(status=200, "ok", "bad") = "ok""#);
    assert!(!result.conditions.iter().any(|c| c.field == "status"));

    let result = extract_conditions(r#"index=a | stats count(eval(status="x")) by user"#);
    assert!(!result.conditions.iter().any(|c| c.field == "status"));
}

#[test]
fn group_by_fields() {
    let cases: &[(&str, &[&str])] = &[
        ("index=main | stats count by user", &["user"]),
        ("index=main | stats count by user, host", &["user", "host"]),
        ("index=main | eventstats sum(bytes) by src_ip", &["src_ip"]),
        ("index=main | streamstats count by user", &["user"]),
        ("index=main | timechart count by host", &["host"]),
        ("index=main | chart count by src_ip", &["src_ip"]),
        ("index=main | chart count by src_ip over time", &["src_ip", "time"]),
        ("index=main | top limit=10 user by host", &["user", "host"]),
        ("index=main | stats count", &[]),
    ];

    for (query, expected) in cases {
        let result = extract_conditions(query);
        let got: Vec<&str> = result.group_by_fields.iter().map(String::as_str).collect();
        assert_eq!(&got, expected, "group-by mismatch for {query}");
    }
}

#[test]
fn tstats_basics() {
    let result =
        extract_conditions("| tstats count from datamodel=Endpoint.Processes by Processes.dest Processes.user");
    assert_eq!(result.errors, Vec::<String>::new());
    assert_eq!(result.commands[0], "tstats");
    assert_eq!(
        result.computed_fields.get("_datamodel").map(String::as_str),
        Some("Endpoint.Processes")
    );
    assert_eq!(result.group_by_fields, vec!["Processes.dest", "Processes.user"]);

    let result = extract_conditions("| tstats count WHERE index=* BY index sourcetype");
    assert_eq!(result.errors, Vec::<String>::new());
    assert_eq!(result.commands[0], "tstats");
    assert_eq!(find(&result, "index").value, "*");
    assert!(splq::is_statistical_query(&result));

    let result = extract_conditions(
        "| tstats count from datamodel=Authentication groupby Authentication.src Authentication.action",
    );
    assert_eq!(
        result.group_by_fields,
        vec!["Authentication.src", "Authentication.action"]
    );

    let result = extract_conditions(
        "| tstats count where index=main earliest=-24h latest=now by _time span=1h host | timechart span=1h sum(count) by host",
    );
    assert!(result.commands.contains(&"tstats".to_string()));
    assert_eq!(find(&result, "index").value, "main");
    assert!(result.group_by_fields.contains(&"_time".to_string()));
    assert!(result.group_by_fields.contains(&"host".to_string()));
}

#[test]
fn multisearch_branches_contribute_to_outer_result() {
    let result = extract_conditions(
        "| multisearch [search index=a error_code=5] [search index=b fail=1] | stats count by error_code",
    );

    assert_eq!(result.commands[0], "multisearch");
    let error_code = find(&result, "error_code");
    assert_eq!(error_code.value, "5");
    // Branch conditions carry the multisearch's stage index.
    assert_eq!(error_code.pipe_stage, 0);
    assert_eq!(find(&result, "fail").pipe_stage, 0);
    assert!(result.joins.is_empty());
}

#[test]
fn pipe_stages_are_monotonic() {
    let queries = [
        "index=main EventCode=4688 | eval cmd=lower(CommandLine) | rex field=CommandLine \"(?<extract>powershell)\" | where bytes > 1000 | search user=\"admin*\"",
        "a=1 b=2 | where c=3 | search d=4 e=5",
    ];
    for query in queries {
        let result = extract_conditions(query);
        let stages: Vec<usize> = result.conditions.iter().map(|c| c.pipe_stage).collect();
        assert!(
            stages.windows(2).all(|w| w[0] <= w[1]),
            "stages not monotonic for {query}: {stages:?}"
        );
    }
}

#[test]
fn mixed_pipeline() {
    let result = extract_conditions(
        r#"index=main EventCode=4688 | eval cmd=lower(CommandLine) | rex field=CommandLine "(?<extract>powershell)" | where bytes > 1000 | search user="admin*""#,
    );

    assert_eq!(find(&result, "EventCode").pipe_stage, 0);
    assert_eq!(find(&result, "bytes").pipe_stage, 3);
    assert_eq!(find(&result, "user").value, "admin*");
    assert_eq!(
        result.commands,
        vec!["search", "eval", "rex", "where", "search"]
    );
    assert_eq!(
        result.computed_fields.get("extract").map(String::as_str),
        Some("CommandLine")
    );
}
