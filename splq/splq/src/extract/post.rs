//! Post-processing over the emitted condition list: OR-grouping and the
//! opt-in per-field deduplication helper.

use std::collections::{HashMap, HashSet};

use super::result::{Condition, LogicalOp};

/// Group runs of OR-connected conditions on the same field and operator
/// into one condition carrying the alternatives.
///
/// Idempotent: running it over an already-grouped list changes nothing,
/// because the neighbor that stopped a group still stops it.
pub(crate) fn group_or_conditions(conditions: Vec<Condition>) -> Vec<Condition> {
    let mut result = Vec::with_capacity(conditions.len());

    let mut i = 0;
    while i < conditions.len() {
        let mut cond = conditions[i].clone();

        if i + 1 < conditions.len() && conditions[i + 1].logical_op == LogicalOp::Or {
            let field_lower = cond.field.to_lowercase();
            let mut alternatives = cond
                .alternatives
                .clone()
                .unwrap_or_else(|| vec![cond.value.clone()]);

            let mut j = i + 1;
            while j < conditions.len() {
                let next = &conditions[j];
                if next.logical_op == LogicalOp::Or
                    && next.field.to_lowercase() == field_lower
                    && next.operator == cond.operator
                {
                    match &next.alternatives {
                        Some(alts) => alternatives.extend(alts.iter().cloned()),
                        None => alternatives.push(next.value.clone()),
                    }
                    j += 1;
                } else {
                    break;
                }
            }

            if j > i + 1 {
                cond.alternatives = Some(alternatives);
                result.push(cond);
                i = j;
                continue;
            }
        }

        result.push(cond);
        i += 1;
    }

    result
}

/// Collapse repeated filters on the same field, keeping only the latest
/// pipe stage per field and dropping pure wildcards.
pub fn deduplicate_conditions(conditions: &[Condition]) -> Vec<Condition> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<&Condition>> = HashMap::new();

    for cond in conditions {
        // A bare `field=*` matches everything; it never survives dedup.
        if cond.value == "*" {
            continue;
        }
        let key = cond.field.to_lowercase();
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(cond);
    }

    let mut result = Vec::new();
    for key in order {
        let conds = &groups[&key];
        let max_stage = conds.iter().map(|c| c.pipe_stage).max().unwrap_or(0);

        let mut seen = HashSet::new();
        for cond in conds {
            if cond.pipe_stage == max_stage {
                let dedup_key = format!(
                    "{}|{}|{}",
                    cond.field.to_lowercase(),
                    cond.operator,
                    cond.value
                );
                if seen.insert(dedup_key) {
                    result.push((*cond).clone());
                }
            }
        }
    }

    result
}
