//! Filter group compilation.

use serde_json::Value;

use crate::filter::group::{Filter, FilterGroup, GroupOperator};
use crate::filter::query::{BackendQuery, Combinator, FilterValue};

/// Compile a tree into the backend payload. `None` for a tree with no
/// leaves anywhere.
///
/// Operands are the compiled subgroups followed by the group's own leaves.
/// A single operand is returned as is, or wrapped in `not` under NOT.
/// Several operands under NOT compile to `not(and(...))`.
pub fn compile(group: &FilterGroup) -> Option<BackendQuery> {
    compile_where(group, &|_| true)
}

/// Like `compile`, skipping leaves that are not yet complete.
pub fn compile_complete(group: &FilterGroup) -> Option<BackendQuery> {
    compile_where(group, &Filter::is_complete)
}

/// Readable rendering of the compiled tree, `None` when it compiles to nothing.
pub fn render_text(group: &FilterGroup) -> Option<String> {
    compile(group).map(|query| query.to_string())
}

fn compile_where(group: &FilterGroup, keep: &dyn Fn(&Filter) -> bool) -> Option<BackendQuery> {
    let mut operands: Vec<BackendQuery> = group
        .groups
        .iter()
        .filter_map(|child| compile_where(child, keep))
        .collect();
    operands.extend(group.filters.iter().filter(|&f| keep(f)).map(compile_filter));

    match operands.len() {
        0 => None,
        1 => {
            let operand = operands.pop()?;
            Some(match group.operator {
                GroupOperator::Not => BackendQuery::not(operand),
                GroupOperator::And | GroupOperator::Or => operand,
            })
        }
        _ => Some(match group.operator {
            GroupOperator::And => BackendQuery::combined(Combinator::And, operands),
            GroupOperator::Or => BackendQuery::combined(Combinator::Or, operands),
            GroupOperator::Not => {
                BackendQuery::not(BackendQuery::combined(Combinator::And, operands))
            }
        }),
    }
}

fn compile_filter(filter: &Filter) -> BackendQuery {
    let value = if filter.comparator.takes_list() {
        FilterValue::List(filter.values.clone())
    } else {
        FilterValue::Single(filter.value.clone().unwrap_or(Value::Null))
    };
    BackendQuery::Predicate {
        field: filter.field.clone(),
        comparator: filter.comparator,
        value,
    }
}
