//! Backend boolean-filter payload.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::filter::group::Comparator;

/// Combinators the backend grammar accepts for multi-operand nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    And,
    Or,
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Combinator::And => write!(f, "AND"),
            Combinator::Or => write!(f, "OR"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotOperator {
    Not,
}

/// Predicate operand: one value, or a list for the `containsAny`/`containsAll`
/// comparators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    List(Vec<Value>),
    Single(Value),
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Single(value) => write!(f, "{}", value),
            FilterValue::List(values) => {
                write!(f, "[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// One node of the compiled query tree.
///
/// Serializes to `{field, comparator, value}`, `{combinator, operands}` or
/// `{operator: "not", operand}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BackendQuery {
    Not {
        operator: NotOperator,
        operand: Box<BackendQuery>,
    },
    Combined {
        combinator: Combinator,
        operands: Vec<BackendQuery>,
    },
    Predicate {
        field: String,
        comparator: Comparator,
        value: FilterValue,
    },
}

impl BackendQuery {
    pub fn not(operand: BackendQuery) -> Self {
        BackendQuery::Not {
            operator: NotOperator::Not,
            operand: Box::new(operand),
        }
    }

    pub fn combined(combinator: Combinator, operands: Vec<BackendQuery>) -> Self {
        BackendQuery::Combined {
            combinator,
            operands,
        }
    }

    /// Number of predicate leaves in the tree.
    pub fn predicate_count(&self) -> usize {
        match self {
            BackendQuery::Predicate { .. } => 1,
            BackendQuery::Not { operand, .. } => operand.predicate_count(),
            BackendQuery::Combined { operands, .. } => {
                operands.iter().map(BackendQuery::predicate_count).sum()
            }
        }
    }
}

/// Human-readable rendering, e.g. `(year > 2000 AND NOT (genre = "drama"))`.
impl fmt::Display for BackendQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendQuery::Predicate {
                field,
                comparator: Comparator::IsNull,
                value,
            } => match value {
                FilterValue::Single(Value::Bool(false)) => write!(f, "{} IS NOT NULL", field),
                _ => write!(f, "{} IS NULL", field),
            },
            BackendQuery::Predicate {
                field,
                comparator,
                value,
            } => write!(f, "{} {} {}", field, comparator.symbol(), value),
            BackendQuery::Not { operand, .. } => match operand.as_ref() {
                BackendQuery::Combined { .. } => write!(f, "NOT {}", operand),
                _ => write!(f, "NOT ({})", operand),
            },
            BackendQuery::Combined {
                combinator,
                operands,
            } => {
                write!(f, "(")?;
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", combinator)?;
                    }
                    write!(f, "{}", operand)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn predicate(field: &str, comparator: Comparator, value: Value) -> BackendQuery {
        BackendQuery::Predicate {
            field: field.to_string(),
            comparator,
            value: FilterValue::Single(value),
        }
    }

    #[test]
    fn test_payload_shape() {
        let query = BackendQuery::combined(
            Combinator::Or,
            vec![
                predicate("year", Comparator::GreaterThan, json!(2000)),
                BackendQuery::not(predicate("genre", Comparator::Equal, json!("drama"))),
            ],
        );

        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            json!({
                "combinator": "or",
                "operands": [
                    {"field": "year", "comparator": "greaterThan", "value": 2000},
                    {"operator": "not", "operand": {"field": "genre", "comparator": "equal", "value": "drama"}}
                ]
            })
        );
    }

    #[test]
    fn test_payload_decodes_back() {
        let raw = json!({
            "operator": "not",
            "operand": {
                "combinator": "and",
                "operands": [
                    {"field": "tags", "comparator": "containsAny", "value": ["a", "b"]},
                    {"field": "title", "comparator": "like", "value": "star*"}
                ]
            }
        });
        let query: BackendQuery = serde_json::from_value(raw).unwrap();
        assert_eq!(query.predicate_count(), 2);
        match query {
            BackendQuery::Not { operand, .. } => match *operand {
                BackendQuery::Combined { operands, .. } => assert!(matches!(
                    &operands[0],
                    BackendQuery::Predicate {
                        value: FilterValue::List(values),
                        ..
                    } if values.len() == 2
                )),
                other => panic!("expected combined operand, got {:?}", other),
            },
            other => panic!("expected not node, got {:?}", other),
        }
    }

    #[test]
    fn test_display() {
        let query = BackendQuery::combined(
            Combinator::And,
            vec![
                predicate("year", Comparator::GreaterThan, json!(2000)),
                BackendQuery::not(predicate("genre", Comparator::Equal, json!("drama"))),
            ],
        );
        assert_eq!(query.to_string(), r#"(year > 2000 AND NOT (genre = "drama"))"#);

        assert_eq!(
            predicate("director", Comparator::IsNull, json!(false)).to_string(),
            "director IS NOT NULL"
        );
        let list = BackendQuery::Predicate {
            field: "tags".to_string(),
            comparator: Comparator::ContainsAll,
            value: FilterValue::List(vec![json!("a"), json!(1)]),
        };
        assert_eq!(list.to_string(), r#"tags CONTAINS ALL ["a", 1]"#);
    }
}
