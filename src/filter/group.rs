//! Filter group tree and its editing primitives.
//!
//! Editing is addressed by node id. A primitive whose target id does not
//! exist returns an unchanged copy of the tree.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

fn fresh_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

/// Leaf comparison operators, named as the backend names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Comparator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
    Like,
    ContainsAny,
    ContainsAll,
    IsNull,
}

impl Comparator {
    /// Whether the operand is a list of values rather than a single one.
    pub fn takes_list(&self) -> bool {
        matches!(self, Comparator::ContainsAny | Comparator::ContainsAll)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Comparator::Equal => "=",
            Comparator::NotEqual => "!=",
            Comparator::GreaterThan => ">",
            Comparator::GreaterThanEqual => ">=",
            Comparator::LessThan => "<",
            Comparator::LessThanEqual => "<=",
            Comparator::Like => "LIKE",
            Comparator::ContainsAny => "CONTAINS ANY",
            Comparator::ContainsAll => "CONTAINS ALL",
            Comparator::IsNull => "IS NULL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GroupOperator {
    #[default]
    And,
    Or,
    Not,
}

impl fmt::Display for GroupOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupOperator::And => write!(f, "AND"),
            GroupOperator::Or => write!(f, "OR"),
            GroupOperator::Not => write!(f, "NOT"),
        }
    }
}

/// A leaf predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub id: String,
    pub field: String,
    pub comparator: Comparator,
    /// Operand for single-value comparators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Operand for list comparators.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<Value>,
}

impl Filter {
    pub fn new(field: &str, comparator: Comparator, value: Value) -> Self {
        Self {
            id: fresh_id("filter"),
            field: field.to_string(),
            comparator,
            value: Some(value),
            values: Vec::new(),
        }
    }

    pub fn with_values(field: &str, comparator: Comparator, values: Vec<Value>) -> Self {
        Self {
            id: fresh_id("filter"),
            field: field.to_string(),
            comparator,
            value: None,
            values,
        }
    }

    /// Whether the leaf carries everything its comparator needs.
    pub fn is_complete(&self) -> bool {
        if self.field.trim().is_empty() {
            return false;
        }
        match self.comparator {
            Comparator::ContainsAny | Comparator::ContainsAll => !self.values.is_empty(),
            Comparator::IsNull => matches!(self.value, Some(Value::Bool(_))),
            _ => !matches!(self.value, None | Some(Value::Null)),
        }
    }

    fn cloned_with_fresh_id(&self) -> Self {
        Self {
            id: fresh_id("filter"),
            ..self.clone()
        }
    }
}

/// Field-level replacement for one group. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupPatch {
    pub operator: Option<GroupOperator>,
    pub filters: Option<Vec<Filter>>,
    pub groups: Option<Vec<FilterGroup>>,
}

/// A node of the boolean expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterGroup {
    pub id: String,
    pub operator: GroupOperator,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub groups: Vec<FilterGroup>,
}

impl Default for FilterGroup {
    fn default() -> Self {
        Self::new(GroupOperator::And)
    }
}

impl FilterGroup {
    /// An empty group with a fresh id.
    pub fn new(operator: GroupOperator) -> Self {
        Self {
            id: fresh_id("group"),
            operator,
            filters: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// Depth-first search by group id, this node included.
    pub fn find(&self, id: &str) -> Option<&FilterGroup> {
        if self.id == id {
            return Some(self);
        }
        self.groups.iter().find_map(|g| g.find(id))
    }

    pub fn update(&self, id: &str, patch: &GroupPatch) -> FilterGroup {
        self.rewrite(id, &|group: &FilterGroup| FilterGroup {
            id: group.id.clone(),
            operator: patch.operator.unwrap_or(group.operator),
            filters: patch.filters.clone().unwrap_or_else(|| group.filters.clone()),
            groups: patch.groups.clone().unwrap_or_else(|| group.groups.clone()),
        })
    }

    pub fn with_operator(&self, id: &str, operator: GroupOperator) -> FilterGroup {
        self.rewrite(id, &|group: &FilterGroup| FilterGroup {
            operator,
            ..group.clone()
        })
    }

    /// Append a leaf to the group `group_id`.
    pub fn with_filter(&self, group_id: &str, filter: Filter) -> FilterGroup {
        self.rewrite(group_id, &|group: &FilterGroup| {
            let mut next = group.clone();
            next.filters.push(filter.clone());
            next
        })
    }

    /// Replace the leaf with the same id inside group `group_id`.
    pub fn with_replaced_filter(&self, group_id: &str, filter: Filter) -> FilterGroup {
        self.rewrite(group_id, &|group: &FilterGroup| {
            let mut next = group.clone();
            for slot in next.filters.iter_mut().filter(|f| f.id == filter.id) {
                *slot = filter.clone();
            }
            next
        })
    }

    pub fn without_filter(&self, group_id: &str, filter_id: &str) -> FilterGroup {
        self.rewrite(group_id, &|group: &FilterGroup| {
            let mut next = group.clone();
            next.filters.retain(|f| f.id != filter_id);
            next
        })
    }

    /// Append `subgroup` as the last child of `parent_id`.
    pub fn with_subgroup(&self, parent_id: &str, subgroup: FilterGroup) -> FilterGroup {
        self.rewrite(parent_id, &|group: &FilterGroup| {
            let mut next = group.clone();
            next.groups.push(subgroup.clone());
            next
        })
    }

    pub fn without_subgroup(&self, parent_id: &str, subgroup_id: &str) -> FilterGroup {
        self.rewrite(parent_id, &|group: &FilterGroup| {
            let mut next = group.clone();
            next.groups.retain(|g| g.id != subgroup_id);
            next
        })
    }

    /// Leaves in this group and all descendants.
    pub fn filter_count(&self) -> usize {
        self.filters.len() + self.groups.iter().map(FilterGroup::filter_count).sum::<usize>()
    }

    /// No leaves and no subgroups at this node.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty() && self.groups.is_empty()
    }

    /// Copy of the tree with a fresh id on every group and leaf.
    pub fn deep_clone(&self) -> FilterGroup {
        FilterGroup {
            id: fresh_id("group"),
            operator: self.operator,
            filters: self.filters.iter().map(Filter::cloned_with_fresh_id).collect(),
            groups: self.groups.iter().map(FilterGroup::deep_clone).collect(),
        }
    }

    /// Every group id and leaf id in the tree.
    pub fn ids(&self) -> Vec<String> {
        let mut ids = vec![self.id.clone()];
        ids.extend(self.filters.iter().map(|f| f.id.clone()));
        for group in &self.groups {
            ids.extend(group.ids());
        }
        ids
    }

    /// Copy of the tree with the node `id` replaced by `f(node)`.
    fn rewrite<F>(&self, id: &str, f: &F) -> FilterGroup
    where
        F: Fn(&FilterGroup) -> FilterGroup,
    {
        if self.id == id {
            return f(self);
        }
        FilterGroup {
            id: self.id.clone(),
            operator: self.operator,
            filters: self.filters.clone(),
            groups: self.groups.iter().map(|g| g.rewrite(id, f)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn sample() -> FilterGroup {
        let root = FilterGroup::new(GroupOperator::And);
        let child = FilterGroup::new(GroupOperator::Or);
        let child_id = child.id.clone();
        root.with_filter(&root.id, Filter::new("year", Comparator::GreaterThan, json!(2000)))
            .with_subgroup(&root.id, child)
            .with_filter(&child_id, Filter::new("genre", Comparator::Equal, json!("drama")))
    }

    #[test]
    fn test_editing_returns_new_tree() {
        let root = FilterGroup::new(GroupOperator::And);
        let edited = root.with_filter(&root.id, Filter::new("a", Comparator::Equal, json!(1)));

        assert!(root.is_empty());
        assert_eq!(edited.filter_count(), 1);
        assert_eq!(edited.id, root.id);
    }

    #[test]
    fn test_nested_edits_by_id() {
        let tree = sample();
        let child_id = tree.groups[0].id.clone();
        assert_eq!(tree.filter_count(), 2);
        assert_eq!(tree.find(&child_id).unwrap().operator, GroupOperator::Or);

        let leaf_id = tree.groups[0].filters[0].id.clone();
        let trimmed = tree.without_filter(&child_id, &leaf_id);
        assert_eq!(trimmed.filter_count(), 1);
        assert!(trimmed.find(&child_id).unwrap().is_empty());

        let negated = tree.with_operator(&child_id, GroupOperator::Not);
        assert_eq!(negated.find(&child_id).unwrap().operator, GroupOperator::Not);
        assert_eq!(tree.find(&child_id).unwrap().operator, GroupOperator::Or);

        let pruned = tree.without_subgroup(&tree.id, &child_id);
        assert!(pruned.find(&child_id).is_none());
        assert_eq!(pruned.filter_count(), 1);
    }

    #[test]
    fn test_update_and_replace() {
        let tree = sample();
        let patched = tree.update(
            &tree.id,
            &GroupPatch {
                operator: Some(GroupOperator::Or),
                filters: Some(Vec::new()),
                groups: None,
            },
        );
        assert_eq!(patched.operator, GroupOperator::Or);
        assert!(patched.filters.is_empty());
        assert_eq!(patched.groups.len(), 1);

        let mut leaf = tree.filters[0].clone();
        leaf.value = Some(json!(1990));
        let replaced = tree.with_replaced_filter(&tree.id, leaf);
        assert_eq!(replaced.filters[0].value, Some(json!(1990)));
        assert_eq!(tree.filters[0].value, Some(json!(2000)));
    }

    #[test]
    fn test_unknown_id_is_a_no_op() {
        let tree = sample();
        let same = tree.with_filter("group-missing", Filter::new("x", Comparator::Equal, json!(1)));
        assert_eq!(same, tree);
    }

    #[test]
    fn test_filter_completeness() {
        assert!(Filter::new("year", Comparator::Equal, json!(1)).is_complete());
        assert!(!Filter::new(" ", Comparator::Equal, json!(1)).is_complete());
        assert!(!Filter::new("year", Comparator::Equal, Value::Null).is_complete());
        assert!(!Filter::with_values("tags", Comparator::ContainsAny, vec![]).is_complete());
        assert!(Filter::with_values("tags", Comparator::ContainsAny, vec![json!("a")]).is_complete());
        assert!(Filter::new("director", Comparator::IsNull, json!(true)).is_complete());
        assert!(!Filter::new("director", Comparator::IsNull, json!("yes")).is_complete());
    }

    #[test]
    fn test_serialized_shape() {
        let group = FilterGroup::new(GroupOperator::Not);
        let value = serde_json::to_value(&group).unwrap();
        assert_eq!(value["operator"], json!("NOT"));
        assert_eq!(value["filters"], json!([]));
        assert!(value["id"].as_str().unwrap().starts_with("group-"));
    }

    fn arb_tree() -> impl Strategy<Value = FilterGroup> {
        let operator = prop_oneof![
            Just(GroupOperator::And),
            Just(GroupOperator::Or),
            Just(GroupOperator::Not)
        ];
        let leaf = (operator.clone(), 0usize..3).prop_map(|(op, n)| {
            let mut group = FilterGroup::new(op);
            for i in 0..n {
                group.filters.push(Filter::new(&format!("f{}", i), Comparator::Equal, json!(i)));
            }
            group
        });
        leaf.prop_recursive(3, 24, 3, move |inner| {
            (operator.clone(), prop::collection::vec(inner, 0..3), 0usize..3).prop_map(
                |(op, groups, n)| {
                    let mut group = FilterGroup::new(op);
                    group.groups = groups;
                    for i in 0..n {
                        group
                            .filters
                            .push(Filter::new(&format!("g{}", i), Comparator::Like, json!("x*")));
                    }
                    group
                },
            )
        })
    }

    proptest! {
        #[test]
        fn prop_clone_shares_no_ids(tree in arb_tree()) {
            let clone = tree.deep_clone();
            let original: HashSet<String> = tree.ids().into_iter().collect();
            prop_assert!(clone.ids().iter().all(|id| !original.contains(id)));
            prop_assert_eq!(clone.filter_count(), tree.filter_count());
        }

        #[test]
        fn prop_editing_clone_leaves_original(tree in arb_tree()) {
            let snapshot = tree.clone();
            let clone = tree.deep_clone();

            let edited = clone
                .with_filter(&clone.id, Filter::new("extra", Comparator::Equal, json!(0)))
                .with_operator(&clone.id, GroupOperator::Or)
                .with_subgroup(&clone.id, FilterGroup::new(GroupOperator::Not));

            prop_assert_eq!(&tree, &snapshot);
            prop_assert_eq!(edited.filter_count(), tree.filter_count() + 1);
        }
    }
}
