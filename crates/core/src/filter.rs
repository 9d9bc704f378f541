//! Column filter model and evaluator (§3 "Filter model"). Generalizes the
//! teacher's single-operator `FilterCondition` into per-column condition
//! chains with left-to-right combinators, operating on the tagged
//! [`CellValue`] instead of raw `serde_json::Value`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::CellValue;

/// How two conditions (or a `ColumnFilter`'s whole condition list, when no
/// per-condition `next_operator` is set) combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    And,
    Or,
}

/// The three condition flavors a column filter popup offers. Each restricts
/// which operators are meaningful, but all are represented uniformly so the
/// evaluator stays a single dispatch over `CellValue`'s tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionKind {
    Text,
    Number,
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Between,
    Blank,
    NotBlank,
}

/// One condition in a column's filter chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub kind: ConditionKind,
    pub operator: FilterOperator,
    /// Primary comparison value. Unused by `Blank`/`NotBlank`.
    pub value: Option<CellValue>,
    /// Secondary value, only meaningful for `Between`.
    pub secondary_value: Option<CellValue>,
    /// When present, this condition is a checkbox-style membership test and
    /// `operator`/`value` are ignored: the cell passes iff it equals one of
    /// these values.
    pub selected_values: Option<Vec<CellValue>>,
    /// Combinator joining this condition to the next one in the chain. The
    /// last condition's `next_operator` is unused.
    pub next_operator: Option<Combinator>,
}

impl Condition {
    fn matches(&self, cell: &CellValue) -> bool {
        if let Some(selected) = &self.selected_values {
            return selected.contains(cell);
        }
        match self.operator {
            FilterOperator::Blank => cell.is_null() || cell.as_str() == Some(""),
            FilterOperator::NotBlank => !(cell.is_null() || cell.as_str() == Some("")),
            _ => self.value.as_ref().is_some_and(|value| match self.kind {
                ConditionKind::Text => text_matches(cell, self.operator, value),
                ConditionKind::Number | ConditionKind::Date => {
                    numeric_matches(cell, self.operator, value, self.secondary_value.as_ref())
                }
            }),
        }
    }
}

fn text_matches(cell: &CellValue, op: FilterOperator, value: &CellValue) -> bool {
    let (Some(cell_s), Some(value_s)) = (cell.as_str().or(Some("")), value.as_str()) else {
        return false;
    };
    let cell_s = cell_s.to_lowercase();
    let value_s = value_s.to_lowercase();
    match op {
        FilterOperator::Equals => cell_s == value_s,
        FilterOperator::NotEquals => cell_s != value_s,
        FilterOperator::Contains => cell_s.contains(&value_s),
        FilterOperator::NotContains => !cell_s.contains(&value_s),
        FilterOperator::StartsWith => cell_s.starts_with(&value_s),
        FilterOperator::EndsWith => cell_s.ends_with(&value_s),
        FilterOperator::GreaterThan => cell_s > value_s,
        FilterOperator::GreaterThanOrEqual => cell_s >= value_s,
        FilterOperator::LessThan => cell_s < value_s,
        FilterOperator::LessThanOrEqual => cell_s <= value_s,
        FilterOperator::Between | FilterOperator::Blank | FilterOperator::NotBlank => false,
    }
}

fn numeric_matches(
    cell: &CellValue,
    op: FilterOperator,
    value: &CellValue,
    secondary: Option<&CellValue>,
) -> bool {
    let Some(cell_n) = cell.as_f64() else {
        return false;
    };
    let Some(value_n) = value.as_f64() else {
        return false;
    };
    match op {
        FilterOperator::Equals => (cell_n - value_n).abs() < f64::EPSILON,
        FilterOperator::NotEquals => (cell_n - value_n).abs() >= f64::EPSILON,
        FilterOperator::GreaterThan => cell_n > value_n,
        FilterOperator::GreaterThanOrEqual => cell_n >= value_n,
        FilterOperator::LessThan => cell_n < value_n,
        FilterOperator::LessThanOrEqual => cell_n <= value_n,
        FilterOperator::Between => secondary.and_then(CellValue::as_f64).is_some_and(|hi| {
            let (lo, hi) = if value_n <= hi { (value_n, hi) } else { (hi, value_n) };
            cell_n >= lo && cell_n <= hi
        }),
        FilterOperator::Contains
        | FilterOperator::NotContains
        | FilterOperator::StartsWith
        | FilterOperator::EndsWith
        | FilterOperator::Blank
        | FilterOperator::NotBlank => false,
    }
}

/// A column's full filter: a left-to-right chain of conditions joined by
/// each condition's `next_operator`, falling back to `combination` for any
/// condition that doesn't specify one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnFilter {
    pub conditions: Vec<Condition>,
    pub combination: Combinator,
}

impl ColumnFilter {
    pub fn matches(&self, cell: &CellValue) -> bool {
        let Some((first, rest)) = self.conditions.split_first() else {
            return true;
        };
        let mut result = first.matches(cell);
        let mut combinator = first.next_operator.unwrap_or(self.combination);
        for condition in rest {
            let next = condition.matches(cell);
            result = match combinator {
                Combinator::And => result && next,
                Combinator::Or => result || next,
            };
            combinator = condition.next_operator.unwrap_or(self.combination);
        }
        result
    }
}

/// `columnId -> ColumnFilter`. Columns absent from the map impose no
/// constraint; every present column's filter must pass (logical AND across
/// columns).
pub type FilterModel = HashMap<String, ColumnFilter>;

/// Evaluate a row's cells against a filter model. `field_value` resolves a
/// column id to the value to test — callers pass the dotted-path accessor.
pub fn row_matches(model: &FilterModel, mut field_value: impl FnMut(&str) -> CellValue) -> bool {
    model
        .iter()
        .all(|(column_id, filter)| filter.matches(&field_value(column_id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_condition(op: FilterOperator, value: &str) -> Condition {
        Condition {
            kind: ConditionKind::Text,
            operator: op,
            value: Some(CellValue::Str(value.to_string())),
            secondary_value: None,
            selected_values: None,
            next_operator: None,
        }
    }

    fn number_condition(op: FilterOperator, value: f64) -> Condition {
        Condition {
            kind: ConditionKind::Number,
            operator: op,
            value: Some(CellValue::Float(value)),
            secondary_value: None,
            selected_values: None,
            next_operator: None,
        }
    }

    #[test]
    fn text_contains_is_case_insensitive() {
        let filter = ColumnFilter {
            conditions: vec![text_condition(FilterOperator::Contains, "A")],
            combination: Combinator::And,
        };
        assert!(filter.matches(&CellValue::Str("Charlie".into())));
        assert!(!filter.matches(&CellValue::Str("xyz".into())));
    }

    #[test]
    fn number_greater_or_equal() {
        let filter = ColumnFilter {
            conditions: vec![number_condition(FilterOperator::GreaterThanOrEqual, 28.0)],
            combination: Combinator::And,
        };
        assert!(filter.matches(&CellValue::Int(28)));
        assert!(filter.matches(&CellValue::Int(35)));
        assert!(!filter.matches(&CellValue::Int(20)));
    }

    #[test]
    fn between_is_order_independent_on_endpoints() {
        let mut cond = number_condition(FilterOperator::Between, 10.0);
        cond.secondary_value = Some(CellValue::Float(5.0));
        let filter = ColumnFilter {
            conditions: vec![cond],
            combination: Combinator::And,
        };
        assert!(filter.matches(&CellValue::Int(7)));
        assert!(!filter.matches(&CellValue::Int(11)));
    }

    #[test]
    fn left_to_right_chain_with_mixed_combinators() {
        // age >= 28 AND age < 40, OR age == 0 (contrived chain exercising
        // per-condition next_operator rather than the top-level combination).
        let mut ge28 = number_condition(FilterOperator::GreaterThanOrEqual, 28.0);
        ge28.next_operator = Some(Combinator::And);
        let mut lt40 = number_condition(FilterOperator::LessThan, 40.0);
        lt40.next_operator = Some(Combinator::Or);
        let eq0 = number_condition(FilterOperator::Equals, 0.0);

        let filter = ColumnFilter {
            conditions: vec![ge28, lt40, eq0],
            combination: Combinator::And,
        };
        assert!(filter.matches(&CellValue::Int(30)));
        assert!(filter.matches(&CellValue::Int(0)));
        assert!(!filter.matches(&CellValue::Int(50)));
    }

    #[test]
    fn selected_values_is_membership_test_ignoring_operator() {
        let condition = Condition {
            kind: ConditionKind::Text,
            operator: FilterOperator::Equals,
            value: Some(CellValue::Str("ignored".into())),
            secondary_value: None,
            selected_values: Some(vec![CellValue::Str("red".into()), CellValue::Str("blue".into())]),
            next_operator: None,
        };
        let filter = ColumnFilter {
            conditions: vec![condition],
            combination: Combinator::And,
        };
        assert!(filter.matches(&CellValue::Str("red".into())));
        assert!(!filter.matches(&CellValue::Str("green".into())));
    }

    #[test]
    fn blank_and_not_blank() {
        let blank = ColumnFilter {
            conditions: vec![Condition {
                kind: ConditionKind::Text,
                operator: FilterOperator::Blank,
                value: None,
                secondary_value: None,
                selected_values: None,
                next_operator: None,
            }],
            combination: Combinator::And,
        };
        assert!(blank.matches(&CellValue::Null));
        assert!(blank.matches(&CellValue::Str(String::new())));
        assert!(!blank.matches(&CellValue::Str("x".into())));
    }

    #[test]
    fn empty_filter_model_passes_every_row() {
        let model: FilterModel = FilterModel::new();
        assert!(row_matches(&model, |_| CellValue::Null));
    }

    #[test]
    fn filter_model_requires_every_column_to_pass() {
        let mut model: FilterModel = FilterModel::new();
        model.insert(
            "name".to_string(),
            ColumnFilter {
                conditions: vec![text_condition(FilterOperator::Contains, "a")],
                combination: Combinator::And,
            },
        );
        model.insert(
            "age".to_string(),
            ColumnFilter {
                conditions: vec![number_condition(FilterOperator::GreaterThanOrEqual, 28.0)],
                combination: Combinator::And,
            },
        );

        let values: HashMap<&str, CellValue> = HashMap::from([
            ("name", CellValue::Str("Charlie".into())),
            ("age", CellValue::Int(35)),
        ]);
        assert!(row_matches(&model, |col| values
            .get(col)
            .cloned()
            .unwrap_or(CellValue::Null)));

        let values_fail: HashMap<&str, CellValue> = HashMap::from([
            ("name", CellValue::Str("Charlie".into())),
            ("age", CellValue::Int(20)),
        ]);
        assert!(!row_matches(&model, |col| values_fail
            .get(col)
            .cloned()
            .unwrap_or(CellValue::Null)));
    }
}
