use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// A single `(columnId, direction)` pair; leftmost in a `Vec<SortConfig>` is primary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortConfig {
    pub column_id: String,
    pub direction: SortDirection,
}

/// Caller-provided row identity. A data source's rows are keyed by one of these.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowId {
    Str(String),
    Int(i64),
}

impl From<&str> for RowId {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<i64> for RowId {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

/// A tagged cell value. Replaces ad-hoc `serde_json::Value` dispatch with an
/// explicit sum so comparison/filter operators can match on a closed set of tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Epoch milliseconds.
    Timestamp(i64),
    Array(Vec<CellValue>),
    /// Opaque passthrough for nested structures the engine never interprets directly.
    Object(serde_json::Value),
}

impl CellValue {
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Coerce to `f64` where numerically meaningful.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Timestamp(t) => Some(*t as f64),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Str(s) => s.parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Render to a comma-joined sorted string, for the locale-compare fallback
    /// used when two arrays are compared.
    pub fn joined_sorted_string(&self) -> String {
        match self {
            Self::Array(items) => {
                let mut parts: Vec<String> = items.iter().map(Self::render).collect();
                parts.sort();
                parts.join(",")
            }
            other => other.render(),
        }
    }

    /// Stable string key used to deduplicate values in a distinct-value set;
    /// values that render identically are treated as the same distinct value.
    pub fn dedupe_key(&self) -> String {
        self.render()
    }

    fn render(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Str(s) => s.clone(),
            Self::Timestamp(t) => t.to_string(),
            Self::Array(items) => {
                let parts: Vec<String> = items.iter().map(Self::render).collect();
                format!("[{}]", parts.join(","))
            }
            Self::Object(v) => v.to_string(),
        }
    }
}

/// The declared type of a column's cells, used by the renderer to pick an
/// editor/formatter; the engine itself only dispatches on `CellValue`'s tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CellDataType {
    Text,
    Number,
    Boolean,
    Date,
    DateString,
    DateTime,
    DateTimeString,
    Object,
}

/// A column definition (§6). Renderer hooks (`cellRenderer` etc.) are
/// represented as opaque string tags the host resolves to an actual
/// component — the engine never invokes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDef {
    pub field: String,
    pub col_id: Option<String>,
    pub cell_data_type: CellDataType,
    pub width: f64,
    pub min_width: Option<f64>,
    pub max_width: Option<f64>,
    pub header_name: Option<String>,
    pub sortable: bool,
    pub filterable: bool,
    pub editable: bool,
    pub movable: bool,
    pub resizable: bool,
    pub hidden: bool,
    pub pinned: Option<PinnedSide>,
    pub cell_renderer: Option<String>,
    pub edit_renderer: Option<String>,
    pub header_renderer: Option<String>,
}

impl ColumnDef {
    /// `colId` defaults to `field` when absent.
    pub fn resolved_col_id(&self) -> &str {
        self.col_id.as_deref().unwrap_or(&self.field)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinnedSide {
    Left,
    Right,
}

/// Direct (non-hash-accelerated) comparator, used as fallback when a hash cache
/// entry is missing. Nulls sort after all non-null values, regardless of direction.
pub fn compare_cell_values(a: &CellValue, b: &CellValue) -> Ordering {
    match (a, b) {
        (CellValue::Null, CellValue::Null) => Ordering::Equal,
        (CellValue::Null, _) => Ordering::Greater,
        (_, CellValue::Null) => Ordering::Less,
        (CellValue::Array(_), CellValue::Array(_)) => {
            a.joined_sorted_string().cmp(&b.joined_sorted_string())
        }
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => a.joined_sorted_string().cmp(&b.joined_sorted_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nulls_sort_after_non_null_regardless_of_direction() {
        assert_eq!(
            compare_cell_values(&CellValue::Null, &CellValue::Int(1)),
            Ordering::Greater
        );
        assert_eq!(
            compare_cell_values(&CellValue::Int(1), &CellValue::Null),
            Ordering::Less
        );
        assert_eq!(
            compare_cell_values(&CellValue::Null, &CellValue::Null),
            Ordering::Equal
        );
    }

    #[test]
    fn numeric_coercible_compares_numerically() {
        assert_eq!(
            compare_cell_values(&CellValue::Int(5), &CellValue::Float(5.5)),
            Ordering::Less
        );
    }

    #[test]
    fn array_compares_via_joined_sorted_string() {
        let a = CellValue::Array(vec![CellValue::Int(3), CellValue::Int(1)]);
        let b = CellValue::Array(vec![CellValue::Int(1), CellValue::Int(3)]);
        assert_eq!(compare_cell_values(&a, &b), Ordering::Equal);
    }

    #[test]
    fn fallback_string_comparison_for_non_numeric() {
        assert_eq!(
            compare_cell_values(&CellValue::Str("apple".into()), &CellValue::Str("banana".into())),
            Ordering::Less
        );
    }
}
