//! Dotted-path field access over a row's cells.

use serde_json::Value as JsonValue;

use crate::store::Row;
use crate::types::CellValue;

/// Walk a dotted path (e.g. `"address.city"`) starting from a row's top-level
/// fields. At every step the current value must be a non-null object/map, else
/// the result is `Null`. Arrays are treated as opaque values, never traversed.
pub fn get_field_value(row: &Row, path: &str) -> CellValue {
    let mut segments = path.split('.');
    let Some(first) = segments.next() else {
        return CellValue::Null;
    };

    let Some(mut current) = row.cells.get(first).cloned() else {
        return CellValue::Null;
    };

    for segment in segments {
        current = match current {
            CellValue::Object(JsonValue::Object(map)) => {
                map.get(segment).cloned().map_or(CellValue::Null, json_to_cell)
            }
            _ => return CellValue::Null,
        };
    }

    current
}

/// Convert a `serde_json::Value` encountered while walking a nested object into
/// a `CellValue`, so dotted-path traversal stays within the tagged type.
fn json_to_cell(v: JsonValue) -> CellValue {
    match v {
        JsonValue::Null => CellValue::Null,
        JsonValue::Bool(b) => CellValue::Bool(b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Int(i)
            } else {
                CellValue::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        JsonValue::String(s) => CellValue::Str(s),
        JsonValue::Array(items) => {
            CellValue::Array(items.into_iter().map(json_to_cell).collect())
        }
        obj @ JsonValue::Object(_) => CellValue::Object(obj),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;
    use crate::types::RowId;

    fn row_with(cells: HashMap<String, CellValue>) -> Row {
        Row {
            id: RowId::Int(1),
            cells,
        }
    }

    #[test]
    fn top_level_field() {
        let mut cells = HashMap::new();
        cells.insert("name".into(), CellValue::Str("Alice".into()));
        let row = row_with(cells);
        assert_eq!(get_field_value(&row, "name"), CellValue::Str("Alice".into()));
    }

    #[test]
    fn nested_dotted_path() {
        let mut cells = HashMap::new();
        cells.insert(
            "address".into(),
            CellValue::Object(json!({"city": "Berlin", "zip": 10115})),
        );
        let row = row_with(cells);
        assert_eq!(
            get_field_value(&row, "address.city"),
            CellValue::Str("Berlin".into())
        );
        assert_eq!(get_field_value(&row, "address.zip"), CellValue::Int(10115));
    }

    #[test]
    fn missing_field_is_null() {
        let row = row_with(HashMap::new());
        assert_eq!(get_field_value(&row, "missing"), CellValue::Null);
    }

    #[test]
    fn traversal_through_non_object_is_null() {
        let mut cells = HashMap::new();
        cells.insert("age".into(), CellValue::Int(30));
        let row = row_with(cells);
        assert_eq!(get_field_value(&row, "age.years"), CellValue::Null);
    }

    #[test]
    fn traversal_through_null_intermediate_is_null() {
        let mut cells = HashMap::new();
        cells.insert("address".into(), CellValue::Null);
        let row = row_with(cells);
        assert_eq!(get_field_value(&row, "address.city"), CellValue::Null);
    }

    #[test]
    fn array_is_opaque_not_traversed() {
        let mut cells = HashMap::new();
        cells.insert(
            "tags".into(),
            CellValue::Array(vec![CellValue::Str("a".into())]),
        );
        let row = row_with(cells);
        assert_eq!(get_field_value(&row, "tags.0"), CellValue::Null);
    }

    #[test]
    fn missing_nested_key_is_null() {
        let mut cells = HashMap::new();
        cells.insert("address".into(), CellValue::Object(json!({"city": "Berlin"})));
        let row = row_with(cells);
        assert_eq!(get_field_value(&row, "address.country"), CellValue::Null);
    }

    #[test]
    fn deep_nesting_multiple_levels() {
        let mut cells = HashMap::new();
        cells.insert(
            "a".into(),
            CellValue::Object(json!({"b": {"c": {"d": 42}}})),
        );
        let row = row_with(cells);
        assert_eq!(get_field_value(&row, "a.b.c.d"), CellValue::Int(42));
    }
}
