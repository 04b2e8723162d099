pub mod google_sheets;
pub mod integrations;
pub mod leads;
pub mod oauth;
pub mod submit;
pub mod widgets;

use serde_json::Value;

/// `n`, `"n"` or a list of either. Anything unparsable is dropped.
pub(crate) fn ids_from_value(v: &Value) -> Vec<i64> {
    fn one(v: &Value) -> Option<i64> {
        match v {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
    match v {
        Value::Array(items) => items.iter().filter_map(one).collect(),
        other => one(other).into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::ids_from_value;
    use serde_json::json;

    #[test]
    fn ids_accept_scalars_and_lists() {
        assert_eq!(ids_from_value(&json!(4)), vec![4]);
        assert_eq!(ids_from_value(&json!("7")), vec![7]);
        assert_eq!(ids_from_value(&json!([1, "2", "x", null])), vec![1, 2]);
        assert!(ids_from_value(&json!(null)).is_empty());
    }
}
