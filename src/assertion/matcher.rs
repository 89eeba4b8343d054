use serde_json::Value;

use crate::assertion::types::Mismatch;

/// JSON 结构化子集匹配
///
/// - 对象：期望中的每个键都必须存在并递归匹配，实际多出的键忽略
/// - 数组：长度相同，逐个元素递归匹配
/// - 数字：按数值比较（`1` 与 `1.0` 相等）
/// - 其余标量：严格相等
pub fn match_subset(expected: &Value, actual: &Value, path: &str, out: &mut Vec<Mismatch>) {
    match (expected, actual) {
        (Value::Object(exp), Value::Object(act)) => {
            for (key, exp_value) in exp {
                let field = format!("{}.{}", path, key);
                match act.get(key) {
                    Some(act_value) => match_subset(exp_value, act_value, &field, out),
                    None => out.push(Mismatch::new(field, exp_value.to_string(), "<missing>")),
                }
            }
        }
        (Value::Array(exp), Value::Array(act)) => {
            if exp.len() != act.len() {
                out.push(Mismatch::new(
                    path,
                    format!("array of {} items", exp.len()),
                    format!("array of {} items", act.len()),
                ));
                return;
            }
            for (index, (e, a)) in exp.iter().zip(act).enumerate() {
                match_subset(e, a, &format!("{}[{}]", path, index), out);
            }
        }
        (Value::Number(e), Value::Number(a)) => {
            if e.as_f64() != a.as_f64() {
                out.push(Mismatch::new(path, e.to_string(), a.to_string()));
            }
        }
        (e, a) => {
            if e != a {
                out.push(Mismatch::new(path, e.to_string(), a.to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mismatches(expected: Value, actual: Value) -> Vec<Mismatch> {
        let mut out = Vec::new();
        match_subset(&expected, &actual, "body", &mut out);
        out
    }

    #[test]
    fn test_subset_ignores_extra_keys() {
        let out = mismatches(
            json!({"id": 1}),
            json!({"id": 1, "title": "hello", "userId": 9}),
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_nested_value_mismatch_reports_path() {
        let out = mismatches(
            json!({"user": {"name": "alice"}}),
            json!({"user": {"name": "bob", "id": 2}}),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].field, "body.user.name");
        assert_eq!(out[0].expected, "\"alice\"");
        assert_eq!(out[0].actual, "\"bob\"");
    }

    #[test]
    fn test_missing_key() {
        let out = mismatches(json!({"token": "abc"}), json!({}));
        assert_eq!(out[0].to_string(), "body.token: expected \"abc\", got <missing>");
    }

    #[test]
    fn test_array_length_and_elements() {
        let out = mismatches(json!([1, 2]), json!([1, 2, 3]));
        assert_eq!(out[0].field, "body");
        assert_eq!(out[0].actual, "array of 3 items");

        let out = mismatches(json!([{"id": 1}, {"id": 2}]), json!([{"id": 1}, {"id": 3}]));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].field, "body[1].id");
    }

    #[test]
    fn test_numbers_compare_numerically() {
        assert!(mismatches(json!(1), json!(1.0)).is_empty());
        assert_eq!(mismatches(json!(1), json!(2)).len(), 1);
    }

    #[test]
    fn test_type_mismatch() {
        let out = mismatches(json!({"id": "1"}), json!({"id": 1}));
        assert_eq!(out[0].to_string(), "body.id: expected \"1\", got 1");
    }
}
