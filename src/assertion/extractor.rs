use serde_json::Value;

/// 按点号路径取 JSON 中的值
///
/// 数字段在数组上按下标取值；空路径返回整个值。
/// 示例: `user.id`, `items.0.name`
pub fn lookup<'a>(value: &'a Value, segments: &[String]) -> Option<&'a Value> {
    segments.iter().try_fold(value, |current, segment| match current {
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        Value::Object(map) => map.get(segment),
        _ => None,
    })
}

/// 把路径字符串拆成段，忽略空段
pub fn split_path(path: &str) -> Vec<String> {
    path.split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// JSON 值的文本形式：字符串不带引号，其余用紧凑 JSON
pub fn to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
