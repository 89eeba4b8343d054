use crate::variable::types::Environment;
use regex::{Captures, Regex};
use std::sync::OnceLock;

/// 模板引用了未定义的变量
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "undefined variable '{key}'{}",
    .test.as_ref().map(|t| format!(" in test '{}'", t)).unwrap_or_default()
)]
pub struct ResolutionError {
    pub key: String,
    pub test: Option<String>,
}

impl ResolutionError {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            test: None,
        }
    }

    /// 附上所属测试名
    pub fn in_test(mut self, test: impl Into<String>) -> Self {
        self.test = Some(test.into());
        self
    }
}

/// 变量替换器
pub struct VariableResolver;

impl VariableResolver {
    fn placeholder_regex() -> &'static Regex {
        static VAR_REGEX: OnceLock<Regex> = OnceLock::new();
        VAR_REGEX.get_or_init(|| {
            Regex::new(r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_\-]*)\s*\}\}").unwrap()
        })
    }

    /// 替换文本中的所有 {{variable}} 占位符
    ///
    /// 单遍替换：替换进来的值不会被再次扫描。
    pub fn resolve(template: &str, env: &Environment) -> Result<String, ResolutionError> {
        let re = Self::placeholder_regex();
        let mut output = String::with_capacity(template.len());
        let mut last = 0;

        for caps in re.captures_iter(template) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let key = &caps[1];
            let value = env.get(key).ok_or_else(|| ResolutionError::new(key))?;
            output.push_str(&template[last..whole.start()]);
            output.push_str(value);
            last = whole.end();
        }
        output.push_str(&template[last..]);

        Ok(output)
    }

    /// 模板里引用到的变量名，按出现顺序
    pub fn references(template: &str) -> Vec<String> {
        Self::placeholder_regex()
            .captures_iter(template)
            .map(|caps| caps[1].to_string())
            .collect()
    }

    /// 递归替换 JSON 中所有字符串值
    pub fn resolve_json(
        value: &serde_json::Value,
        env: &Environment,
    ) -> Result<serde_json::Value, ResolutionError> {
        use serde_json::Value;

        Ok(match value {
            Value::String(s) => Value::String(Self::resolve(s, env)?),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| Self::resolve_json(item, env))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(map) => {
                let mut resolved = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    resolved.insert(k.clone(), Self::resolve_json(v, env)?);
                }
                Value::Object(resolved)
            }
            other => other.clone(),
        })
    }

    /// JSON 中所有字符串值引用到的变量名
    pub fn json_references(value: &serde_json::Value) -> Vec<String> {
        use serde_json::Value;

        match value {
            Value::String(s) => Self::references(s),
            Value::Array(items) => items.iter().flat_map(Self::json_references).collect(),
            Value::Object(map) => map.values().flat_map(Self::json_references).collect(),
            _ => Vec::new(),
        }
    }

    /// 解析并替换系统环境变量 ${VAR}，未找到的保持原样
    pub fn resolve_env_vars(text: &str) -> String {
        static ENV_REGEX: OnceLock<Regex> = OnceLock::new();
        let re = ENV_REGEX.get_or_init(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap());

        re.replace_all(text, |caps: &Captures| {
            let env_name = &caps[1];
            std::env::var(env_name).unwrap_or_else(|_| caps[0].to_string())
        })
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> Environment {
        Environment::new()
            .with("base_url", "http://localhost:8080")
            .with("token", "secret-token")
            .with("id", "42")
    }

    #[test]
    fn test_resolve_simple() {
        let output = VariableResolver::resolve("{{base_url}}/api/users", &env()).unwrap();
        assert_eq!(output, "http://localhost:8080/api/users");
    }

    #[test]
    fn test_resolve_multiple_and_spaces() {
        let output =
            VariableResolver::resolve("/users/{{ id }}?auth={{token}}", &env()).unwrap();
        assert_eq!(output, "/users/42?auth=secret-token");
    }

    #[test]
    fn test_resolve_missing_variable_is_error() {
        let err = VariableResolver::resolve("/posts/{{missing}}", &env()).unwrap_err();
        assert_eq!(err.key, "missing");
        assert_eq!(err.to_string(), "undefined variable 'missing'");
        assert_eq!(
            err.in_test("Get post").to_string(),
            "undefined variable 'missing' in test 'Get post'"
        );
    }

    #[test]
    fn test_resolve_is_single_pass() {
        let env = Environment::new().with("a", "{{b}}").with("b", "x");
        assert_eq!(VariableResolver::resolve("{{a}}", &env).unwrap(), "{{b}}");
    }

    #[test]
    fn test_resolve_json_nested() {
        let body = serde_json::json!({"user": {"id": "{{id}}", "tags": ["{{token}}", 1]}});
        let resolved = VariableResolver::resolve_json(&body, &env()).unwrap();
        assert_eq!(
            resolved,
            serde_json::json!({"user": {"id": "42", "tags": ["secret-token", 1]}})
        );
    }

    #[test]
    fn test_references() {
        assert_eq!(
            VariableResolver::references("{{base_url}}/x/{{id}}"),
            vec!["base_url".to_string(), "id".to_string()]
        );
        let body = serde_json::json!({"a": ["{{x}}"], "b": "{{y}}"});
        let mut refs = VariableResolver::json_references(&body);
        refs.sort();
        assert_eq!(refs, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_resolve_env_vars() {
        unsafe {
            std::env::set_var("PROBE_TEST_VAR", "test_value");
        }

        let output = VariableResolver::resolve_env_vars("Value: ${PROBE_TEST_VAR}");
        assert_eq!(output, "Value: test_value");

        unsafe {
            std::env::remove_var("PROBE_TEST_VAR");
        }
    }

    #[test]
    fn test_resolve_env_vars_missing() {
        let output = VariableResolver::resolve_env_vars("Value: ${PROBE_NONEXISTENT_VAR}");
        assert_eq!(output, "Value: ${PROBE_NONEXISTENT_VAR}");
    }
}
