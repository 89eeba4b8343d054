use std::fmt;
use std::time::Duration;

use serde::de::{self, DeserializeSeed, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_yaml::{Mapping, Value};

use crate::http::Method;
use crate::suite::types::{
    Expectation, Payload, RequestSpec, SuiteDefinition, SuiteError, TestCase,
};
use crate::variable::{Environment, VariableCapture, VariableResolver};

/// YAML 套件解析器
///
/// 未知字段忽略；出错时不会返回部分结果。
pub struct SuiteParser;

impl SuiteParser {
    /// 解析 YAML 套件文本
    pub fn parse(text: &str) -> Result<SuiteDefinition, SuiteError> {
        Self::parse_with_seed(text, &Environment::new())
    }

    /// 解析套件，`seed` 中的变量（CLI、配置文件环境）优先于套件自己的 `env`
    pub fn parse_with_seed(text: &str, seed: &Environment) -> Result<SuiteDefinition, SuiteError> {
        let document = DocumentSeed::Root
            .deserialize(serde_yaml::Deserializer::from_str(text))
            .map_err(yaml_error)?;

        let root = match &document {
            Value::Mapping(map) => map,
            Value::Null => return Err(SuiteError::schema("tests", "suite is empty")),
            _ => {
                return Err(SuiteError::schema(
                    "<root>",
                    "expected a mapping with a 'tests' sequence",
                ));
            }
        };

        let name = optional_string(root.get("name"), "name")?;
        let parallel = optional_bool(root.get("parallel"), "parallel")?.unwrap_or(false);
        let env = build_env(root.get("env"), seed)?;

        let items = match root.get("tests") {
            None | Some(Value::Null) => return Err(SuiteError::schema("tests", "is required")),
            Some(Value::Sequence(items)) => items,
            Some(_) => return Err(SuiteError::schema("tests", "expected a sequence of tests")),
        };
        if items.is_empty() {
            return Err(SuiteError::schema("tests", "must contain at least one test"));
        }

        let tests = items
            .iter()
            .enumerate()
            .map(|(index, item)| parse_test(index, item))
            .collect::<Result<Vec<_>, _>>()?;

        let suite = SuiteDefinition {
            name,
            env,
            tests,
            parallel,
        };

        if suite.parallel {
            check_independent(&suite)?;
        }

        Ok(suite)
    }
}

fn yaml_error(err: serde_yaml::Error) -> SuiteError {
    SuiteError::Parse {
        line: err.location().map(|loc| loc.line()).unwrap_or(0),
        message: err.to_string(),
    }
}

/// 读取 YAML 文档
///
/// 与 `serde_yaml::Value` 相同，只是 `env` 中重复的键以第一次出现为准；
/// 其他位置的重复键仍然报错。
#[derive(Clone, Copy)]
enum DocumentSeed {
    Root,
    Env,
}

impl<'de> DeserializeSeed<'de> for DocumentSeed {
    type Value = Value;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for DocumentSeed {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a YAML value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Number(v.into()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::Number(v.into()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Number(v.into()))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        self.deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element::<Value>()? {
            items.push(item);
        }
        Ok(Value::Sequence(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut mapping = Mapping::new();
        while let Some(key) = map.next_key::<Value>()? {
            let value = match self {
                Self::Root if key.as_str() == Some("env") => map.next_value_seed(Self::Env)?,
                _ => map.next_value::<Value>()?,
            };

            if mapping.contains_key(&key) {
                match self {
                    Self::Env => continue,
                    Self::Root => {
                        return Err(de::Error::custom(format!(
                            "duplicate entry with key {:?}",
                            key.as_str().unwrap_or("<non-string>")
                        )));
                    }
                }
            }
            mapping.insert(key, value);
        }
        Ok(Value::Mapping(mapping))
    }
}

/// 按顺序解析 `env`，每个值可以引用之前已定义的变量
fn build_env(value: Option<&Value>, seed: &Environment) -> Result<Environment, SuiteError> {
    let mut env = seed.clone();

    let map = match value {
        None | Some(Value::Null) => return Ok(env),
        Some(Value::Mapping(map)) => map,
        Some(_) => return Err(SuiteError::schema("env", "expected a mapping")),
    };

    for (key, value) in map {
        let key = scalar_to_string(key)
            .ok_or_else(|| SuiteError::schema("env", "keys must be strings"))?;
        let field = format!("env.{}", key);
        if env.contains_key(&key) {
            continue;
        }

        let raw = scalar_to_string(value)
            .ok_or_else(|| SuiteError::schema(&field, "expected a scalar value"))?;
        let expanded = VariableResolver::resolve_env_vars(&raw);
        let resolved = VariableResolver::resolve(&expanded, &env)
            .map_err(|e| SuiteError::schema(&field, e.to_string()))?;

        env = env.with(key, resolved);
    }

    Ok(env)
}

fn parse_test(index: usize, value: &Value) -> Result<TestCase, SuiteError> {
    let field = format!("tests[{}]", index);
    let map = value
        .as_mapping()
        .ok_or_else(|| SuiteError::schema(&field, "expected a mapping"))?;

    let name = required_string(map, "name", &field)?;

    let request_field = format!("{}.request", field);
    let request = match map.get("request") {
        None | Some(Value::Null) => return Err(SuiteError::schema(&request_field, "is required")),
        Some(value) => parse_request(value, &request_field)?,
    };

    let expect = parse_expect(map.get("expect"), &format!("{}.expect", field))?;
    let captures = parse_captures(map.get("capture"), &format!("{}.capture", field))?;

    let timeout_field = format!("{}.timeout_ms", field);
    let timeout = match map.get("timeout_ms") {
        None | Some(Value::Null) => None,
        Some(value) => match value.as_u64() {
            Some(ms) if ms > 0 => Some(Duration::from_millis(ms)),
            _ => {
                return Err(SuiteError::schema(
                    timeout_field,
                    "expected a positive integer (milliseconds)",
                ));
            }
        },
    };

    Ok(TestCase {
        position: index + 1,
        name,
        request,
        expect,
        captures,
        timeout,
    })
}

fn parse_request(value: &Value, field: &str) -> Result<RequestSpec, SuiteError> {
    let map = value
        .as_mapping()
        .ok_or_else(|| SuiteError::schema(field, "expected a mapping"))?;

    let method = required_string(map, "method", field)?;
    // 含占位符的方法在替换后再校验
    if VariableResolver::references(&method).is_empty() && Method::parse(&method).is_err() {
        return Err(SuiteError::schema(
            format!("{}.method", field),
            format!(
                "unsupported HTTP method '{}' (expected GET, POST, PUT, DELETE, PATCH, HEAD or OPTIONS)",
                method
            ),
        ));
    }

    Ok(RequestSpec {
        method: method.trim().to_string(),
        path: required_string(map, "path", field)?,
        headers: string_map(map.get("headers"), &format!("{}.headers", field))?,
        query: string_map(map.get("query"), &format!("{}.query", field))?,
        body: payload(map.get("body"), &format!("{}.body", field))?,
    })
}

fn parse_expect(value: Option<&Value>, field: &str) -> Result<Expectation, SuiteError> {
    let map = match value {
        None | Some(Value::Null) => return Ok(Expectation::default()),
        Some(Value::Mapping(map)) => map,
        Some(_) => return Err(SuiteError::schema(field, "expected a mapping")),
    };

    let status_field = format!("{}.status", field);
    let status = match map.get("status") {
        None | Some(Value::Null) => None,
        Some(value) => match value.as_u64() {
            Some(code) if (100..=599).contains(&code) => Some(code as u16),
            _ => {
                return Err(SuiteError::schema(
                    status_field,
                    "expected an integer HTTP status between 100 and 599",
                ));
            }
        },
    };

    Ok(Expectation {
        status,
        headers: string_map(map.get("headers"), &format!("{}.headers", field))?,
        body: payload(map.get("body"), &format!("{}.body", field))?,
    })
}

fn parse_captures(value: Option<&Value>, field: &str) -> Result<Vec<VariableCapture>, SuiteError> {
    string_map(value, field)?
        .into_iter()
        .map(|(name, source)| {
            if !is_variable_name(&name) {
                return Err(SuiteError::schema(
                    format!("{}.{}", field, name),
                    "variable names must start with a letter or '_' and contain only letters, digits, '_' or '-'",
                ));
            }
            Ok(VariableCapture::parse(&name, &source))
        })
        .collect()
}

/// 并行套件不允许测试之间存在变量依赖
fn check_independent(suite: &SuiteDefinition) -> Result<(), SuiteError> {
    for test in &suite.tests {
        let field = format!("tests[{}]", test.position - 1);
        if !test.captures.is_empty() {
            return Err(SuiteError::schema(
                format!("{}.capture", field),
                "captures are not allowed when 'parallel' is true",
            ));
        }
        if let Some(key) = test
            .references()
            .into_iter()
            .find(|key| !suite.env.contains_key(key))
        {
            return Err(SuiteError::schema(
                field,
                format!(
                    "references '{}' which is not defined in env; parallel tests cannot depend on each other",
                    key
                ),
            ));
        }
    }
    Ok(())
}

fn is_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn required_string(map: &Mapping, key: &str, parent: &str) -> Result<String, SuiteError> {
    let field = format!("{}.{}", parent, key);
    match map.get(key) {
        None | Some(Value::Null) => Err(SuiteError::schema(field, "is required")),
        Some(value) => match scalar_to_string(value) {
            Some(s) if !s.trim().is_empty() => Ok(s),
            Some(_) => Err(SuiteError::schema(field, "must not be empty")),
            None => Err(SuiteError::schema(field, "expected a string")),
        },
    }
}

fn optional_string(value: Option<&Value>, field: &str) -> Result<Option<String>, SuiteError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => scalar_to_string(value)
            .map(Some)
            .ok_or_else(|| SuiteError::schema(field, "expected a string")),
    }
}

fn optional_bool(value: Option<&Value>, field: &str) -> Result<Option<bool>, SuiteError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(SuiteError::schema(field, "expected true or false")),
    }
}

/// 字符串到字符串的映射，保持文件中的顺序
fn string_map(value: Option<&Value>, field: &str) -> Result<Vec<(String, String)>, SuiteError> {
    let map = match value {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Mapping(map)) => map,
        Some(_) => return Err(SuiteError::schema(field, "expected a mapping")),
    };

    map.iter()
        .map(|(key, value)| {
            let key = scalar_to_string(key)
                .ok_or_else(|| SuiteError::schema(field, "keys must be strings"))?;
            let value = scalar_to_string(value).ok_or_else(|| {
                SuiteError::schema(format!("{}.{}", field, key), "expected a scalar value")
            })?;
            Ok((key, value))
        })
        .collect()
}

fn payload(value: Option<&Value>, field: &str) -> Result<Option<Payload>, SuiteError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(Payload::Text(text.clone()))),
        Some(value) => serde_json::to_value(value)
            .map(|json| Some(Payload::Json(json)))
            .map_err(|e| SuiteError::schema(field, format!("cannot convert to JSON: {}", e))),
    }
}
