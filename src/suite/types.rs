use std::time::Duration;

use crate::variable::{
    Environment, ResolutionError, VariableCapture, VariableResolver,
};

/// 解析后的测试套件，解析完成后不可变
#[derive(Debug, Clone, PartialEq)]
pub struct SuiteDefinition {
    /// 套件名称（可选）
    pub name: Option<String>,

    /// 初始变量（已在加载时解析）
    pub env: Environment,

    /// 按文件顺序排列的测试
    pub tests: Vec<TestCase>,

    /// 是否允许并行执行（测试之间没有变量依赖）
    pub parallel: bool,
}

impl SuiteDefinition {
    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

/// 单个测试
#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
    /// 在套件中的位置（从 1 开始）
    pub position: usize,

    pub name: String,

    pub request: RequestSpec,

    pub expect: Expectation,

    /// 响应通过后捕获的变量
    pub captures: Vec<VariableCapture>,

    /// 覆盖默认请求超时
    pub timeout: Option<Duration>,
}

impl TestCase {
    /// 该测试引用的所有变量
    pub fn references(&self) -> Vec<String> {
        let mut refs = self.request.references();
        refs.extend(self.expect.references());
        refs
    }
}

/// 请求模板，所有字符串都可能包含 `{{var}}`
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<Payload>,
}

impl RequestSpec {
    pub fn references(&self) -> Vec<String> {
        let mut refs = VariableResolver::references(&self.method);
        refs.extend(VariableResolver::references(&self.path));
        for (_, value) in self.headers.iter().chain(&self.query) {
            refs.extend(VariableResolver::references(value));
        }
        if let Some(body) = &self.body {
            refs.extend(body.references());
        }
        refs
    }
}

/// 请求体或期望的 body
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// 原样文本
    Text(String),
    /// 结构化数据（映射、序列、数字、布尔）
    Json(serde_json::Value),
}

impl Payload {
    pub fn resolve(&self, env: &Environment) -> Result<Payload, ResolutionError> {
        Ok(match self {
            Payload::Text(text) => Payload::Text(VariableResolver::resolve(text, env)?),
            Payload::Json(value) => Payload::Json(VariableResolver::resolve_json(value, env)?),
        })
    }

    pub fn references(&self) -> Vec<String> {
        match self {
            Payload::Text(text) => VariableResolver::references(text),
            Payload::Json(value) => VariableResolver::json_references(value),
        }
    }
}

/// `expect` 块；全部为空表示任何响应都可以
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expectation {
    pub status: Option<u16>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Payload>,
}

impl Expectation {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.headers.is_empty() && self.body.is_none()
    }

    /// 替换期望值中的变量
    pub fn resolve(&self, env: &Environment) -> Result<Expectation, ResolutionError> {
        let headers = self
            .headers
            .iter()
            .map(|(name, value)| Ok((name.clone(), VariableResolver::resolve(value, env)?)))
            .collect::<Result<Vec<_>, ResolutionError>>()?;
        let body = self.body.as_ref().map(|b| b.resolve(env)).transpose()?;

        Ok(Expectation {
            status: self.status,
            headers,
            body,
        })
    }

    pub fn references(&self) -> Vec<String> {
        let mut refs: Vec<String> = self
            .headers
            .iter()
            .flat_map(|(_, value)| VariableResolver::references(value))
            .collect();
        if let Some(body) = &self.body {
            refs.extend(body.references());
        }
        refs
    }
}

/// 套件加载错误；出现时不会创建运行记录
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SuiteError {
    /// YAML 语法错误
    #[error("invalid YAML at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// 字段缺失或类型错误
    #[error("invalid field '{field}': {message}")]
    Schema { field: String, message: String },
}

impl SuiteError {
    pub fn schema(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            field: field.into(),
            message: message.into(),
        }
    }
}
