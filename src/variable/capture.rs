use crate::assertion::extractor::{lookup, split_path, to_text};
use crate::http::Response;
use crate::variable::types::Environment;

/// 变量捕获来源
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CaptureSource {
    /// 从响应 Body 提取（点号路径）
    /// 示例: body.token, body.items.0.id
    Body(Vec<String>),

    /// 从响应 Header 提取
    /// 示例: header.X-Token
    Header(String),

    /// 响应状态码
    Status,
}

impl CaptureSource {
    /// 用于错误消息的来源描述
    pub fn describe(&self) -> String {
        match self {
            CaptureSource::Body(segments) if segments.is_empty() => "body".to_string(),
            CaptureSource::Body(segments) => format!("body.{}", segments.join(".")),
            CaptureSource::Header(name) => format!("header.{}", name),
            CaptureSource::Status => "status".to_string(),
        }
    }
}

/// 变量捕获配置
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariableCapture {
    /// 变量名称
    pub name: String,

    /// 捕获来源
    pub source: CaptureSource,
}

/// 捕获失败，只影响所属测试
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("cannot capture '{name}': {path} not found in response")]
    NotFound { name: String, path: String },

    #[error("cannot capture '{name}': response body is not valid JSON")]
    NotJson { name: String },
}

impl VariableCapture {
    /// 从 Body 提取变量
    pub fn from_body(name: impl Into<String>, path: &str) -> Self {
        Self {
            name: name.into(),
            source: CaptureSource::Body(split_path(path)),
        }
    }

    /// 从 Header 提取变量
    pub fn from_header(name: impl Into<String>, header_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: CaptureSource::Header(header_name.into()),
        }
    }

    /// 解析捕获源字符串
    ///
    /// 语法:
    /// - `body` → 整个 body
    /// - `body.user.id` → CaptureSource::Body(["user", "id"])
    /// - `header.X-Token` → CaptureSource::Header("X-Token")
    /// - `status` → CaptureSource::Status
    /// - 其他 → 视为 body 路径
    pub fn parse(var_name: &str, source_str: &str) -> Self {
        let source_str = source_str.trim();
        let source = if source_str == "status" {
            CaptureSource::Status
        } else if source_str == "body" {
            CaptureSource::Body(Vec::new())
        } else if let Some(path) = source_str.strip_prefix("body.") {
            CaptureSource::Body(split_path(path))
        } else if let Some(header_name) = source_str.strip_prefix("header.") {
            CaptureSource::Header(header_name.to_string())
        } else {
            CaptureSource::Body(split_path(source_str))
        };

        Self {
            name: var_name.to_string(),
            source,
        }
    }

    /// 从响应中取值
    pub fn extract(&self, response: &Response) -> Result<String, CaptureError> {
        let not_found = || CaptureError::NotFound {
            name: self.name.clone(),
            path: self.source.describe(),
        };

        match &self.source {
            CaptureSource::Status => Ok(response.status.code().to_string()),
            CaptureSource::Header(header_name) => response
                .header(header_name)
                .map(str::to_string)
                .ok_or_else(not_found),
            CaptureSource::Body(segments) => {
                let json = response.json().ok_or_else(|| CaptureError::NotJson {
                    name: self.name.clone(),
                })?;
                lookup(&json, segments).map(to_text).ok_or_else(not_found)
            }
        }
    }
}

/// 执行捕获，返回绑定了新变量的环境
pub fn capture(
    response: &Response,
    rule: &VariableCapture,
    env: Environment,
) -> Result<Environment, CaptureError> {
    let value = rule.extract(response)?;
    Ok(env.with(rule.name.clone(), value))
}
