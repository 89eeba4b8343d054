use reqwest::header::{CONTENT_TYPE, HeaderMap as Headers, HeaderName, HeaderValue};

use crate::http::error::TransportError;
use crate::http::types::Method;

/// 已完成变量替换、可以直接发送的请求
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: url::Url,
    pub headers: Headers,
    pub body: Option<String>,
    pub query_params: Vec<(String, String)>,
}

impl Request {
    pub fn new(method: Method, url: url::Url) -> Self {
        Self {
            method,
            url,
            headers: Headers::new(),
            body: None,
            query_params: Vec::new(),
        }
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Result<Self, TransportError> {
        let name = HeaderName::from_bytes(key.trim().as_bytes())
            .map_err(|e| TransportError::request(format!("invalid header name '{}': {}", key, e)))?;
        let value = HeaderValue::from_str(value).map_err(|e| {
            TransportError::request(format!("invalid value for header '{}': {}", key, e))
        })?;
        self.headers.append(name, value);
        Ok(self)
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.body = Some(text.into());
        self
    }

    /// 结构化 body 按 JSON 发送；已显式指定 Content-Type 时不覆盖
    pub fn with_json(mut self, data: &serde_json::Value) -> Self {
        if !self.headers.contains_key(CONTENT_TYPE) {
            self.headers
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        self.body = Some(data.to_string());
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push((key.into(), value.into()));
        self
    }

    /// 带查询参数的最终地址
    pub fn full_url(&self) -> url::Url {
        let mut url = self.url.clone();
        if !self.query_params.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query_params);
        }
        url
    }
}
