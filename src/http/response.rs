use crate::http::types::Status;
use reqwest::header::HeaderMap as Headers;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Response {
    pub status: Status,
    pub headers: Headers,
    pub body: String,
    /// 从发出请求到读完最后一个字节
    pub duration: Duration,
}

impl Response {
    pub fn new(status: u16, headers: Headers, body: String, duration: Duration) -> Self {
        Self {
            status: Status::new(status),
            headers,
            body,
            duration,
        }
    }

    /// 按名称取 header（大小写不敏感），多值时取第一个；非 UTF-8 的值视为不存在
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// 同名 header 的全部值，按出现顺序
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.body).ok()
    }
}
