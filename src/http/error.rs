use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

/// 传输层失败的类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// 请求在超时时间内未完成
    Timeout,
    /// DNS、连接被拒绝、连接中断
    Network,
    /// TLS 握手或证书错误
    Tls,
    /// 请求无法构建（非法 header、URL）
    Request,
}

impl TransportErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Network => "network",
            Self::Tls => "tls",
            Self::Request => "request",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 没有拿到任何 HTTP 响应
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {detail}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub detail: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn request(detail: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Request, detail)
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            TransportErrorKind::Timeout,
            format!("request timed out after {}ms", after.as_millis()),
        )
    }

    /// 把 reqwest 错误归类
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            return Self::timeout(timeout);
        }

        let detail = error_chain(&err);
        let lower = detail.to_lowercase();
        if lower.contains("tls") || lower.contains("ssl") || lower.contains("certificate") {
            return Self::new(TransportErrorKind::Tls, detail);
        }
        if err.is_builder() {
            return Self::request(detail);
        }
        Self::new(TransportErrorKind::Network, detail)
    }
}

/// reqwest 的顶层消息通常只有 "error sending request"，真正原因在 source 链里
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
