use std::time::{Duration, Instant};

use tracing::debug;

use crate::Result;
use crate::http::error::TransportError;
use crate::http::request::Request;
use crate::http::response::Response;

/// 所有运行共享的 HTTP 客户端（共享连接池，不含任何运行状态）
#[derive(Clone)]
pub struct Client {
    inner: reqwest::Client,
    default_timeout: Duration,
}

impl Client {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new() -> Result<Self> {
        Self::with_timeout(Self::DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(default_timeout: Duration) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(concat!("probe/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            inner,
            default_timeout,
        })
    }

    /// 发送单个请求，不做重试
    pub async fn execute(
        &self,
        request: Request,
        timeout: Option<Duration>,
    ) -> std::result::Result<Response, TransportError> {
        let timeout = timeout.unwrap_or(self.default_timeout);
        let url = request.full_url();
        debug!(method = %request.method, url = %url, "sending request");

        let mut req = self
            .inner
            .request(request.method.to_reqwest(), url)
            .headers(request.headers)
            .timeout(timeout);

        if let Some(body) = request.body {
            req = req.body(body);
        }

        let start = Instant::now();
        let response = req
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(e, timeout))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::from_reqwest(e, timeout))?;
        let duration = start.elapsed();

        debug!(status, elapsed_ms = duration.as_millis() as u64, "response received");
        Ok(Response::new(status, headers, body, duration))
    }
}
