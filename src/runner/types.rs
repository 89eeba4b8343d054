use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::assertion::Mismatch;
use crate::http::TransportError;
use crate::variable::{CaptureError, ResolutionError};

/// 单个测试失败的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// 模板引用了未定义变量，请求没有发出
    Resolution(ResolutionError),

    /// 没有拿到响应（超时、网络、TLS、请求无法构建）
    Transport(TransportError),

    /// 拿到了响应，但不满足 `expect`
    Expectation(Vec<Mismatch>),

    /// 响应满足期望，但捕获变量失败
    Capture(CaptureError),
}

impl Failure {
    pub fn kind(&self) -> &'static str {
        match self {
            Failure::Resolution(_) => "resolution",
            Failure::Transport(_) => "transport",
            Failure::Expectation(_) => "expectation",
            Failure::Capture(_) => "capture",
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Resolution(e) => write!(f, "resolution error: {}", e),
            Failure::Transport(e) => write!(f, "transport error ({})", e),
            Failure::Expectation(mismatches) => {
                let details = mismatches
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                write!(f, "expectation failed: {}", details)
            }
            Failure::Capture(e) => write!(f, "capture error: {}", e),
        }
    }
}

/// 单个测试的执行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    /// 在套件中的位置（从 1 开始）
    pub position: usize,

    pub name: String,

    /// 解析后的 HTTP 方法（解析失败时为模板原文）
    pub method: String,

    /// 解析后的 URL（解析失败时为路径模板）
    pub url: String,

    /// 响应状态码，请求未完成时为 0
    pub status_code: u16,

    /// 单次 HTTP 往返耗时
    pub duration: Duration,

    /// 发送次数（包括重试）
    pub attempts: u32,

    pub failure: Option<Failure>,
}

impl TestResult {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }

    /// 失败消息，通过时为空串
    pub fn error_message(&self) -> String {
        self.failure
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default()
    }
}

/// 运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Created,
    Running,
    Passed,
    Failed,
    Aborted,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Passed | Self::Failed | Self::Aborted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一次套件运行，由调度器独占修改
#[derive(Debug, Clone)]
pub struct TestRun {
    pub id: String,
    pub suite_id: String,
    pub status: RunStatus,
    /// 套件中声明的测试数
    pub declared_tests: usize,
    /// 按声明顺序排列的结果
    pub results: Vec<TestResult>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TestRun {
    pub fn new(suite_id: impl Into<String>, declared_tests: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            suite_id: suite_id.into(),
            status: RunStatus::Created,
            declared_tests,
            results: Vec::with_capacity(declared_tests),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub(crate) fn start(&mut self) {
        debug_assert_eq!(self.status, RunStatus::Created);
        self.status = RunStatus::Running;
        self.started_at = Utc::now();
    }

    pub(crate) fn record(&mut self, result: TestResult) {
        debug_assert_eq!(self.status, RunStatus::Running);
        self.results.push(result);
    }

    /// 进入终态：全部通过为 Passed，否则 Failed；被取消为 Aborted
    pub(crate) fn finish(&mut self, aborted: bool) {
        self.status = if aborted {
            RunStatus::Aborted
        } else if self.results.iter().all(TestResult::passed) {
            RunStatus::Passed
        } else {
            RunStatus::Failed
        };
        self.completed_at = Some(Utc::now());
    }

    pub fn total_tests(&self) -> usize {
        self.results.len()
    }

    pub fn passed_tests(&self) -> usize {
        self.results.iter().filter(|r| r.passed()).count()
    }

    pub fn failed_tests(&self) -> usize {
        self.total_tests() - self.passed_tests()
    }

    /// 所有结果的请求耗时之和
    pub fn total_duration(&self) -> Duration {
        self.results.iter().map(|r| r.duration).sum()
    }
}
