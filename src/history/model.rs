use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::runner::{RunStatus, TestResult, TestRun};

/// 持久化的运行记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRunRecord {
    /// 唯一 ID (UUID)
    pub id: String,

    pub suite_id: String,

    pub status: RunStatus,

    pub total_tests: usize,

    pub passed_tests: usize,

    pub failed_tests: usize,

    pub started_at: DateTime<Utc>,

    /// 进入终态的时间
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TestRunRecord {
    /// 进行中的运行以声明的测试数作为 `total_tests`，终态后为实际记录的结果数
    ///
    /// `Created` 只存在于内存中，持久化时记为 `Running`。
    pub fn from_run(run: &TestRun) -> Self {
        let (status, total_tests) = match run.status {
            RunStatus::Created | RunStatus::Running => (RunStatus::Running, run.declared_tests),
            terminal => (terminal, run.total_tests()),
        };

        Self {
            id: run.id.clone(),
            suite_id: run.suite_id.clone(),
            status,
            total_tests,
            passed_tests: run.passed_tests(),
            failed_tests: run.failed_tests(),
            started_at: run.started_at,
            completed_at: run.completed_at,
        }
    }
}

/// 持久化的单个测试结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResultRecord {
    pub id: String,

    pub test_name: String,

    /// 0 表示请求没有完成
    pub status_code: u16,

    /// 单次 HTTP 往返耗时 (毫秒，向下取整)
    pub duration_ms: u64,

    pub error_message: String,

    pub passed: bool,
}

impl TestResultRecord {
    pub fn from_result(result: &TestResult) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            test_name: result.name.clone(),
            status_code: result.status_code,
            duration_ms: result.duration.as_millis() as u64,
            error_message: result.error_message(),
            passed: result.passed(),
        }
    }
}
