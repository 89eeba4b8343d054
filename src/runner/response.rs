use serde::{Deserialize, Serialize};

use super::types::{TestResult, TestRun};

/// 同步触发运行时返回的汇总
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResponse {
    pub total_tests: usize,
    pub passed_tests: usize,
    pub failed_tests: usize,
    pub results: Vec<RunResultEntry>,
}

/// 单个测试的同步结果；`Duration` 单位为纳秒
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RunResultEntry {
    pub name: String,
    pub passed: bool,
    pub status_code: u16,
    pub duration: u64,
    pub error: String,
}

impl From<&TestResult> for RunResultEntry {
    fn from(result: &TestResult) -> Self {
        Self {
            name: result.name.clone(),
            passed: result.passed(),
            status_code: result.status_code,
            duration: u64::try_from(result.duration.as_nanos()).unwrap_or(u64::MAX),
            error: result.error_message(),
        }
    }
}

impl From<&TestRun> for RunResponse {
    fn from(run: &TestRun) -> Self {
        Self {
            total_tests: run.total_tests(),
            passed_tests: run.passed_tests(),
            failed_tests: run.failed_tests(),
            results: run.results.iter().map(RunResultEntry::from).collect(),
        }
    }
}
