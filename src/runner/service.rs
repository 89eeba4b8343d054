use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::ProbeError;
use crate::history::{RunStore, TestResultRecord, TestRunRecord};
use crate::http::Client;
use crate::runner::cancel::{CancelRegistry, CancelSignal};
use crate::runner::orchestrator::{RunOptions, RunOrchestrator};
use crate::runner::response::RunResponse;
use crate::runner::types::TestRun;
use crate::suite::{SuiteDefinition, SuiteParser};
use crate::variable::Environment;
use crate::Result;

/// 按 ID 提供套件 YAML 原文
pub trait SuiteSource: Send + Sync {
    fn load(&self, suite_id: &str) -> Result<String>;
}

/// 从目录读取 `<id>.yaml` 或 `<id>.yml`
pub struct DirectorySuiteSource {
    root: PathBuf,
}

impl DirectorySuiteSource {
    const EXTENSIONS: [&'static str; 2] = ["yaml", "yml"];

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SuiteSource for DirectorySuiteSource {
    fn load(&self, suite_id: &str) -> Result<String> {
        if suite_id.is_empty() || suite_id.contains(['/', '\\']) || suite_id.contains("..") {
            return Err(ProbeError::SuiteNotFound(suite_id.to_string()));
        }

        for ext in Self::EXTENSIONS {
            let path = self.root.join(format!("{}.{}", suite_id, ext));
            if path.is_file() {
                debug!(path = %path.display(), "loading suite");
                return Ok(std::fs::read_to_string(path)?);
            }
        }

        Err(ProbeError::SuiteNotFound(suite_id.to_string()))
    }
}

/// 后台进行中的运行
pub struct RunHandle {
    pub run_id: String,
    join: JoinHandle<TestRun>,
}

impl RunHandle {
    /// 等待运行结束
    pub async fn wait(self) -> Result<TestRun> {
        self.join
            .await
            .map_err(|e| ProbeError::Other(format!("run task failed: {}", e)))
    }
}

/// 运行入口：加载套件、触发运行、查询结果
///
/// 套件每次触发都重新读取与解析；解析失败时直接返回错误，不创建运行记录。
pub struct SuiteService {
    source: Arc<dyn SuiteSource>,
    store: Arc<dyn RunStore>,
    orchestrator: Arc<RunOrchestrator>,
    registry: Arc<CancelRegistry>,
    seed: Environment,
}

impl SuiteService {
    pub fn new(
        source: Arc<dyn SuiteSource>,
        store: Arc<dyn RunStore>,
        client: Client,
        options: RunOptions,
    ) -> Self {
        let orchestrator = RunOrchestrator::new(client, Arc::clone(&store), options);
        Self {
            source,
            store,
            orchestrator: Arc::new(orchestrator),
            registry: Arc::new(CancelRegistry::new()),
            seed: Environment::new(),
        }
    }

    /// 设置优先于套件 `env` 的变量（配置文件环境、CLI 变量）
    pub fn with_seed(mut self, seed: Environment) -> Self {
        self.seed = seed;
        self
    }

    /// 读取并解析套件
    pub fn load(&self, suite_id: &str) -> Result<SuiteDefinition> {
        let text = self.source.load(suite_id)?;
        self.parse(&text)
    }

    /// 用当前的初始变量解析套件原文
    pub fn parse(&self, text: &str) -> Result<SuiteDefinition> {
        Ok(SuiteParser::parse_with_seed(text, &self.seed)?)
    }

    /// 执行已解析的套件
    pub async fn execute(
        &self,
        suite_id: &str,
        suite: &SuiteDefinition,
        cancel: CancelSignal,
    ) -> TestRun {
        let run = self.orchestrator.create_run(suite_id, suite.len());
        self.orchestrator.run(run, suite, cancel).await
    }

    /// 同步运行套件并返回汇总
    pub async fn run_suite(&self, suite_id: &str) -> Result<RunResponse> {
        let suite = self.load(suite_id)?;
        let run = self.orchestrator.create_run(suite_id, suite.len());
        let run_id = run.id.clone();
        let cancel = self.registry.register(&run_id);

        let run = self.orchestrator.run(run, &suite, cancel).await;
        self.registry.remove(&run_id);
        Ok(RunResponse::from(&run))
    }

    /// 在后台启动运行，立即返回运行 ID
    pub fn start(&self, suite_id: &str) -> Result<RunHandle> {
        let suite = self.load(suite_id)?;
        let run = self.orchestrator.create_run(suite_id, suite.len());
        let run_id = run.id.clone();
        let cancel = self.registry.register(&run_id);

        let orchestrator = Arc::clone(&self.orchestrator);
        let registry = Arc::clone(&self.registry);
        let join = tokio::spawn(async move {
            let run = orchestrator.run(run, &suite, cancel).await;
            registry.remove(&run.id);
            run
        });

        Ok(RunHandle { run_id, join })
    }

    /// 取消进行中的运行；运行不存在或已结束时返回 false
    pub fn cancel(&self, run_id: &str) -> bool {
        self.registry.cancel(run_id)
    }

    pub fn get_test_run(&self, run_id: &str) -> Result<Option<TestRunRecord>> {
        self.store.get_run(run_id)
    }

    pub fn get_test_results(&self, run_id: &str) -> Result<Vec<TestResultRecord>> {
        self.store.get_results(run_id)
    }

    pub fn list_runs(&self, suite_id: Option<&str>, limit: usize) -> Result<Vec<TestRunRecord>> {
        self.store.list_runs(suite_id, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_directory_source_extensions() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("posts.yaml"), "tests: []").unwrap();
        fs::write(dir.path().join("users.yml"), "tests: []").unwrap();

        let source = DirectorySuiteSource::new(dir.path());
        assert_eq!(source.load("posts").unwrap(), "tests: []");
        assert_eq!(source.load("users").unwrap(), "tests: []");
        assert!(matches!(
            source.load("missing"),
            Err(ProbeError::SuiteNotFound(_))
        ));
        assert!(matches!(
            source.load("../posts"),
            Err(ProbeError::SuiteNotFound(_))
        ));
    }
}
