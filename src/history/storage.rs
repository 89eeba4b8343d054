use super::model::{TestResultRecord, TestRunRecord};
use crate::Result;
use crate::error::ProbeError;
use fs2::FileExt;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

const DATA_DIR: &str = ".probe";
const RUNS_DIR: &str = "runs";
const RUN_FILE: &str = "run.json";
const RESULTS_FILE: &str = "results.jsonl";

/// 运行记录存储
///
/// 每个运行只由一个调度器写入；不同运行之间互不影响。
pub trait RunStore: Send + Sync {
    /// 创建运行记录
    fn create_run(&self, run: &TestRunRecord) -> Result<()>;

    /// 覆盖运行记录（状态与计数）
    fn update_run(&self, run: &TestRunRecord) -> Result<()>;

    /// 追加一条测试结果
    fn append_result(&self, run_id: &str, result: &TestResultRecord) -> Result<()>;

    fn get_run(&self, run_id: &str) -> Result<Option<TestRunRecord>>;

    /// 按记录顺序返回结果；运行不存在时返回空列表
    fn get_results(&self, run_id: &str) -> Result<Vec<TestResultRecord>>;

    /// 最近的运行在前，最多 `limit` 条
    fn list_runs(&self, suite_id: Option<&str>, limit: usize) -> Result<Vec<TestRunRecord>>;
}

/// 基于文件的存储
///
/// ```text
/// <root>/runs/<run_id>/run.json
/// <root>/runs/<run_id>/results.jsonl
/// ```
pub struct FileRunStore {
    root: PathBuf,
}

impl FileRunStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn run_dir(&self, run_id: &str) -> Result<PathBuf> {
        validate_id(run_id)?;
        Ok(self.root.join(RUNS_DIR).join(run_id))
    }

    /// 写入临时文件后重命名，读者不会看到写了一半的 run.json
    fn write_run(&self, run: &TestRunRecord) -> Result<()> {
        let dir = self.run_dir(&run.id)?;
        fs::create_dir_all(&dir)?;

        let json = serde_json::to_string_pretty(run)?;
        let tmp = dir.join(format!("{}.{}.tmp", RUN_FILE, Uuid::new_v4()));
        fs::write(&tmp, json)?;
        if let Err(e) = fs::rename(&tmp, dir.join(RUN_FILE)) {
            let _ = fs::remove_file(&tmp);
            return Err(ProbeError::IoError(e));
        }
        Ok(())
    }

    fn read_run(path: &Path) -> Result<Option<TestRunRecord>> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ProbeError::IoError(e)),
        }
    }
}

impl Default for FileRunStore {
    fn default() -> Self {
        let dir = std::env::var("PROBE_DATA_DIR").unwrap_or_else(|_| DATA_DIR.to_string());
        Self::new(dir)
    }
}

impl RunStore for FileRunStore {
    fn create_run(&self, run: &TestRunRecord) -> Result<()> {
        if self.run_dir(&run.id)?.join(RUN_FILE).exists() {
            return Err(ProbeError::Store(format!("run {} already exists", run.id)));
        }
        self.write_run(run)
    }

    fn update_run(&self, run: &TestRunRecord) -> Result<()> {
        self.write_run(run)
    }

    /// # Concurrency Strategy
    /// 使用 `fs2::lock_exclusive`，多个进程同时追加时每行保持完整。
    fn append_result(&self, run_id: &str, result: &TestResultRecord) -> Result<()> {
        let dir = self.run_dir(run_id)?;
        fs::create_dir_all(&dir)?;
        let json = serde_json::to_string(result)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(RESULTS_FILE))?;

        file.lock_exclusive()?;
        writeln!(file, "{}", json)?;
        drop(file);

        Ok(())
    }

    fn get_run(&self, run_id: &str) -> Result<Option<TestRunRecord>> {
        Self::read_run(&self.run_dir(run_id)?.join(RUN_FILE))
    }

    fn get_results(&self, run_id: &str) -> Result<Vec<TestResultRecord>> {
        let path = self.run_dir(run_id)?.join(RESULTS_FILE);
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ProbeError::IoError(e)),
        };
        file.lock_shared()?;

        let reader = BufReader::new(file);
        let mut results = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            results.push(serde_json::from_str::<TestResultRecord>(&line)?);
        }
        Ok(results)
    }

    fn list_runs(&self, suite_id: Option<&str>, limit: usize) -> Result<Vec<TestRunRecord>> {
        let runs_dir = self.root.join(RUNS_DIR);
        let entries = match fs::read_dir(&runs_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ProbeError::IoError(e)),
        };

        let mut runs = Vec::new();
        for entry in entries {
            let path = entry?.path().join(RUN_FILE);
            match Self::read_run(&path) {
                Ok(Some(run)) => {
                    if suite_id.is_none_or(|id| run.suite_id == id) {
                        runs.push(run);
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Skipping unreadable run record {}: {}", path.display(), e),
            }
        }

        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs.truncate(limit);
        Ok(runs)
    }
}

/// 内存存储，用于 `--no-record` 与测试
#[derive(Default)]
pub struct MemoryRunStore {
    runs: RwLock<HashMap<String, (TestRunRecord, Vec<TestResultRecord>)>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunStore for MemoryRunStore {
    fn create_run(&self, run: &TestRunRecord) -> Result<()> {
        let mut runs = self.runs.write().unwrap_or_else(PoisonError::into_inner);
        if runs.contains_key(&run.id) {
            return Err(ProbeError::Store(format!("run {} already exists", run.id)));
        }
        runs.insert(run.id.clone(), (run.clone(), Vec::new()));
        Ok(())
    }

    fn update_run(&self, run: &TestRunRecord) -> Result<()> {
        let mut runs = self.runs.write().unwrap_or_else(PoisonError::into_inner);
        match runs.get_mut(&run.id) {
            Some((record, _)) => {
                *record = run.clone();
                Ok(())
            }
            None => Err(ProbeError::Store(format!("run {} not found", run.id))),
        }
    }

    fn append_result(&self, run_id: &str, result: &TestResultRecord) -> Result<()> {
        let mut runs = self.runs.write().unwrap_or_else(PoisonError::into_inner);
        match runs.get_mut(run_id) {
            Some((_, results)) => {
                results.push(result.clone());
                Ok(())
            }
            None => Err(ProbeError::Store(format!("run {} not found", run_id))),
        }
    }

    fn get_run(&self, run_id: &str) -> Result<Option<TestRunRecord>> {
        let runs = self.runs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(runs.get(run_id).map(|(record, _)| record.clone()))
    }

    fn get_results(&self, run_id: &str) -> Result<Vec<TestResultRecord>> {
        let runs = self.runs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(runs
            .get(run_id)
            .map(|(_, results)| results.clone())
            .unwrap_or_default())
    }

    fn list_runs(&self, suite_id: Option<&str>, limit: usize) -> Result<Vec<TestRunRecord>> {
        let runs = self.runs.read().unwrap_or_else(PoisonError::into_inner);
        let mut list: Vec<TestRunRecord> = runs
            .values()
            .map(|(record, _)| record)
            .filter(|record| suite_id.is_none_or(|id| record.suite_id == id))
            .cloned()
            .collect();
        list.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        list.truncate(limit);
        Ok(list)
    }
}

/// 运行 ID 会成为目录名，拒绝路径分隔符
fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
        return Err(ProbeError::Store(format!("invalid run id: {:?}", id)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::RunStatus;
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    fn create_run_record(id: &str, suite_id: &str, minutes_ago: i64) -> TestRunRecord {
        TestRunRecord {
            id: id.to_string(),
            suite_id: suite_id.to_string(),
            status: RunStatus::Running,
            total_tests: 0,
            passed_tests: 0,
            failed_tests: 0,
            started_at: Utc::now() - Duration::minutes(minutes_ago),
            completed_at: None,
        }
    }

    fn create_result_record(name: &str) -> TestResultRecord {
        TestResultRecord {
            id: Uuid::new_v4().to_string(),
            test_name: name.to_string(),
            status_code: 200,
            duration_ms: 5,
            error_message: String::new(),
            passed: true,
        }
    }

    fn exercise_store(store: &dyn RunStore) {
        let run = create_run_record("run-1", "posts", 0);
        store.create_run(&run).unwrap();
        assert!(store.create_run(&run).is_err());

        store
            .append_result("run-1", &create_result_record("first"))
            .unwrap();
        store
            .append_result("run-1", &create_result_record("second"))
            .unwrap();

        let mut finished = run.clone();
        finished.status = RunStatus::Passed;
        finished.total_tests = 2;
        finished.passed_tests = 2;
        store.update_run(&finished).unwrap();

        assert_eq!(store.get_run("run-1").unwrap(), Some(finished));
        let names: Vec<_> = store
            .get_results("run-1")
            .unwrap()
            .into_iter()
            .map(|r| r.test_name)
            .collect();
        assert_eq!(names, vec!["first", "second"]);

        assert_eq!(store.get_run("missing").unwrap(), None);
        assert!(store.get_results("missing").unwrap().is_empty());
    }

    #[test]
    fn test_file_store_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        exercise_store(&FileRunStore::new(temp_dir.path()));
        assert!(temp_dir.path().join("runs/run-1/run.json").exists());
        assert!(temp_dir.path().join("runs/run-1/results.jsonl").exists());
    }

    #[test]
    fn test_memory_store_round_trip() {
        exercise_store(&MemoryRunStore::new());
    }

    #[test]
    fn test_list_runs_newest_first_with_filter() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileRunStore::new(temp_dir.path());
        store.create_run(&create_run_record("a", "posts", 30)).unwrap();
        store.create_run(&create_run_record("b", "users", 20)).unwrap();
        store.create_run(&create_run_record("c", "posts", 10)).unwrap();

        let ids: Vec<_> = store
            .list_runs(None, 10)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["c", "b", "a"]);

        let posts = store.list_runs(Some("posts"), 1).unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id, "c");
    }

    #[test]
    fn test_list_runs_on_empty_root() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileRunStore::new(temp_dir.path().join("nothing-here"));
        assert!(store.list_runs(None, 10).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_path_like_ids() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileRunStore::new(temp_dir.path());
        assert!(store.get_run("../etc").is_err());
        assert!(store.get_results("a/b").is_err());
        assert!(store.get_run("").is_err());
    }
}
