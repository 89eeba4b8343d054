use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::assertion::evaluate;
use crate::history::{RunStore, TestResultRecord, TestRunRecord};
use crate::http::{BaseUrl, Client, Method, Request, Response, TransportError};
use crate::runner::cancel::CancelSignal;
use crate::runner::types::{Failure, TestResult, TestRun};
use crate::suite::{Expectation, Payload, SuiteDefinition, TestCase};
use crate::variable::{Environment, ResolutionError, VariableResolver, capture};

/// 相对路径拼接时使用的变量
pub const BASE_URL_KEY: &str = "base_url";

/// 运行参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// 单个请求的默认超时（测试可用 `timeout_ms` 覆盖）
    pub request_timeout: Duration,

    /// 整个运行的超时，到期后运行被中止
    pub suite_timeout: Option<Duration>,

    /// 并行套件同时进行的请求数
    pub parallelism: usize,

    /// 传输错误的重试次数
    pub retries: u32,

    pub retry_delay: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            request_timeout: Client::DEFAULT_TIMEOUT,
            suite_timeout: None,
            parallelism: 4,
            retries: 0,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// 替换完变量、可以发送的测试
struct PreparedTest {
    request: Request,
    expect: Expectation,
}

/// 一次发送（含重试）的结果
struct Sent {
    outcome: Result<Response, TransportError>,
    attempts: u32,
    elapsed: Duration,
}

/// 运行中止的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    Cancelled,
    TimedOut,
}

/// 驱动一次运行：按顺序（或并行）执行测试并记录结果
///
/// 每个运行拥有自己的 [`TestRun`] 与变量环境，唯一共享的是 HTTP 连接池与存储。
pub struct RunOrchestrator {
    client: Client,
    store: Arc<dyn RunStore>,
    options: RunOptions,
}

impl RunOrchestrator {
    pub fn new(client: Client, store: Arc<dyn RunStore>, options: RunOptions) -> Self {
        Self {
            client,
            store,
            options,
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// 创建运行并写入记录，记录状态为 running
    pub fn create_run(&self, suite_id: &str, declared_tests: usize) -> TestRun {
        let run = TestRun::new(suite_id, declared_tests);
        if let Err(e) = self.store.create_run(&TestRunRecord::from_run(&run)) {
            warn!("Failed to save run {}: {}", run.id, e);
        }
        run
    }

    /// 执行整个套件，返回终态的运行
    pub async fn run(
        &self,
        mut run: TestRun,
        suite: &SuiteDefinition,
        cancel: CancelSignal,
    ) -> TestRun {
        let deadline = self.options.suite_timeout.map(|t| Instant::now() + t);
        let parallel = suite.parallel && self.options.parallelism > 1;

        run.start();
        self.persist_run(&run);
        info!(
            run_id = %run.id,
            suite_id = %run.suite_id,
            tests = suite.len(),
            parallel,
            "run started"
        );

        let interrupt = if parallel {
            self.run_parallel(&mut run, suite, &cancel, deadline).await
        } else {
            self.run_sequential(&mut run, suite, &cancel, deadline).await
        };

        match interrupt {
            Some(Interrupt::Cancelled) => warn!(run_id = %run.id, "run cancelled"),
            Some(Interrupt::TimedOut) => warn!(run_id = %run.id, "suite timeout reached"),
            None => {}
        }

        run.finish(interrupt.is_some());
        self.persist_run(&run);
        info!(
            run_id = %run.id,
            status = %run.status,
            passed = run.passed_tests(),
            failed = run.failed_tests(),
            "run finished"
        );
        run
    }

    /// 顺序执行；每一步的捕获结果传给下一步
    async fn run_sequential(
        &self,
        run: &mut TestRun,
        suite: &SuiteDefinition,
        cancel: &CancelSignal,
        deadline: Option<Instant>,
    ) -> Option<Interrupt> {
        let mut env = suite.env.clone();

        for test in &suite.tests {
            let (result, next_env) = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Some(Interrupt::Cancelled),
                _ = expired(deadline) => return Some(Interrupt::TimedOut),
                outcome = self.run_test(test, &env) => outcome,
            };
            env = next_env;
            self.record(run, result);
        }

        None
    }

    /// 并行执行（仅用于没有捕获的套件），结果仍按声明顺序记录
    async fn run_parallel(
        &self,
        run: &mut TestRun,
        suite: &SuiteDefinition,
        cancel: &CancelSignal,
        deadline: Option<Instant>,
    ) -> Option<Interrupt> {
        // 先收集 future，否则 map 闭包的生命周期会让外层 future 无法 spawn
        let pending: Vec<_> = suite
            .tests
            .iter()
            .map(|test| self.run_test(test, &suite.env))
            .collect();
        let mut results = pin!(stream::iter(pending).buffered(self.options.parallelism));

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Some(Interrupt::Cancelled),
                _ = expired(deadline) => return Some(Interrupt::TimedOut),
                next = results.next() => next,
            };
            match next {
                Some((result, _)) => self.record(run, result),
                None => return None,
            }
        }
    }

    /// 执行单个测试，返回结果与下一步的环境
    ///
    /// 失败时环境保持不变。
    async fn run_test(&self, test: &TestCase, env: &Environment) -> (TestResult, Environment) {
        let mut result = TestResult {
            position: test.position,
            name: test.name.clone(),
            method: test.request.method.clone(),
            url: test.request.path.clone(),
            status_code: 0,
            duration: Duration::ZERO,
            attempts: 0,
            failure: None,
        };

        let prepared = match prepare(test, env) {
            Ok(prepared) => prepared,
            Err(failure) => {
                result.failure = Some(failure);
                return (result, env.clone());
            }
        };
        result.method = prepared.request.method.to_string();
        result.url = prepared.request.full_url().to_string();

        let timeout = test.timeout.unwrap_or(self.options.request_timeout);
        let sent = self.send(prepared.request, timeout).await;
        result.attempts = sent.attempts;
        result.duration = sent.elapsed;

        let response = match sent.outcome {
            Ok(response) => response,
            Err(e) => {
                result.failure = Some(Failure::Transport(e));
                return (result, env.clone());
            }
        };
        result.status_code = response.status.code();
        result.duration = response.duration;

        let verdict = evaluate(&prepared.expect, &response);
        if !verdict.passed() {
            result.failure = Some(Failure::Expectation(verdict.mismatches));
            return (result, env.clone());
        }

        let mut next = env.clone();
        for rule in &test.captures {
            next = match capture(&response, rule, next) {
                Ok(updated) => updated,
                Err(e) => {
                    result.failure = Some(Failure::Capture(e));
                    return (result, env.clone());
                }
            };
        }

        (result, next)
    }

    /// 发送请求，传输错误时按配置重试
    async fn send(&self, request: Request, timeout: Duration) -> Sent {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let start = Instant::now();
            match self.client.execute(request.clone(), Some(timeout)).await {
                Ok(response) => {
                    return Sent {
                        outcome: Ok(response),
                        attempts,
                        elapsed: start.elapsed(),
                    };
                }
                Err(e) if attempts <= self.options.retries => {
                    debug!(attempt = attempts, error = %e, "request failed, retrying");
                    tokio::time::sleep(self.options.retry_delay).await;
                }
                Err(e) => {
                    return Sent {
                        outcome: Err(e),
                        attempts,
                        elapsed: start.elapsed(),
                    };
                }
            }
        }
    }

    fn record(&self, run: &mut TestRun, result: TestResult) {
        if result.passed() {
            info!(test = %result.name, status = result.status_code, "test passed");
        } else {
            info!(test = %result.name, error = %result.error_message(), "test failed");
        }

        if let Err(e) = self
            .store
            .append_result(&run.id, &TestResultRecord::from_result(&result))
        {
            warn!("Failed to save result of '{}': {}", result.name, e);
        }
        run.record(result);
        self.persist_run(run);
    }

    fn persist_run(&self, run: &TestRun) {
        if let Err(e) = self.store.update_run(&TestRunRecord::from_run(run)) {
            warn!("Failed to update run {}: {}", run.id, e);
        }
    }
}

/// 套件超时；没有超时时永不返回
async fn expired(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

/// 替换变量并构建请求
fn prepare(test: &TestCase, env: &Environment) -> Result<PreparedTest, Failure> {
    let unresolved = |e: ResolutionError| Failure::Resolution(e.in_test(&test.name));
    let invalid = |detail: String| Failure::Transport(TransportError::request(detail));
    let template = &test.request;

    let method = VariableResolver::resolve(&template.method, env).map_err(unresolved)?;
    let path = VariableResolver::resolve(&template.path, env).map_err(unresolved)?;
    let method = Method::parse(&method).map_err(|e| invalid(e.to_string()))?;

    let url = if crate::http::types::is_absolute(&path) {
        url::Url::parse(path.trim()).map_err(|e| invalid(format!("invalid url '{}': {}", path, e)))?
    } else {
        let base = env
            .get(BASE_URL_KEY)
            .ok_or_else(|| unresolved(ResolutionError::new(BASE_URL_KEY)))?;
        BaseUrl::parse(base)
            .and_then(|base| base.join(&path))
            .map_err(|e| invalid(format!("invalid url '{}': {}", path, e)))?
    };

    let mut request = Request::new(method, url);
    for (name, value) in &template.headers {
        let value = VariableResolver::resolve(value, env).map_err(unresolved)?;
        request = request
            .with_header(name, &value)
            .map_err(Failure::Transport)?;
    }
    for (key, value) in &template.query {
        let value = VariableResolver::resolve(value, env).map_err(unresolved)?;
        request = request.with_query(key, value);
    }
    if let Some(body) = &template.body {
        request = match body.resolve(env).map_err(unresolved)? {
            Payload::Text(text) => request.with_text(text),
            Payload::Json(value) => request.with_json(&value),
        };
    }

    let expect = test.expect.resolve(env).map_err(unresolved)?;

    Ok(PreparedTest { request, expect })
}
