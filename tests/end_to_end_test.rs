use probe::history::{MemoryRunStore, RunStore};
use probe::http::Client;
use probe::runner::{
    CancelSignal, Failure, RunOptions, RunOrchestrator, RunResponse, RunStatus, TestRun,
};
use probe::suite::SuiteParser;
use probe::variable::Environment;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{any, body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// 用 mock 服务器地址作为 base_url 运行套件
async fn run_suite(server: &MockServer, yaml: &str, options: RunOptions) -> (TestRun, Arc<MemoryRunStore>) {
    let seed = Environment::new().with("base_url", server.uri());
    let suite = SuiteParser::parse_with_seed(yaml, &seed).unwrap();

    let store = Arc::new(MemoryRunStore::new());
    let orchestrator = RunOrchestrator::new(Client::new().unwrap(), store.clone(), options);
    let run = orchestrator.create_run("e2e", suite.len());
    let run = orchestrator.run(run, &suite, CancelSignal::never()).await;
    (run, store)
}

/// 两个通过的测试
#[tokio::test]
async fn test_all_tests_pass() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 7}])))
        .mount(&mock_server)
        .await;

    let yaml = r#"
tests:
  - name: List posts
    request:
      method: GET
      path: /posts
    expect:
      status: 200
  - name: List users
    request:
      method: GET
      path: /users
    expect:
      status: 200
"#;
    let (run, store) = run_suite(&mock_server, yaml, RunOptions::default()).await;

    assert_eq!(run.status, RunStatus::Passed);
    let response = RunResponse::from(&run);
    assert_eq!(response.total_tests, 2);
    assert_eq!(response.passed_tests, 2);
    assert_eq!(response.failed_tests, 0);
    assert!(response.results.iter().all(|r| r.passed && r.error.is_empty()));
    assert!(response.results.iter().all(|r| r.status_code == 200));

    // 持久化的记录与内存中的运行一致
    let record = store.get_run(&run.id).unwrap().unwrap();
    assert_eq!(record.status, RunStatus::Passed);
    assert_eq!(record.passed_tests, 2);
    let results = store.get_results(&run.id).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].test_name, "List posts");
    assert_eq!(results[1].test_name, "List users");
}

/// 期望不匹配：记录实际状态码与诊断信息
#[tokio::test]
async fn test_expectation_mismatch() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/posts/99"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&mock_server)
        .await;

    let yaml = r#"
tests:
  - name: Missing post
    request:
      method: GET
      path: /posts/99
    expect:
      status: 200
"#;
    let (run, _) = run_suite(&mock_server, yaml, RunOptions::default()).await;

    assert_eq!(run.status, RunStatus::Failed);
    let result = &run.results[0];
    assert_eq!(result.status_code, 404);
    assert!(matches!(result.failure, Some(Failure::Expectation(_))));
    assert!(result.error_message().contains("expected 200"));
    assert!(result.error_message().contains("got 404"));
}

/// 单个请求超时不影响后续测试
#[tokio::test]
async fn test_timeout_is_isolated() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(2000)))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let yaml = r#"
tests:
  - name: Slow posts
    request:
      method: GET
      path: /posts
    timeout_ms: 100
    expect:
      status: 200
  - name: Users
    request:
      method: GET
      path: /users
    expect:
      status: 200
"#;
    let (run, _) = run_suite(&mock_server, yaml, RunOptions::default()).await;

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.results.len(), 2);

    let slow = &run.results[0];
    assert_eq!(slow.status_code, 0);
    assert!(matches!(slow.failure, Some(Failure::Transport(_))));
    assert!(slow.error_message().contains("timeout"));

    let users = &run.results[1];
    assert!(users.passed());
    assert_eq!(users.status_code, 200);
}

/// 连接失败归类为网络错误
#[tokio::test]
async fn test_connection_refused() {
    let yaml = r#"
tests:
  - name: Nobody home
    request:
      method: GET
      path: http://127.0.0.1:1/health
"#;
    let suite = SuiteParser::parse(yaml).unwrap();
    let orchestrator = RunOrchestrator::new(
        Client::new().unwrap(),
        Arc::new(MemoryRunStore::new()),
        RunOptions::default(),
    );
    let run = orchestrator.create_run("e2e", suite.len());
    let run = orchestrator.run(run, &suite, CancelSignal::never()).await;

    let result = &run.results[0];
    assert_eq!(result.status_code, 0);
    assert!(result.error_message().starts_with("transport error (network"));
}

/// 捕获的变量在后续测试中可用
#[tokio::test]
async fn test_capture_flows_to_next_test() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_json(json!({"user": "alice", "password": "secret"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"auth": {"token": "abc123"}, "user_id": 42})),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/42"))
        .and(header("Authorization", "Bearer abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 42, "name": "Alice"})))
        .mount(&mock_server)
        .await;

    let yaml = r#"
env:
  password: secret
tests:
  - name: Login
    request:
      method: POST
      path: /login
      body:
        user: alice
        password: "{{password}}"
    expect:
      status: 200
    capture:
      token: body.auth.token
      user_id: body.user_id
  - name: Profile
    request:
      method: GET
      path: /users/{{user_id}}
      headers:
        Authorization: Bearer {{token}}
    expect:
      status: 200
      body:
        name: Alice
"#;
    let (run, _) = run_suite(&mock_server, yaml, RunOptions::default()).await;

    assert_eq!(run.status, RunStatus::Passed, "{:?}", run.results);
    assert_eq!(run.results[1].url, format!("{}/users/42", mock_server.uri()));
}

/// 未定义变量：请求不发出，测试失败，运行继续
#[tokio::test]
async fn test_undefined_variable_fails_single_test() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let yaml = r#"
tests:
  - name: Needs id
    request:
      method: GET
      path: /posts/{{post_id}}
    expect:
      status: 200
  - name: Health
    request:
      method: GET
      path: /health
    expect:
      status: 200
"#;
    let (run, _) = run_suite(&mock_server, yaml, RunOptions::default()).await;

    let first = &run.results[0];
    assert_eq!(first.status_code, 0);
    assert!(matches!(first.failure, Some(Failure::Resolution(_))));
    assert_eq!(
        first.error_message(),
        "resolution error: undefined variable 'post_id' in test 'Needs id'"
    );
    assert!(run.results[1].passed());
    assert_eq!(run.passed_tests(), 1);
    assert_eq!(run.failed_tests(), 1);
}

/// 期望失败时不执行捕获
#[tokio::test]
async fn test_failed_test_does_not_capture() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"id": 5})))
        .mount(&mock_server)
        .await;
    Mock::given(any())
        .and(path("/posts/5"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let yaml = r#"
tests:
  - name: Create
    request:
      method: POST
      path: /posts
    expect:
      status: 201
    capture:
      post_id: body.id
  - name: Read back
    request:
      method: GET
      path: /posts/{{post_id}}
"#;
    let (run, _) = run_suite(&mock_server, yaml, RunOptions::default()).await;

    assert_eq!(run.results[0].status_code, 500);
    assert!(matches!(
        run.results[1].failure,
        Some(Failure::Resolution(_))
    ));
}

/// 捕获路径不存在时测试失败
#[tokio::test]
async fn test_capture_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "alice"})))
        .mount(&mock_server)
        .await;

    let yaml = r#"
tests:
  - name: Me
    request:
      method: GET
      path: /me
    expect:
      status: 200
    capture:
      token: body.auth.token
"#;
    let (run, _) = run_suite(&mock_server, yaml, RunOptions::default()).await;

    let result = &run.results[0];
    assert_eq!(result.status_code, 200);
    assert!(matches!(result.failure, Some(Failure::Capture(_))));
    assert!(result.error_message().starts_with("capture error"));
}

/// 查询参数、请求头、请求体与 body 子集匹配
#[tokio::test]
async fn test_request_shape_and_body_subset() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/posts/3"))
        .and(query_param("notify", "false"))
        .and(header("X-Api-Key", "key-1"))
        .and(header("Content-Type", "application/json"))
        .and(body_json(json!({"title": "updated", "tags": ["a", "b"], "draft": false})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Request-Id", "req-9")
                .set_body_json(json!({
                    "id": 3,
                    "title": "updated",
                    "tags": ["a", "b"],
                    "author": {"id": 1, "name": "Alice"},
                    "updated_at": "2024-01-01T00:00:00Z"
                })),
        )
        .mount(&mock_server)
        .await;

    let yaml = r#"
env:
  api_key: key-1
tests:
  - name: Update post
    request:
      method: put
      path: /posts/3
      query:
        notify: false
      headers:
        X-Api-Key: "{{api_key}}"
      body:
        title: updated
        tags: [a, b]
        draft: false
    expect:
      status: 200
      headers:
        x-request-id: req-9
      body:
        id: 3
        tags: [a, b]
        author:
          name: Alice
"#;
    let (run, _) = run_suite(&mock_server, yaml, RunOptions::default()).await;

    assert_eq!(run.status, RunStatus::Passed, "{:?}", run.results);
    assert_eq!(run.results[0].method, "PUT");
}

/// body 子集中的值不一致时逐项报告
#[tokio::test]
async fn test_body_mismatch_reports_path() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/posts/1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": 1, "author": {"name": "Bob"}})),
        )
        .mount(&mock_server)
        .await;

    let yaml = r#"
tests:
  - name: Author
    request:
      method: GET
      path: /posts/1
    expect:
      body:
        author:
          name: Alice
"#;
    let (run, _) = run_suite(&mock_server, yaml, RunOptions::default()).await;

    let message = run.results[0].error_message();
    assert!(message.contains("body.author.name"), "{}", message);
    assert!(message.contains("\"Alice\""), "{}", message);
}

/// 纯文本 body 精确匹配
#[tokio::test]
async fn test_text_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
        .mount(&mock_server)
        .await;

    let yaml = r#"
tests:
  - name: Ping
    request:
      method: GET
      path: /ping
    expect:
      status: 200
      body: pong
"#;
    let (run, _) = run_suite(&mock_server, yaml, RunOptions::default()).await;
    assert!(run.results[0].passed());
}

/// 并行套件的结果按声明顺序排列
#[tokio::test]
async fn test_parallel_keeps_declaration_order() {
    let mock_server = MockServer::start().await;

    for (route, delay) in [("/a", 300), ("/b", 100), ("/c", 0)] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(delay)))
            .mount(&mock_server)
            .await;
    }

    let yaml = r#"
parallel: true
tests:
  - name: A
    request: { method: GET, path: /a }
    expect: { status: 200 }
  - name: B
    request: { method: GET, path: /b }
    expect: { status: 200 }
  - name: C
    request: { method: GET, path: /c }
    expect: { status: 200 }
"#;
    let (run, store) = run_suite(&mock_server, yaml, RunOptions::default()).await;

    assert_eq!(run.status, RunStatus::Passed);
    let names: Vec<_> = run.results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["A", "B", "C"]);

    let stored: Vec<_> = store
        .get_results(&run.id)
        .unwrap()
        .into_iter()
        .map(|r| r.test_name)
        .collect();
    assert_eq!(stored, vec!["A", "B", "C"]);
}

/// 同一套件运行两次，结果一致
#[tokio::test]
async fn test_runs_are_reproducible() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/sessions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "s-1"})))
        .mount(&mock_server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/sessions/s-1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let yaml = r#"
tests:
  - name: Open
    request:
      method: POST
      path: /sessions
    expect:
      status: 201
    capture:
      session: body.id
  - name: Close
    request:
      method: DELETE
      path: /sessions/{{session}}
    expect:
      status: 204
  - name: Close again
    request:
      method: DELETE
      path: /sessions/{{session}}
    expect:
      status: 404
"#;
    let (first, _) = run_suite(&mock_server, yaml, RunOptions::default()).await;
    let (second, _) = run_suite(&mock_server, yaml, RunOptions::default()).await;

    let outcome = |run: &TestRun| {
        run.results
            .iter()
            .map(|r| (r.name.clone(), r.passed(), r.status_code))
            .collect::<Vec<_>>()
    };
    assert_eq!(outcome(&first), outcome(&second));
    assert_ne!(first.id, second.id);
}

/// 传输错误按配置重试
#[tokio::test]
async fn test_retry_after_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(2000)))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let yaml = r#"
tests:
  - name: Flaky
    request:
      method: GET
      path: /flaky
    timeout_ms: 200
    expect:
      status: 200
"#;
    let options = RunOptions {
        retries: 1,
        retry_delay: Duration::from_millis(10),
        ..RunOptions::default()
    };
    let (run, _) = run_suite(&mock_server, yaml, options).await;

    let result = &run.results[0];
    assert!(result.passed(), "{}", result.error_message());
    assert_eq!(result.attempts, 2);
}

/// 期望失败不会重试
#[tokio::test]
async fn test_no_retry_on_expectation_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let yaml = r#"
tests:
  - name: Broken
    request:
      method: GET
      path: /broken
    expect:
      status: 200
"#;
    let options = RunOptions {
        retries: 3,
        retry_delay: Duration::from_millis(10),
        ..RunOptions::default()
    };
    let (run, _) = run_suite(&mock_server, yaml, options).await;
    assert_eq!(run.results[0].attempts, 1);
    assert_eq!(run.results[0].status_code, 500);
}
