use probe::suite::SuiteError;
use probe::{ProbeError, Result};

#[test]
fn test_suite_error() {
    let err: ProbeError = SuiteError::schema("tests", "is required").into();
    assert_eq!(err.to_string(), "套件错误: invalid field 'tests': is required");
}

#[test]
fn test_suite_not_found() {
    let err = ProbeError::SuiteNotFound("posts".to_string());
    assert_eq!(err.to_string(), "未找到套件: posts");
}

#[test]
fn test_parse_error_reports_line() {
    let err = probe::suite::parse_content("tests:\n  - name: [unclosed\n").unwrap_err();
    match err {
        SuiteError::Parse { line, .. } => assert!(line >= 2),
        other => panic!("Expected Parse error, got {:?}", other),
    }
}

#[test]
fn test_error_conversion_from_anyhow() {
    let anyhow_err = anyhow::anyhow!("test anyhow error");
    let probe_err: ProbeError = anyhow_err.into();
    assert!(probe_err.to_string().contains("test anyhow error"));
}

#[test]
fn test_result_type() {
    fn returns_error() -> Result<()> {
        Err(ProbeError::Config("bad".to_string()))
    }

    let result = returns_error();
    assert!(result.is_err());
    match result {
        Err(ProbeError::Config(msg)) => assert_eq!(msg, "bad"),
        _ => panic!("Expected Config error"),
    }
}
