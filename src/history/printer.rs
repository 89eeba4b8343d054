use super::model::{TestResultRecord, TestRunRecord};
use super::storage::RunStore;
use crate::Result;
use crate::runner::RunStatus;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, Table};

/// 错误消息在表格中的最大宽度
const ERROR_COLUMN_LEN: usize = 80;

pub fn list_runs(store: &dyn RunStore, suite_id: Option<&str>, limit: usize) -> Result<()> {
    let runs = store.list_runs(suite_id, limit)?;
    println!("{}", runs_table(&runs));
    Ok(())
}

pub fn show_results(store: &dyn RunStore, run_id: &str) -> Result<()> {
    let results = store.get_results(run_id)?;
    println!("{}", results_table(&results));
    Ok(())
}

pub fn runs_table(runs: &[TestRunRecord]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "ID", "Suite", "Status", "Passed", "Failed", "Total", "Started",
    ]);

    for run in runs {
        let status_color = match run.status {
            RunStatus::Passed => Color::Green,
            RunStatus::Failed => Color::Red,
            RunStatus::Aborted => Color::Yellow,
            RunStatus::Created | RunStatus::Running => Color::Blue,
        };

        table.add_row(vec![
            Cell::new(short_id(&run.id)),
            Cell::new(&run.suite_id),
            Cell::new(run.status).fg(status_color),
            Cell::new(run.passed_tests).fg(Color::Green),
            Cell::new(run.failed_tests).fg(Color::Red),
            Cell::new(run.total_tests),
            Cell::new(run.started_at.format("%Y-%m-%d %H:%M:%S")).add_attribute(Attribute::Dim),
        ]);
    }

    table
}

pub fn results_table(results: &[TestResultRecord]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Test", "Result", "Status", "Duration", "Error"]);

    for result in results {
        let (label, color) = if result.passed {
            ("PASS", Color::Green)
        } else {
            ("FAIL", Color::Red)
        };

        table.add_row(vec![
            Cell::new(&result.test_name),
            Cell::new(label).fg(color),
            Cell::new(result.status_code),
            Cell::new(format!("{}ms", result.duration_ms)),
            Cell::new(crate::assertion::truncate(&result.error_message, ERROR_COLUMN_LEN))
                .add_attribute(Attribute::Dim),
        ]);
    }

    table
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_runs_table_contains_short_id() {
        let run = TestRunRecord {
            id: "0123456789abcdef".to_string(),
            suite_id: "posts".to_string(),
            status: RunStatus::Failed,
            total_tests: 2,
            passed_tests: 1,
            failed_tests: 1,
            started_at: Utc::now(),
            completed_at: None,
        };
        let rendered = runs_table(&[run]).to_string();
        assert!(rendered.contains("01234567"));
        assert!(!rendered.contains("0123456789"));
        assert!(rendered.contains("failed"));
    }

    #[test]
    fn test_short_id_handles_short_input() {
        assert_eq!(short_id("abc"), "abc");
    }
}
