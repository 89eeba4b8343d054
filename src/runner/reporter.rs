use crate::http::Status;
use crate::runner::types::{Failure, RunStatus, TestResult, TestRun};
use colored::Colorize;

pub struct TestReporter {
    verbose: bool,
}

impl TestReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// 打印运行开始
    pub fn print_header(&self, source: &str, total: usize) {
        println!("\nRunning {} tests from {}...\n", total, source.bold());
    }

    /// 打印整个运行
    pub fn print_run(&self, run: &TestRun) {
        for result in &run.results {
            self.print_result(result);
        }
        self.print_summary(run);
    }

    /// 打印单个测试结果
    pub fn print_result(&self, result: &TestResult) {
        let symbol = if result.passed() {
            "✓".green()
        } else {
            "✗".red()
        };

        let code = Status::new(result.status_code);
        let status = if code.code() == 0 {
            "---".dimmed()
        } else if code.is_success() {
            code.code().to_string().green()
        } else if code.is_redirect() {
            code.code().to_string().cyan()
        } else if code.is_client_error() {
            code.code().to_string().yellow()
        } else if code.is_server_error() {
            code.code().to_string().red()
        } else {
            code.code().to_string().normal()
        };

        println!(
            " {} [{}] {} - {} {} {} ({}ms)",
            symbol,
            result.position,
            result.name,
            result.method.cyan(),
            result.url,
            status,
            result.duration.as_millis()
        );

        if self.verbose && result.attempts > 1 {
            println!("   {}", format!("{} attempts", result.attempts).dimmed());
        }

        match &result.failure {
            None => {}
            Some(Failure::Expectation(mismatches)) => {
                println!("   {}:", "Expectation failed".red().bold());
                for mismatch in mismatches {
                    println!("     {} {}", "✗".red(), mismatch);
                }
                println!();
            }
            Some(failure) => {
                println!("   {}: {}", "Error".red().bold(), failure);
                println!();
            }
        }
    }

    /// 打印运行摘要
    pub fn print_summary(&self, run: &TestRun) {
        println!("\n{}", "━".repeat(50));
        println!("{}", "Summary".bold());
        println!("{}", "━".repeat(50));

        if run.failed_tests() == 0 {
            println!(
                "  {}: {} passed, {} total",
                "Tests".bold(),
                run.passed_tests().to_string().green(),
                run.total_tests()
            );
        } else {
            println!(
                "  {}: {} passed, {} failed, {} total",
                "Tests".bold(),
                run.passed_tests().to_string().green(),
                run.failed_tests().to_string().red(),
                run.total_tests()
            );
        }

        if run.status == RunStatus::Aborted {
            let skipped = run.declared_tests.saturating_sub(run.total_tests());
            println!(
                "  {}: {} tests not run",
                "Aborted".yellow().bold(),
                skipped
            );
        }

        println!(
            "  {}: {:.3}s",
            "Duration".bold(),
            run.total_duration().as_secs_f64()
        );
        println!("  {}: {}", "Run".bold(), run.id.dimmed());
        println!();
    }
}

impl Default for TestReporter {
    fn default() -> Self {
        Self::new(false)
    }
}
