mod cli;

use std::process::ExitCode;

use clap::Parser;
use cli::Cli;
use colored::Colorize;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // 初始化日志系统
    probe::logger::init_logger(if cli.verbose { "info" } else { "warn" });

    match cli::run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", "error".red().bold(), e);
            ExitCode::from(2)
        }
    }
}
