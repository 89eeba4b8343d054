use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use probe::config::{ConfigLoader, ProbeConfig};
use probe::history::printer;
use probe::history::{FileRunStore, MemoryRunStore, RunStore};
use probe::http::Client;
use probe::runner::{
    CancelHandle, DirectorySuiteSource, RunResponse, SuiteService, TestReporter,
};
use tracing::warn;

pub type Result<T> = std::result::Result<T, anyhow::Error>;

#[derive(Parser)]
#[command(author, version, about = "Run YAML-defined HTTP test suites", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 配置文件路径（默认查找 probe.toml）
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// 输出更多信息
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 运行套件文件或套件 ID
    Run(RunArgs),

    /// 列出最近的运行
    Runs {
        /// 只显示该套件的运行
        #[arg(long)]
        suite: Option<String>,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// 显示一次运行的测试结果
    Results { run_id: String },
}

#[derive(Args)]
pub struct RunArgs {
    /// 套件文件路径，或 suites 目录下的套件 ID
    pub target: String,

    /// 配置文件中的环境名
    #[arg(short, long)]
    pub env: Option<String>,

    /// 变量覆盖 key=value，可重复
    #[arg(long = "var", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,

    /// 输出 JSON 汇总
    #[arg(long)]
    pub json: bool,

    /// 不保存运行记录
    #[arg(long)]
    pub no_record: bool,

    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// 整个运行的超时，0 表示不限制
    #[arg(long)]
    pub suite_timeout_ms: Option<u64>,

    #[arg(long)]
    pub parallelism: Option<usize>,

    #[arg(long)]
    pub retries: Option<u32>,
}

fn parse_var(s: &str) -> std::result::Result<(String, String), String> {
    ConfigLoader::parse_cli_var(s).ok_or_else(|| format!("expected key=value, got '{}'", s))
}

pub async fn run(cli: Cli) -> Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_path(path)?,
        None => ConfigLoader::find_and_load()?,
    };

    match cli.command {
        Commands::Run(args) => run_suite(args, &config, cli.verbose).await,
        Commands::Runs { suite, limit } => {
            let store = FileRunStore::new(config.runner.resolved_data_dir());
            printer::list_runs(&store, suite.as_deref(), limit)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Results { run_id } => {
            let store = FileRunStore::new(config.runner.resolved_data_dir());
            let Some(run) = store.get_run(&run_id)? else {
                bail!("run '{}' not found", run_id);
            };
            println!("{}", printer::runs_table(std::slice::from_ref(&run)));
            printer::show_results(&store, &run_id)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_suite(args: RunArgs, config: &ProbeConfig, verbose: bool) -> Result<ExitCode> {
    let mut options = config.runner.run_options();
    if let Some(ms) = args.timeout_ms {
        options.request_timeout = std::time::Duration::from_millis(ms.max(1));
    }
    if let Some(ms) = args.suite_timeout_ms {
        options.suite_timeout = (ms > 0).then(|| std::time::Duration::from_millis(ms));
    }
    if let Some(n) = args.parallelism {
        options.parallelism = n.max(1);
    }
    if let Some(n) = args.retries {
        options.retries = n;
    }

    let seed = ConfigLoader::build_seed(config, args.env.as_deref(), &args.vars)?;
    let store: Arc<dyn RunStore> = if args.no_record {
        Arc::new(MemoryRunStore::new())
    } else {
        Arc::new(FileRunStore::new(config.runner.resolved_data_dir()))
    };
    let client = Client::with_timeout(options.request_timeout)?;
    let source = Arc::new(DirectorySuiteSource::new(&config.runner.suites_dir));
    let service = SuiteService::new(source, store, client, options).with_seed(seed);

    let target = Path::new(&args.target);
    let (suite_id, suite) = if target.is_file() {
        let text = std::fs::read_to_string(target)
            .with_context(|| format!("failed to read {}", target.display()))?;
        let suite_id = target
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("suite")
            .to_string();
        (suite_id, service.parse(&text)?)
    } else {
        (args.target.clone(), service.load(&args.target)?)
    };

    let (handle, signal) = CancelHandle::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping run");
            handle.cancel();
        }
    });

    let reporter = TestReporter::new(verbose);
    if !args.json {
        reporter.print_header(&args.target, suite.len());
    }

    let run = service.execute(&suite_id, &suite, signal).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&RunResponse::from(&run))?);
    } else {
        reporter.print_run(&run);
    }

    Ok(if run.status == probe::runner::RunStatus::Passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}
