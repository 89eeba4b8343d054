use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ProbeError;
use crate::runner::RunOptions;
use crate::variable::{Environment, VariableResolver};
use crate::Result;

/// `probe.toml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub runner: RunnerConfig,

    /// 命名环境，例如 `[environments.staging]`
    pub environments: BTreeMap<String, BTreeMap<String, toml::Value>>,
}

/// `[runner]` 段
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub timeout_ms: u64,
    /// 0 表示不限制
    pub suite_timeout_ms: u64,
    pub parallelism: usize,
    pub retries: u32,
    pub retry_delay_ms: u64,
    pub suites_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            suite_timeout_ms: 0,
            parallelism: 4,
            retries: 0,
            retry_delay_ms: 500,
            suites_dir: PathBuf::from("suites"),
            data_dir: PathBuf::from(".probe"),
        }
    }
}

impl RunnerConfig {
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            request_timeout: Duration::from_millis(self.timeout_ms.max(1)),
            suite_timeout: (self.suite_timeout_ms > 0)
                .then(|| Duration::from_millis(self.suite_timeout_ms)),
            parallelism: self.parallelism.max(1),
            retries: self.retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    /// `PROBE_DATA_DIR` 优先于配置文件
    pub fn resolved_data_dir(&self) -> PathBuf {
        std::env::var_os("PROBE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| self.data_dir.clone())
    }
}

impl ProbeConfig {
    /// 取出命名环境的变量，`${VAR}` 替换为系统环境变量
    pub fn environment(&self, name: &str) -> Result<Vec<(String, String)>> {
        let table = self
            .environments
            .get(name)
            .ok_or_else(|| ProbeError::Config(format!("unknown environment '{}'", name)))?;

        table
            .iter()
            .map(|(key, value)| {
                let text = match value {
                    toml::Value::String(s) => s.clone(),
                    toml::Value::Integer(i) => i.to_string(),
                    toml::Value::Float(f) => f.to_string(),
                    toml::Value::Boolean(b) => b.to_string(),
                    _ => {
                        return Err(ProbeError::Config(format!(
                            "environments.{}.{} must be a scalar",
                            name, key
                        )));
                    }
                };
                Ok((key.clone(), VariableResolver::resolve_env_vars(&text)))
            })
            .collect()
    }
}

/// 配置文件加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 配置文件名
    const CONFIG_FILE: &'static str = "probe.toml";

    /// 从指定路径加载配置文件
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<ProbeConfig> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ProbeError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        toml::from_str(&content)
            .map_err(|e| ProbeError::Config(format!("failed to parse {}: {}", path.display(), e)))
    }

    /// 查找并加载配置文件，找不到时使用默认配置
    /// 查找顺序：
    /// 1. 当前目录及其父目录
    /// 2. 用户配置目录 ~/.config/probe/
    pub fn find_and_load() -> Result<ProbeConfig> {
        match Self::find_config_path() {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config");
                Self::load_from_path(path)
            }
            None => Ok(ProbeConfig::default()),
        }
    }

    pub fn find_config_path() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let config_path = current.join(Self::CONFIG_FILE);
            if config_path.is_file() {
                return Some(config_path);
            }
            if !current.pop() {
                break;
            }
        }

        let user_path = dirs::home_dir()?
            .join(".config")
            .join("probe")
            .join(Self::CONFIG_FILE);
        user_path.is_file().then_some(user_path)
    }

    /// 构建运行前的初始变量
    ///
    /// 先定义者优先：CLI 变量，其次配置文件环境，最后才是套件自己的 `env`。
    pub fn build_seed(
        config: &ProbeConfig,
        env_name: Option<&str>,
        cli_vars: &[(String, String)],
    ) -> Result<Environment> {
        let mut seed: Environment = cli_vars.iter().cloned().collect();

        if let Some(name) = env_name {
            for (key, value) in config.environment(name)? {
                seed = seed.with_default(key, value);
            }
        }

        Ok(seed)
    }

    /// 解析 CLI 变量参数 "key=value"
    pub fn parse_cli_var(s: &str) -> Option<(String, String)> {
        s.split_once('=')
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .filter(|(k, _)| !k.is_empty())
    }
}
