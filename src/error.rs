use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("套件错误: {0}")]
    Suite(#[from] crate::suite::SuiteError),

    #[error("未找到套件: {0}")]
    SuiteNotFound(String),

    #[error("无效的 HTTP 方法: {0}")]
    InvalidMethod(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("存储错误: {0}")]
    Store(String),

    #[error("HTTP 客户端错误: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON 解析错误: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("URL 解析错误: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for ProbeError {
    fn from(err: anyhow::Error) -> Self {
        ProbeError::Other(err.to_string())
    }
}

/// Result type for probe crate
pub type Result<T> = std::result::Result<T, ProbeError>;
