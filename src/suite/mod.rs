pub mod parser;
pub mod types;

// Re-export commonly used types
pub use parser::SuiteParser;
pub use types::{Expectation, Payload, RequestSpec, SuiteDefinition, SuiteError, TestCase};

/// 从文件路径解析套件
pub fn parse_file<P: AsRef<std::path::Path>>(path: P) -> crate::Result<SuiteDefinition> {
    let content = std::fs::read_to_string(path)?;
    Ok(SuiteParser::parse(&content)?)
}

/// 从字符串内容解析套件
pub fn parse_content(content: &str) -> Result<SuiteDefinition, SuiteError> {
    SuiteParser::parse(content)
}
