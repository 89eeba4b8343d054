/// 期望求值模块 - 比较实际响应与 `expect` 块
mod evaluator;
pub mod extractor;
mod matcher;
mod types;

pub use evaluator::evaluate;
pub use matcher::match_subset;
pub use types::{MAX_DISPLAY_LEN, Mismatch, Verdict, truncate};
