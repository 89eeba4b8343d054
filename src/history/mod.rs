/// 运行历史 - 运行记录与测试结果的持久化
pub mod model;
pub mod printer;
pub mod storage;

pub use model::{TestResultRecord, TestRunRecord};
pub use storage::{FileRunStore, MemoryRunStore, RunStore};
