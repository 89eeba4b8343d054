pub mod cancel;
pub mod orchestrator;
pub mod reporter;
pub mod response;
pub mod service;
pub mod types;

pub use cancel::{CancelHandle, CancelRegistry, CancelSignal};
pub use orchestrator::{BASE_URL_KEY, RunOptions, RunOrchestrator};
pub use reporter::TestReporter;
pub use response::{RunResponse, RunResultEntry};
pub use service::{DirectorySuiteSource, RunHandle, SuiteService, SuiteSource};
pub use types::{Failure, RunStatus, TestResult, TestRun};
