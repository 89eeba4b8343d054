pub mod assertion;
pub mod config;
pub mod error;
pub mod history;
pub mod http;
pub mod logger;
pub mod runner;
pub mod suite;
pub mod variable;

// Re-export commonly used types
pub use error::{ProbeError, Result};
