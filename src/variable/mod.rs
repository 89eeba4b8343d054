pub mod capture;
pub mod resolver;
pub mod types;

pub use capture::{CaptureError, CaptureSource, VariableCapture, capture};
pub use resolver::{ResolutionError, VariableResolver};
pub use types::Environment;
