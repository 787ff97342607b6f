pub mod config;
pub mod error;
pub mod generation;
pub mod session;

// Re-export common error type
pub use error::{ForgeError, Result};
