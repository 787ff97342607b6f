//! Generation client implementations.

pub mod gemini_generation_client;

pub use gemini_generation_client::{DEFAULT_GEMINI_MODEL, GeminiGenerationClient, SamplingConfig};
