//! Chat-completion client for the sage assistant.
//!
//! Talks to any OpenAI-compatible endpoint, retries transient failures with a
//! constant delay, and assembles the grounded-answer prompt.

pub mod answer;
pub mod compatible;
pub mod error;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod provider;
pub mod retry;

pub use answer::generate_answer;
pub use compatible::CompatibleProvider;
pub use error::LlmError;
pub use provider::{ChatParams, LlmProvider, Message, Role};
pub use retry::RetryPolicy;
