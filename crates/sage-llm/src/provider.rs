use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Hard ceiling for `max_tokens` on the wire, whatever the caller asks for.
pub const MAX_TOKENS_CEILING: u32 = 4096;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }
}

/// Sampling parameters for one chat call.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
}

impl Default for ChatParams {
    fn default() -> Self {
        Self {
            model: "Qwen/Qwen2.5-72B-Instruct".into(),
            temperature: 0.7,
            max_tokens: 2000,
            top_p: 0.9,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

impl ChatParams {
    /// `max_tokens` clamped to [`MAX_TOKENS_CEILING`].
    #[must_use]
    pub fn capped_max_tokens(&self) -> u32 {
        self.max_tokens.min(MAX_TOKENS_CEILING)
    }
}

pub trait LlmProvider: Send + Sync {
    /// Send messages to the model and return the assistant text.
    ///
    /// # Errors
    ///
    /// Returns an error once the provider has given up on the request.
    fn chat(
        &self,
        messages: &[Message],
        params: &ChatParams,
    ) -> impl Future<Output = Result<String, LlmError>> + Send;

    fn name(&self) -> &str;
}
