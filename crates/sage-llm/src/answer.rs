//! Prompt assembly for grounded question answering.

use crate::error::LlmError;
use crate::provider::{ChatParams, LlmProvider, Message};

pub const ANSWER_SYSTEM_PROMPT: &str = "\
You are a question-answering assistant that answers from the documents supplied with each question.
Read the provided document excerpts carefully and base your answer on them.
If the excerpts contain the relevant information, answer in detail; if they do not, say so honestly.
Prefer the document content over general knowledge so the answer stays accurate and relevant.";

/// Build the two-message conversation sent for one question.
///
/// Empty `context` or `system_info` sections are left out entirely.
#[must_use]
pub fn answer_messages(question: &str, context: &str, system_info: Option<&str>) -> Vec<Message> {
    let mut user = format!("Question: {question}");

    if !context.is_empty() {
        user.push_str("\n\nRelevant documents:\n");
        user.push_str(context);
    }

    if let Some(info) = system_info.filter(|s| !s.is_empty()) {
        user.push_str("\n\nCurrent system information:\n");
        user.push_str(info);
    }

    vec![Message::system(ANSWER_SYSTEM_PROMPT), Message::user(user)]
}

/// Ask `provider` to answer `question` from `context`.
///
/// # Errors
///
/// Propagates the provider's error once it has given up.
pub async fn generate_answer<P: LlmProvider + ?Sized>(
    provider: &P,
    question: &str,
    context: &str,
    system_info: Option<&str>,
    params: &ChatParams,
) -> Result<String, LlmError> {
    let messages = answer_messages(question, context, system_info);
    provider.chat(&messages, params).await
}
