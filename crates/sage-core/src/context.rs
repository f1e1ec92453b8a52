use std::fmt::Write;

use sage_index::SearchResult;

use crate::sysinfo::SystemInfo;

const SYSTEM_INFO_HEADER: &str = "=== Current system information ===\n";
const DOCUMENTS_HEADER: &str = "=== Relevant documents ===\n";

/// Upper bound on assembled context, in chars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextBudget {
    pub max_chars: usize,
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self { max_chars: 2000 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuiltContext {
    pub text: String,
    /// Number of leading results that fit in the budget.
    pub chunks_included: usize,
    pub system_info_included: bool,
}

impl BuiltContext {
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Format one ranked result; `rank` is 1-based.
#[must_use]
pub fn format_block(rank: usize, result: &SearchResult) -> String {
    format!(
        "chunk {rank} (similarity={:.3}):\n{}\n",
        result.similarity, result.chunk.content
    )
}

#[must_use]
pub fn format_system_info(info: &SystemInfo) -> String {
    let mut out = String::from(SYSTEM_INFO_HEADER);
    for (key, value) in info {
        let _ = writeln!(out, "{key}: {value}");
    }
    out.push('\n');
    out
}

/// Assemble the context for one question.
///
/// The optional system-info block goes first and is charged against the same
/// budget. Result blocks follow in rank order; the first block that would push
/// the total past the budget is dropped along with everything ranked below it.
/// The returned text never exceeds `budget.max_chars`.
#[must_use]
pub fn build_context(
    results: &[SearchResult],
    system_info: Option<&SystemInfo>,
    budget: ContextBudget,
) -> BuiltContext {
    let mut built = BuiltContext::default();
    let mut used = 0usize;

    if let Some(info) = system_info.filter(|i| !i.is_empty()) {
        let block = format_system_info(info);
        let len = block.chars().count();
        if len <= budget.max_chars {
            built.text.push_str(&block);
            built.system_info_included = true;
            used += len;
        } else {
            tracing::debug!(len, budget = budget.max_chars, "system info exceeds context budget");
        }
    }

    let header_len = DOCUMENTS_HEADER.chars().count();
    let mut documents = String::new();
    let mut documents_len = header_len;

    for (i, result) in results.iter().enumerate() {
        let block = format_block(i + 1, result);
        let len = block.chars().count();
        if used + documents_len + len > budget.max_chars {
            tracing::debug!(
                included = built.chunks_included,
                dropped = results.len() - i,
                "context budget reached"
            );
            break;
        }
        documents.push_str(&block);
        documents_len += len;
        built.chunks_included += 1;
    }

    if built.chunks_included > 0 {
        built.text.push_str(DOCUMENTS_HEADER);
        built.text.push_str(&documents);
    }

    built
}
