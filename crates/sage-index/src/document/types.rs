use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct DocumentMetadata {
    pub source: String,
    pub content_type: String,
    /// Lowercased extension with its leading dot, e.g. `.md`.
    pub file_type: String,
    pub extra: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

/// A retrievable unit of text. Never mutated once the chunker emits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable identifier derived from source, position and content.
    pub id: String,
    pub content: String,
    pub source: String,
    pub metadata: BTreeMap<String, String>,
    pub chunk_index: usize,
    /// Half-open `[start, end)` span, in chars, within the normalized document text.
    pub char_range: (usize, usize),
}
