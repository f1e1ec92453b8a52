use std::collections::BTreeMap;

use uuid::Uuid;

use super::types::{Chunk, Document};

const PARAGRAPH_BREAK: &str = "\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    /// Target upper bound, in chars. A single paragraph longer than this is kept whole.
    pub chunk_size: usize,
    /// Accepted for configuration compatibility; adjacent chunks never overlap.
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

/// Packs paragraphs of a document into bounded, non-overlapping chunks.
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    #[must_use]
    pub fn new(config: ChunkerConfig) -> Self {
        if config.chunk_overlap > 0 {
            tracing::debug!(
                chunk_overlap = config.chunk_overlap,
                "chunk_overlap is not applied; chunks are packed without overlap"
            );
        }
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> ChunkerConfig {
        self.config
    }

    /// Chunk a loaded document, carrying its content type and extra metadata.
    #[must_use]
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        let meta = &document.metadata;
        let mut chunks = self.chunk(&document.content, &meta.source, &meta.file_type);
        for chunk in &mut chunks {
            chunk
                .metadata
                .insert("content_type".into(), meta.content_type.clone());
            for (k, v) in &meta.extra {
                chunk.metadata.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }
        chunks
    }

    /// Normalize whitespace in `raw_text` and split it into chunks.
    ///
    /// Text that fits in `chunk_size` becomes one chunk. Longer text is split at
    /// paragraph breaks and paragraphs are packed greedily: the buffer is flushed
    /// as soon as the next paragraph, plus its separator, would not fit.
    /// Whitespace-only input yields no chunks.
    #[must_use]
    pub fn chunk(&self, raw_text: &str, source: &str, file_kind: &str) -> Vec<Chunk> {
        let text = normalize_whitespace(raw_text);
        if text.is_empty() {
            return Vec::new();
        }

        let total = text.chars().count();
        if total <= self.config.chunk_size {
            return vec![make_chunk(text, source, file_kind, 0, (0, total))];
        }

        let mut chunks = Vec::new();
        let mut buf = String::new();
        let mut buf_len = 0usize;
        let mut buf_start = 0usize;
        let mut cursor = 0usize;

        for paragraph in text.split(PARAGRAPH_BREAK) {
            let len = paragraph.chars().count();
            if buf.is_empty() {
                buf.push_str(paragraph);
                buf_len = len;
                buf_start = cursor;
            } else if buf_len + len + PARAGRAPH_BREAK.len() <= self.config.chunk_size {
                buf.push_str(PARAGRAPH_BREAK);
                buf.push_str(paragraph);
                buf_len += PARAGRAPH_BREAK.len() + len;
            } else {
                let index = chunks.len();
                let content = std::mem::replace(&mut buf, paragraph.to_owned());
                chunks.push(make_chunk(
                    content,
                    source,
                    file_kind,
                    index,
                    (buf_start, buf_start + buf_len),
                ));
                buf_len = len;
                buf_start = cursor;
            }
            cursor += len + PARAGRAPH_BREAK.len();
        }

        if !buf.is_empty() {
            let index = chunks.len();
            chunks.push(make_chunk(
                buf,
                source,
                file_kind,
                index,
                (buf_start, buf_start + buf_len),
            ));
        }

        chunks
    }
}

/// Collapse whitespace runs: a run holding two or more line breaks becomes a
/// paragraph break, any other run a single space. Leading and trailing
/// whitespace is dropped.
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_run = false;
    let mut newlines = 0usize;

    for ch in text.chars() {
        if ch.is_whitespace() {
            in_run = true;
            if ch == '\n' {
                newlines += 1;
            }
            continue;
        }
        if in_run && !out.is_empty() {
            out.push_str(if newlines >= 2 { PARAGRAPH_BREAK } else { " " });
        }
        in_run = false;
        newlines = 0;
        out.push(ch);
    }

    out
}

fn make_chunk(
    content: String,
    source: &str,
    file_kind: &str,
    chunk_index: usize,
    char_range: (usize, usize),
) -> Chunk {
    let name = format!("{source}\u{0}{chunk_index}\u{0}{content}");
    let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string();

    let mut metadata = BTreeMap::new();
    metadata.insert("file_type".to_owned(), file_kind.to_owned());

    Chunk {
        id,
        content,
        source: source.to_owned(),
        metadata,
        chunk_index,
        char_range,
    }
}
