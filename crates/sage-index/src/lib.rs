//! Document extraction, chunking, and a persisted TF-IDF index with cosine search.

pub mod document;
pub mod error;
mod persist;
pub mod store;
pub mod tfidf;
pub mod tokenize;

pub use document::{Chunk, Chunker, ChunkerConfig, IngestError, LoaderRegistry, TextEncoding};
pub use error::IndexError;
pub use persist::FORMAT_VERSION;
pub use store::{IndexStats, SearchParams, SearchResult, VectorIndex};
pub use tfidf::TermModelConfig;
