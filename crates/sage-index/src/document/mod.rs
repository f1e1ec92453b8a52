pub mod error;
pub mod loader;
pub mod splitter;
pub mod types;

use std::path::Path;

pub use error::IngestError;
pub use loader::{LoaderRegistry, MarkdownLoader, TextEncoding, TextLoader};
pub use splitter::{Chunker, ChunkerConfig};
pub use types::{Chunk, Document, DocumentMetadata};

#[cfg(feature = "pdf")]
pub use loader::PdfLoader;

/// Default maximum file size: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Turns one file into extracted text. Implementations do no chunking.
pub trait DocumentLoader: Send + Sync {
    fn load(
        &self,
        path: &Path,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Document, IngestError>> + Send + '_>,
    >;

    /// Lowercased extensions without the leading dot.
    fn supported_extensions(&self) -> &[&str];
}
