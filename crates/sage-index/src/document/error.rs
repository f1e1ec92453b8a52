use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// None of the configured text encodings produced valid text.
    #[error("cannot decode {} (tried {tried})", path.display())]
    DecodeFailure { path: PathBuf, tried: String },

    #[error("file too large: {0} bytes")]
    FileTooLarge(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "pdf")]
    #[error("PDF error: {0}")]
    Pdf(String),
}
