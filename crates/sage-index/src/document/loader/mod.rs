mod markdown;
#[cfg(feature = "pdf")]
mod pdf;
mod text;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub use markdown::MarkdownLoader;
#[cfg(feature = "pdf")]
pub use pdf::PdfLoader;
pub use text::{TextEncoding, TextLoader};

use super::{DEFAULT_MAX_FILE_SIZE, Document, DocumentLoader, DocumentMetadata, IngestError};

/// Picks a loader by file extension.
pub struct LoaderRegistry {
    loaders: Vec<Box<dyn DocumentLoader>>,
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::with_defaults(DEFAULT_MAX_FILE_SIZE, TextEncoding::DEFAULT_CHAIN.to_vec())
    }
}

impl LoaderRegistry {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            loaders: Vec::new(),
        }
    }

    /// Plain text, Markdown and (with the `pdf` feature) PDF loaders.
    #[must_use]
    pub fn with_defaults(max_file_size: u64, encodings: Vec<TextEncoding>) -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(TextLoader {
            max_file_size,
            encodings: encodings.clone(),
        }));
        registry.register(Box::new(MarkdownLoader {
            max_file_size,
            encodings,
        }));
        #[cfg(feature = "pdf")]
        registry.register(Box::new(PdfLoader { max_file_size }));
        registry
    }

    /// Later registrations win for extensions claimed twice.
    pub fn register(&mut self, loader: Box<dyn DocumentLoader>) {
        self.loaders.insert(0, loader);
    }

    #[must_use]
    pub fn supported_extensions(&self) -> Vec<&str> {
        let mut exts: Vec<&str> = self
            .loaders
            .iter()
            .flat_map(|l| l.supported_extensions().iter().copied())
            .collect();
        exts.sort_unstable();
        exts.dedup();
        exts
    }

    /// # Errors
    ///
    /// `UnsupportedFormat` when no registered loader claims the extension.
    pub fn loader_for(&self, path: &Path) -> Result<&dyn DocumentLoader, IngestError> {
        let ext = extension(path);
        self.loaders
            .iter()
            .find(|l| l.supported_extensions().contains(&ext.as_str()))
            .map(Box::as_ref)
            .ok_or_else(|| {
                IngestError::UnsupportedFormat(if ext.is_empty() {
                    path.display().to_string()
                } else {
                    format!(".{ext}")
                })
            })
    }

    /// Extract the text of one file.
    ///
    /// # Errors
    ///
    /// `NotFound` is reported before the format is considered.
    pub async fn load(&self, path: &Path) -> Result<Document, IngestError> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(IngestError::NotFound(path.to_path_buf()));
        }
        let loader = self.loader_for(path)?;
        loader.load(path).await
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default()
}

/// Canonicalize `path`, enforce the size cap, and read the raw bytes.
pub(crate) async fn read_bounded(
    path: &Path,
    max_size: u64,
) -> Result<(PathBuf, Vec<u8>), IngestError> {
    let canonical = canonical(path).await?;
    let meta = tokio::fs::metadata(&canonical).await?;
    if meta.len() > max_size {
        return Err(IngestError::FileTooLarge(meta.len()));
    }
    let bytes = tokio::fs::read(&canonical).await?;
    Ok((canonical, bytes))
}

pub(crate) async fn canonical(path: &Path) -> Result<PathBuf, IngestError> {
    match tokio::fs::canonicalize(path).await {
        Ok(p) => Ok(p),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(IngestError::NotFound(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn metadata_for(path: &Path, content_type: &str) -> DocumentMetadata {
    let ext = extension(path);
    DocumentMetadata {
        source: path.display().to_string(),
        content_type: content_type.to_owned(),
        file_type: if ext.is_empty() {
            String::new()
        } else {
            format!(".{ext}")
        },
        extra: HashMap::new(),
    }
}
