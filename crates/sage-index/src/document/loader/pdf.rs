use std::path::Path;
use std::pin::Pin;

use super::super::{DEFAULT_MAX_FILE_SIZE, Document, DocumentLoader, IngestError};
use super::{canonical, metadata_for};

pub struct PdfLoader {
    pub max_file_size: u64,
}

impl Default for PdfLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl DocumentLoader for PdfLoader {
    fn load(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Document, IngestError>> + Send + '_>> {
        let path = path.to_path_buf();
        let max_size = self.max_file_size;
        Box::pin(async move {
            let path = canonical(&path).await?;

            let meta = tokio::fs::metadata(&path).await?;
            if meta.len() > max_size {
                return Err(IngestError::FileTooLarge(meta.len()));
            }

            let metadata = metadata_for(&path, "application/pdf");
            let content = tokio::task::spawn_blocking(move || {
                pdf_extract::extract_text(&path).map_err(|e| IngestError::Pdf(e.to_string()))
            })
            .await
            .map_err(|e| IngestError::Io(std::io::Error::other(e)))??;

            Ok(Document { content, metadata })
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["pdf"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn garbage_pdf_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("broken.pdf");
        std::fs::write(&file, b"not really a pdf").unwrap();

        let err = PdfLoader::default().load(&file).await.unwrap_err();
        assert!(matches!(err, IngestError::Pdf(_) | IngestError::Io(_)));
    }

    #[tokio::test]
    async fn oversized_pdf_rejected_before_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("big.pdf");
        std::fs::write(&file, b"%PDF-1.4").unwrap();

        let loader = PdfLoader { max_file_size: 4 };
        assert!(matches!(
            loader.load(&file).await,
            Err(IngestError::FileTooLarge(8))
        ));
    }
}
