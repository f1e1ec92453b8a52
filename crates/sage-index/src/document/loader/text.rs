use std::path::Path;
use std::pin::Pin;

use super::super::{DEFAULT_MAX_FILE_SIZE, Document, DocumentLoader, IngestError};
use super::{metadata_for, read_bounded};

/// Candidate encodings for text files, tried in order until one decodes cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// UTF-8, with a leading byte-order mark stripped.
    Utf8,
    Gbk,
    /// Never fails: every byte maps to the code point of the same value.
    Latin1,
}

impl TextEncoding {
    pub const DEFAULT_CHAIN: [Self; 3] = [Self::Utf8, Self::Gbk, Self::Latin1];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Gbk => "gbk",
            Self::Latin1 => "latin-1",
        }
    }

    /// Parse a configuration label such as `"utf-8"` or `"GBK"`.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Some(Self::Utf8),
            "gbk" | "gb2312" | "cp936" => Some(Self::Gbk),
            "latin-1" | "latin1" | "iso-8859-1" => Some(Self::Latin1),
            _ => None,
        }
    }

    #[must_use]
    pub fn decode(self, bytes: &[u8]) -> Option<String> {
        match self {
            Self::Utf8 => {
                let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
                encoding_rs::UTF_8
                    .decode_without_bom_handling_and_without_replacement(bytes)
                    .map(std::borrow::Cow::into_owned)
            }
            Self::Gbk => encoding_rs::GBK
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(std::borrow::Cow::into_owned),
            Self::Latin1 => Some(bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }
}

/// Decode with the first encoding in `chain` that accepts the bytes.
///
/// # Errors
///
/// `DecodeFailure` listing every encoding tried.
pub(crate) fn decode_chain(
    path: &Path,
    bytes: &[u8],
    chain: &[TextEncoding],
) -> Result<String, IngestError> {
    for encoding in chain {
        if let Some(text) = encoding.decode(bytes) {
            if *encoding != TextEncoding::Utf8 {
                tracing::debug!(path = %path.display(), encoding = encoding.name(), "decoded with fallback encoding");
            }
            return Ok(text);
        }
    }
    Err(IngestError::DecodeFailure {
        path: path.to_path_buf(),
        tried: chain
            .iter()
            .map(|e| e.name())
            .collect::<Vec<_>>()
            .join(", "),
    })
}

pub struct TextLoader {
    pub max_file_size: u64,
    pub encodings: Vec<TextEncoding>,
}

impl Default for TextLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            encodings: TextEncoding::DEFAULT_CHAIN.to_vec(),
        }
    }
}

impl DocumentLoader for TextLoader {
    fn load(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Document, IngestError>> + Send + '_>> {
        let path = path.to_path_buf();
        Box::pin(async move {
            let (path, bytes) = read_bounded(&path, self.max_file_size).await?;
            let content = decode_chain(&path, &bytes, &self.encodings)?;

            Ok(Document {
                content,
                metadata: metadata_for(&path, "text/plain"),
            })
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["txt", "rst"]
    }
}
