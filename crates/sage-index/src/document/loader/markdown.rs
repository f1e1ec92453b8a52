use std::path::Path;
use std::pin::Pin;

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

use super::super::{DEFAULT_MAX_FILE_SIZE, Document, DocumentLoader, IngestError};
use super::text::{TextEncoding, decode_chain};
use super::{metadata_for, read_bounded};

/// Loads Markdown and strips it down to the text a reader would see.
pub struct MarkdownLoader {
    pub max_file_size: u64,
    pub encodings: Vec<TextEncoding>,
}

impl Default for MarkdownLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            encodings: TextEncoding::DEFAULT_CHAIN.to_vec(),
        }
    }
}

impl DocumentLoader for MarkdownLoader {
    fn load(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Document, IngestError>> + Send + '_>> {
        let path = path.to_path_buf();
        Box::pin(async move {
            let (path, bytes) = read_bounded(&path, self.max_file_size).await?;
            let source = decode_chain(&path, &bytes, &self.encodings)?;

            Ok(Document {
                content: markdown_to_text(&source),
                metadata: metadata_for(&path, "text/markdown"),
            })
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["md", "markdown"]
    }
}

/// Render Markdown to plain text. Block elements end with a blank line so the
/// chunker sees them as separate paragraphs; raw HTML is dropped.
#[must_use]
pub fn markdown_to_text(source: &str) -> String {
    let parser = Parser::new_ext(source, Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH);
    let mut out = String::with_capacity(source.len());

    for event in parser {
        match event {
            Event::Text(text) | Event::Code(text) => out.push_str(&text),
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::Start(Tag::Item) => {
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Event::End(
                TagEnd::Paragraph
                | TagEnd::Heading(_)
                | TagEnd::CodeBlock
                | TagEnd::BlockQuote(_)
                | TagEnd::List(_)
                | TagEnd::Table
                | TagEnd::TableHead
                | TagEnd::TableRow,
            ) => out.push_str("\n\n"),
            Event::End(TagEnd::Item) => out.push('\n'),
            Event::End(TagEnd::TableCell) => out.push(' '),
            _ => {}
        }
    }

    out.trim().to_owned()
}
